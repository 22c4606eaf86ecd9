//! Database query functions for the `workflow_events` table.

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::WorkflowEvent;

/// Parameters for inserting a new workflow event row.
#[derive(Debug, Clone)]
pub struct NewWorkflowEvent {
    pub consultation_id: Uuid,
    pub step: String,
    pub event_type: String,
    pub payload: Value,
}

/// Insert a new workflow event row. Returns the inserted row with its
/// generated id.
pub async fn insert_workflow_event(
    pool: &SqlitePool,
    new: &NewWorkflowEvent,
) -> Result<WorkflowEvent> {
    let event = sqlx::query_as::<_, WorkflowEvent>(
        "INSERT INTO workflow_events (consultation_id, step, event_type, payload, recorded_at) \
         VALUES (?, ?, ?, ?, ?) \
         RETURNING *",
    )
    .bind(new.consultation_id)
    .bind(&new.step)
    .bind(&new.event_type)
    .bind(&new.payload)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .with_context(|| {
        format!(
            "failed to insert workflow event for consultation {} step {} type {}",
            new.consultation_id, new.step, new.event_type
        )
    })?;

    Ok(event)
}

/// Get all events for a consultation in the order they were recorded.
pub async fn list_events_for_consultation(
    pool: &SqlitePool,
    consultation_id: Uuid,
) -> Result<Vec<WorkflowEvent>> {
    let events = sqlx::query_as::<_, WorkflowEvent>(
        "SELECT * FROM workflow_events \
         WHERE consultation_id = ? \
         ORDER BY recorded_at ASC, id ASC",
    )
    .bind(consultation_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list workflow events for consultation {consultation_id}"))?;

    Ok(events)
}

/// Get events of one type for a consultation, oldest first.
pub async fn list_events_by_type(
    pool: &SqlitePool,
    consultation_id: Uuid,
    event_type: &str,
) -> Result<Vec<WorkflowEvent>> {
    let events = sqlx::query_as::<_, WorkflowEvent>(
        "SELECT * FROM workflow_events \
         WHERE consultation_id = ? AND event_type = ? \
         ORDER BY recorded_at ASC, id ASC",
    )
    .bind(consultation_id)
    .bind(event_type)
    .fetch_all(pool)
    .await
    .with_context(|| {
        format!(
            "failed to list {} events for consultation {}",
            event_type, consultation_id
        )
    })?;

    Ok(events)
}

/// Count events per type for a consultation, sorted by type name.
pub async fn count_events_by_type(
    pool: &SqlitePool,
    consultation_id: Uuid,
) -> Result<Vec<(String, i64)>> {
    let counts: Vec<(String, i64)> = sqlx::query_as(
        "SELECT event_type, COUNT(*) FROM workflow_events \
         WHERE consultation_id = ? \
         GROUP BY event_type \
         ORDER BY event_type",
    )
    .bind(consultation_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to count events for consultation {consultation_id}"))?;

    Ok(counts)
}

/// Per-agent token usage aggregated from `llm_called` event payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUsageRow {
    pub agent: String,
    pub calls: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

/// Aggregate token usage for a consultation, grouped by agent.
///
/// Sums `prompt_tokens` and `completion_tokens` from `llm_called` event
/// payloads.
pub async fn get_token_usage_for_consultation(
    pool: &SqlitePool,
    consultation_id: Uuid,
) -> Result<Vec<TokenUsageRow>> {
    let rows: Vec<(String, i64, i64, i64)> = sqlx::query_as(
        "SELECT \
             COALESCE(json_extract(payload, '$.agent'), 'unknown'), \
             COUNT(*), \
             CAST(COALESCE(SUM(json_extract(payload, '$.prompt_tokens')), 0) AS INTEGER), \
             CAST(COALESCE(SUM(json_extract(payload, '$.completion_tokens')), 0) AS INTEGER) \
         FROM workflow_events \
         WHERE consultation_id = ? AND event_type = 'llm_called' \
         GROUP BY json_extract(payload, '$.agent') \
         ORDER BY 1",
    )
    .bind(consultation_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to get token usage for consultation {consultation_id}"))?;

    Ok(rows
        .into_iter()
        .map(|(agent, calls, prompt_tokens, completion_tokens)| TokenUsageRow {
            agent,
            calls,
            prompt_tokens,
            completion_tokens,
        })
        .collect())
}
