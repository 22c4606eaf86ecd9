//! Database query functions for the `consultations` table.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{Consultation, ConsultationStatus};

/// Insert a new consultation row in `running` status.
///
/// The current and original goal start out identical; a safety revision
/// later updates only the current goal.
pub async fn insert_consultation(
    pool: &SqlitePool,
    patient_name: &str,
    goal: &str,
) -> Result<Consultation> {
    let consultation = sqlx::query_as::<_, Consultation>(
        "INSERT INTO consultations (id, patient_name, goal, original_goal, status, attempt, created_at) \
         VALUES (?, ?, ?, ?, ?, 0, ?) \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(patient_name)
    .bind(goal)
    .bind(goal)
    .bind(ConsultationStatus::Running)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert consultation for {patient_name}"))?;

    Ok(consultation)
}

/// Fetch a consultation by its ID.
pub async fn get_consultation(pool: &SqlitePool, id: Uuid) -> Result<Option<Consultation>> {
    let consultation =
        sqlx::query_as::<_, Consultation>("SELECT * FROM consultations WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch consultation")?;

    Ok(consultation)
}

/// List consultations, newest first, at most `limit` rows.
pub async fn list_consultations(pool: &SqlitePool, limit: i64) -> Result<Vec<Consultation>> {
    let consultations = sqlx::query_as::<_, Consultation>(
        "SELECT * FROM consultations ORDER BY created_at DESC, id LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list consultations")?;

    Ok(consultations)
}

/// Replace the current goal after a safety revision.
pub async fn update_consultation_goal(pool: &SqlitePool, id: Uuid, goal: &str) -> Result<()> {
    let result = sqlx::query("UPDATE consultations SET goal = ? WHERE id = ?")
        .bind(goal)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update consultation goal")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("consultation {id} not found");
    }

    Ok(())
}

/// Record the latest plan generation attempt number.
pub async fn update_consultation_attempt(pool: &SqlitePool, id: Uuid, attempt: i32) -> Result<()> {
    let result = sqlx::query("UPDATE consultations SET attempt = ? WHERE id = ?")
        .bind(attempt)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update consultation attempt")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("consultation {id} not found");
    }

    Ok(())
}

/// Update the status of a consultation.
pub async fn set_consultation_status(
    pool: &SqlitePool,
    id: Uuid,
    status: ConsultationStatus,
) -> Result<()> {
    let result = sqlx::query("UPDATE consultations SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update consultation status")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("consultation {id} not found");
    }

    Ok(())
}

/// Mark a consultation completed, storing the final plan and the scheduled
/// follow-up visit. Returns the updated row.
pub async fn complete_consultation(
    pool: &SqlitePool,
    id: Uuid,
    meal_plan: &str,
    next_visit: NaiveDate,
) -> Result<Consultation> {
    let consultation = sqlx::query_as::<_, Consultation>(
        "UPDATE consultations \
         SET status = 'completed', meal_plan = ?, next_visit = ?, completed_at = ? \
         WHERE id = ? \
         RETURNING *",
    )
    .bind(meal_plan)
    .bind(next_visit)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to complete consultation")?;

    match consultation {
        Some(c) => Ok(c),
        None => anyhow::bail!("consultation {id} not found"),
    }
}
