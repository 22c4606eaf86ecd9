//! `nutriloop report` command: token usage and duration for a consultation.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use nutriloop_db::queries::consultations;
use nutriloop_db::queries::workflow_events;

/// Run the report command.
pub async fn run_report(pool: &SqlitePool, id_str: &str) -> Result<()> {
    let id = Uuid::parse_str(id_str)
        .with_context(|| format!("invalid consultation ID: {id_str}"))?;

    let consultation = consultations::get_consultation(pool, id)
        .await?
        .with_context(|| format!("consultation {id} not found"))?;

    println!("Patient: {} ({})", consultation.patient_name, consultation.id);
    println!("Goal: {}", consultation.goal);
    println!("Status: {} (attempt {})", consultation.status, consultation.attempt);

    if let Some(completed_at) = consultation.completed_at {
        let duration = completed_at - consultation.created_at;
        let secs = duration.num_seconds();
        let mins = secs / 60;
        let rem = secs % 60;
        println!("Duration: {mins}m {rem}s");
    }
    println!();

    let usage = workflow_events::get_token_usage_for_consultation(pool, id).await?;
    if usage.is_empty() {
        println!("No LLM calls recorded.");
        return Ok(());
    }

    println!(
        "{:<12} {:>8} {:>10} {:>12} {:>10}",
        "AGENT", "CALLS", "PROMPT", "COMPLETION", "TOTAL"
    );
    println!("{}", "-".repeat(56));

    let mut total_calls: i64 = 0;
    let mut total_prompt: i64 = 0;
    let mut total_completion: i64 = 0;
    for row in &usage {
        println!(
            "{:<12} {:>8} {:>10} {:>12} {:>10}",
            row.agent,
            row.calls,
            row.prompt_tokens,
            row.completion_tokens,
            row.prompt_tokens + row.completion_tokens,
        );
        total_calls += row.calls;
        total_prompt += row.prompt_tokens;
        total_completion += row.completion_tokens;
    }

    println!("{}", "-".repeat(56));
    println!(
        "{:<12} {:>8} {:>10} {:>12} {:>10}",
        "total",
        total_calls,
        total_prompt,
        total_completion,
        total_prompt + total_completion,
    );

    Ok(())
}
