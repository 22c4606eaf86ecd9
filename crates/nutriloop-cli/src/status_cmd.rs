//! `nutriloop status` command: show consultation progress.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use nutriloop_db::queries::consultations;
use nutriloop_db::queries::workflow_events;

/// Run the status command.
///
/// When `id_str` is `Some`, shows detailed status for that consultation.
/// When `None`, lists recent consultations.
pub async fn run_status(pool: &SqlitePool, id_str: Option<&str>) -> Result<()> {
    match id_str {
        Some(id_str) => run_consultation_status(pool, id_str).await,
        None => run_recent_status(pool).await,
    }
}

/// Show detailed status for a single consultation.
async fn run_consultation_status(pool: &SqlitePool, id_str: &str) -> Result<()> {
    let id = Uuid::parse_str(id_str)
        .with_context(|| format!("invalid consultation ID: {id_str}"))?;

    let consultation = consultations::get_consultation(pool, id)
        .await?
        .with_context(|| format!("consultation {id} not found"))?;

    println!("Patient: {} ({})", consultation.patient_name, consultation.id);
    println!("Goal: {}", consultation.goal);
    if consultation.original_goal != consultation.goal {
        println!("Stated goal: {} (revised)", consultation.original_goal);
    }
    println!("Status: {} (attempt {})", consultation.status, consultation.attempt);
    println!(
        "Created: {}",
        consultation.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(completed_at) = consultation.completed_at {
        println!(
            "Completed: {}",
            completed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    if let Some(next_visit) = consultation.next_visit {
        println!("Next visit: {next_visit}");
    }

    if let Some(ref plan) = consultation.meal_plan {
        println!();
        println!("Meal plan:");
        for line in plan.lines() {
            println!("  {line}");
        }
    }

    let counts = workflow_events::count_events_by_type(pool, id).await?;
    if !counts.is_empty() {
        println!();
        println!("Events:");
        for (event_type, count) in &counts {
            println!("  {event_type}: {count}");
        }
    }

    Ok(())
}

/// List recent consultations with a one-line summary each.
async fn run_recent_status(pool: &SqlitePool) -> Result<()> {
    let consultations = consultations::list_consultations(pool, 20).await?;

    if consultations.is_empty() {
        println!("No consultations found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<20} {:<10} {:>8} {:<20}",
        "ID", "PATIENT", "STATUS", "ATTEMPT", "CREATED"
    );
    println!("{}", "-".repeat(100));

    for consultation in &consultations {
        let name_display = if consultation.patient_name.len() > 18 {
            format!("{}...", &consultation.patient_name[..15])
        } else {
            consultation.patient_name.clone()
        };
        println!(
            "{:<38} {:<20} {:<10} {:>8} {:<20}",
            consultation.id,
            name_display,
            consultation.status.to_string(),
            consultation.attempt,
            consultation.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }

    Ok(())
}
