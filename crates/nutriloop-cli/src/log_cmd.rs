//! `nutriloop log` command: show workflow events for a consultation.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use nutriloop_db::models::WorkflowEvent;
use nutriloop_db::queries::consultations;
use nutriloop_db::queries::workflow_events;

/// Run the log command.
pub async fn run_log(pool: &SqlitePool, id_str: &str, event_type: Option<&str>) -> Result<()> {
    let id = Uuid::parse_str(id_str)
        .with_context(|| format!("invalid consultation ID: {id_str}"))?;

    let consultation = consultations::get_consultation(pool, id)
        .await?
        .with_context(|| format!("consultation {id} not found"))?;

    println!("Patient: {} ({})", consultation.patient_name, consultation.id);
    println!("Status: {} (attempt {})", consultation.status, consultation.attempt);
    println!();

    let mut events: Vec<WorkflowEvent> =
        workflow_events::list_events_for_consultation(pool, id).await?;
    if let Some(wanted) = event_type {
        events.retain(|e| e.event_type == wanted);
    }

    if events.is_empty() {
        println!("No events recorded.");
        return Ok(());
    }

    println!("Events ({}):", events.len());
    for event in &events {
        let time = event.recorded_at.format("%H:%M:%S%.3f");
        let summary = summarize_event_payload(&event.event_type, &event.payload);
        println!("  [{time}] [{}] {}: {summary}", event.step, event.event_type);
    }

    Ok(())
}

/// Generate a one-line summary from an event's type and payload.
fn summarize_event_payload(event_type: &str, payload: &serde_json::Value) -> String {
    match event_type {
        "goal_assessed" => {
            let verdict = if payload["safe"].as_bool().unwrap_or(false) {
                "safe"
            } else {
                "unsafe"
            };
            let rationale = payload["rationale"].as_str().unwrap_or("");
            format!("{verdict}: {}", truncate(rationale))
        }
        "goal_revised" => {
            let original = payload["original_goal"].as_str().unwrap_or("?");
            let revised = payload["revised_goal"].as_str().unwrap_or("?");
            format!("{original:?} -> {revised:?}")
        }
        "preferences_collected" => {
            let preferences = payload["preferences"].as_array().map_or(0, |a| a.len());
            let allergies = payload["allergies"].as_array().map_or(0, |a| a.len());
            let budget = match payload["weekly_budget"].as_f64() {
                Some(budget) => budget.to_string(),
                None => "none".to_string(),
            };
            format!("{preferences} preferences, {allergies} allergies, budget {budget}")
        }
        "plan_generated" => {
            let attempt = payload["attempt"].as_i64().unwrap_or(0);
            let days = payload["days"].as_u64().unwrap_or(0);
            format!("attempt {attempt}, {days} days")
        }
        "plan_validated" => {
            if payload["valid"].as_bool().unwrap_or(false) {
                "valid".to_string()
            } else {
                format!("invalid: {}", join_reasons(&payload["reasons"]))
            }
        }
        "plan_rejected" => {
            let attempt = payload["attempt"].as_i64().unwrap_or(0);
            format!("attempt {attempt}: {}", join_reasons(&payload["reasons"]))
        }
        "doctor_reviewed" => {
            if payload["approved"].as_bool().unwrap_or(false) {
                "approved".to_string()
            } else {
                let feedback = payload["feedback"].as_str().unwrap_or("");
                format!("adjusted: {}", truncate(feedback))
            }
        }
        "visit_scheduled" => payload["date"].as_str().unwrap_or("?").to_string(),
        "mail_sent" => {
            let to = payload["to"].as_str().unwrap_or("?");
            let subject = payload["subject"].as_str().unwrap_or("?");
            format!("to {to}: {}", truncate(subject))
        }
        "grocery_ordered" => {
            let items = payload["item_count"].as_u64().unwrap_or(0);
            let units = payload["total_units"].as_u64().unwrap_or(0);
            format!("{items} items, {units} units")
        }
        "llm_called" => {
            let agent = payload["agent"].as_str().unwrap_or("?");
            let model = payload["model"].as_str().unwrap_or("?");
            let prompt = payload["prompt_tokens"].as_u64().unwrap_or(0);
            let completion = payload["completion_tokens"].as_u64().unwrap_or(0);
            format!("{agent} ({model}): in={prompt} out={completion}")
        }
        "consultation_failed" => {
            if let Some(error) = payload["error"].as_str() {
                truncate(error)
            } else {
                join_reasons(&payload["reasons"])
            }
        }
        _ => payload.to_string(),
    }
}

fn join_reasons(reasons: &serde_json::Value) -> String {
    let joined = reasons
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_default();
    truncate(&joined)
}

fn truncate(text: &str) -> String {
    if text.len() > 80 {
        let mut cut = 77;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &text[..cut])
    } else {
        text.to_string()
    }
}
