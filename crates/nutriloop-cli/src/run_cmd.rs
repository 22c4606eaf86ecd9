//! `nutriloop run` command: run a consultation from an intake file.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use nutriloop_core::intake::Intake;
use nutriloop_core::llm::LlmProvider;
use nutriloop_core::orchestrator::{
    ConsultationOutcome, Orchestrator, OrchestratorConfig,
};
use nutriloop_core::tools::MailConfig;

/// Run the run command. Exit codes: 0 completed, 2 escalated, 3 failed,
/// 130 canceled.
pub async fn run_run(
    pool: &SqlitePool,
    provider: Arc<dyn LlmProvider>,
    mail: MailConfig,
    config: OrchestratorConfig,
    intake_path: &Path,
) -> Result<()> {
    let intake = Intake::load(intake_path)?;

    println!("Running consultation for {}", intake.patient.name);
    println!("  Goal: {}", intake.goal);
    println!("  Provider: {}", provider.name());
    println!("  Retry max: {}", config.retry_max);

    let orchestrator = Orchestrator::new(pool.clone(), provider, mail, config)?;

    // Graceful shutdown: first signal cancels, second force-exits.
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));
    let got_first_clone = Arc::clone(&got_first_signal);

    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_clone.swap(true, Ordering::SeqCst) {
                // Second signal: force exit.
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nCanceling after the current step (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    let outcome = match orchestrator.run_consultation(intake, cancel).await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("\nConsultation failed: {err:#}");
            std::process::exit(3);
        }
    };

    match outcome {
        ConsultationOutcome::Completed {
            consultation_id,
            meal_plan,
            next_visit,
            grocery_items,
        } => {
            println!("\nConsultation {consultation_id} completed.");
            println!("\nMeal plan:");
            for line in meal_plan.lines() {
                println!("  {line}");
            }
            println!("\nNext visit: {next_visit}");
            println!("Grocery items ordered: {grocery_items}");
            println!();
            println!("See `nutriloop log {consultation_id}` for the full event log.");
        }
        ConsultationOutcome::Escalated {
            consultation_id,
            reasons,
        } => {
            println!("\nConsultation {consultation_id} escalated to a human reviewer:");
            for reason in &reasons {
                println!("  - {reason}");
            }
            std::process::exit(2);
        }
        ConsultationOutcome::Canceled { consultation_id } => {
            println!("\nConsultation {consultation_id} canceled.");
            std::process::exit(130);
        }
    }

    Ok(())
}
