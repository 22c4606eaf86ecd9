//! Integration coverage for the data path behind the CLI commands: an
//! intake file on disk through a full consultation, then the queries the
//! status, log, and report views render.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use nutriloop_core::intake::Intake;
use nutriloop_core::llm::ScriptedProvider;
use nutriloop_core::orchestrator::{ConsultationOutcome, Orchestrator, OrchestratorConfig};
use nutriloop_core::tools::MailConfig;
use nutriloop_db::models::ConsultationStatus;
use nutriloop_db::queries::{consultations, workflow_events};
use nutriloop_test_utils::create_test_db;

// ===========================================================================
// Helpers
// ===========================================================================

const INTAKE_TOML: &str = r#"
goal = "maintain weight with less salt"
preferences = ["mediterranean"]
weekly_budget = 150.0

[patient]
name = "Sam Field"
age = 41
weight_kg = 77.0
conditions = ["hypertension"]
"#;

/// Write an intake file, load it the way the `run` command does, and run
/// the consultation against an in-memory database.
async fn run_from_file(toml: &str) -> (sqlx::SqlitePool, ConsultationOutcome) {
    let dir = tempfile::TempDir::new().expect("failed to create temp dir");
    let intake_path = dir.path().join("intake.toml");
    std::fs::write(&intake_path, toml).expect("failed to write intake file");

    let intake = Intake::load(&intake_path).expect("intake file should load");

    let pool = create_test_db().await;
    let orchestrator = Orchestrator::new(
        pool.clone(),
        Arc::new(ScriptedProvider::new()),
        MailConfig::outbox(dir.path().join("outbox")),
        OrchestratorConfig::default(),
    )
    .expect("orchestrator should build");
    let outcome = orchestrator
        .run_consultation(intake, CancellationToken::new())
        .await
        .expect("consultation should not error");
    (pool, outcome)
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn intake_file_drives_a_full_consultation() {
    let (pool, outcome) = run_from_file(INTAKE_TOML).await;

    let ConsultationOutcome::Completed { meal_plan, .. } = &outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(meal_plan.lines().count(), 7);

    let listed = consultations::list_consultations(&pool, 10)
        .await
        .expect("listing should succeed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].patient_name, "Sam Field");
    assert_eq!(listed[0].status, ConsultationStatus::Completed);
    assert_eq!(listed[0].meal_plan.as_deref(), Some(meal_plan.as_str()));
}

#[tokio::test]
async fn status_and_report_queries_cover_the_run() {
    let (pool, outcome) = run_from_file(INTAKE_TOML).await;
    let ConsultationOutcome::Completed {
        consultation_id, ..
    } = outcome
    else {
        panic!("expected completion, got {outcome:?}");
    };

    let counts: HashMap<String, i64> =
        workflow_events::count_events_by_type(&pool, consultation_id)
            .await
            .expect("counting should succeed")
            .into_iter()
            .collect();
    assert_eq!(counts.get("goal_assessed"), Some(&1));
    assert_eq!(counts.get("plan_generated"), Some(&1));
    assert_eq!(counts.get("mail_sent"), Some(&2));
    assert_eq!(counts.get("grocery_ordered"), Some(&1));

    let usage = workflow_events::get_token_usage_for_consultation(&pool, consultation_id)
        .await
        .expect("usage query should succeed");
    assert_eq!(usage.len(), 2);
}

#[tokio::test]
async fn intake_file_without_goal_is_rejected() {
    let dir = tempfile::TempDir::new().expect("failed to create temp dir");
    let intake_path = dir.path().join("intake.toml");
    std::fs::write(
        &intake_path,
        "[patient]\nname = \"Sam Field\"\nage = 41\nweight_kg = 77.0\n",
    )
    .expect("failed to write intake file");

    let err = Intake::load(&intake_path).expect_err("missing goal should fail");
    assert!(
        format!("{err:#}").contains("invalid intake file"),
        "unexpected error: {err:#}"
    );
}
