//! Integration tests for the workflow event log.

use serde_json::json;
use uuid::Uuid;

use nutriloop_db::queries::consultations;
use nutriloop_db::queries::workflow_events::{self, NewWorkflowEvent};
use nutriloop_test_utils::create_test_db;

#[tokio::test]
async fn insert_and_list_events_in_order() {
    let pool = create_test_db().await;

    let consultation = consultations::insert_consultation(&pool, "p", "goal")
        .await
        .unwrap();

    for (step, event_type) in [
        ("assess_goal", "goal_assessed"),
        ("collect_preferences", "preferences_collected"),
        ("generate_plan", "plan_generated"),
    ] {
        workflow_events::insert_workflow_event(
            &pool,
            &NewWorkflowEvent {
                consultation_id: consultation.id,
                step: step.to_owned(),
                event_type: event_type.to_owned(),
                payload: json!({"step": step}),
            },
        )
        .await
        .expect("insert_workflow_event should succeed");
    }

    let events = workflow_events::list_events_for_consultation(&pool, consultation.id)
        .await
        .expect("list should succeed");

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].event_type, "goal_assessed");
    assert_eq!(events[1].event_type, "preferences_collected");
    assert_eq!(events[2].event_type, "plan_generated");
    // Ids are monotonically increasing.
    assert!(events[0].id < events[1].id);
    assert!(events[1].id < events[2].id);

    pool.close().await;
}

#[tokio::test]
async fn list_events_for_missing_consultation_is_empty() {
    let pool = create_test_db().await;

    let events = workflow_events::list_events_for_consultation(&pool, Uuid::new_v4())
        .await
        .expect("list should not error");
    assert!(events.is_empty());

    pool.close().await;
}

#[tokio::test]
async fn list_events_by_type_filters() {
    let pool = create_test_db().await;

    let consultation = consultations::insert_consultation(&pool, "p", "goal")
        .await
        .unwrap();

    for event_type in ["plan_generated", "plan_rejected", "plan_generated"] {
        workflow_events::insert_workflow_event(
            &pool,
            &NewWorkflowEvent {
                consultation_id: consultation.id,
                step: "generate_plan".to_owned(),
                event_type: event_type.to_owned(),
                payload: json!({}),
            },
        )
        .await
        .unwrap();
    }

    let generated =
        workflow_events::list_events_by_type(&pool, consultation.id, "plan_generated")
            .await
            .unwrap();
    assert_eq!(generated.len(), 2);

    let rejected = workflow_events::list_events_by_type(&pool, consultation.id, "plan_rejected")
        .await
        .unwrap();
    assert_eq!(rejected.len(), 1);

    pool.close().await;
}

#[tokio::test]
async fn count_events_by_type_groups_and_sorts() {
    let pool = create_test_db().await;

    let consultation = consultations::insert_consultation(&pool, "p", "goal")
        .await
        .unwrap();

    for event_type in ["mail_sent", "plan_generated", "mail_sent"] {
        workflow_events::insert_workflow_event(
            &pool,
            &NewWorkflowEvent {
                consultation_id: consultation.id,
                step: "finalize".to_owned(),
                event_type: event_type.to_owned(),
                payload: json!({}),
            },
        )
        .await
        .unwrap();
    }

    let counts = workflow_events::count_events_by_type(&pool, consultation.id)
        .await
        .unwrap();

    assert_eq!(
        counts,
        vec![("mail_sent".to_owned(), 2), ("plan_generated".to_owned(), 1)]
    );

    pool.close().await;
}

#[tokio::test]
async fn token_usage_aggregates_llm_called_payloads() {
    let pool = create_test_db().await;

    let consultation = consultations::insert_consultation(&pool, "p", "goal")
        .await
        .unwrap();

    let calls = [
        ("safety", 100, 20),
        ("nutrition", 200, 80),
        ("nutrition", 150, 60),
    ];
    for (agent, prompt_tokens, completion_tokens) in calls {
        workflow_events::insert_workflow_event(
            &pool,
            &NewWorkflowEvent {
                consultation_id: consultation.id,
                step: "generate_plan".to_owned(),
                event_type: "llm_called".to_owned(),
                payload: json!({
                    "agent": agent,
                    "model": "scripted",
                    "prompt_tokens": prompt_tokens,
                    "completion_tokens": completion_tokens,
                }),
            },
        )
        .await
        .unwrap();
    }

    // An unrelated event must not count.
    workflow_events::insert_workflow_event(
        &pool,
        &NewWorkflowEvent {
            consultation_id: consultation.id,
            step: "finalize".to_owned(),
            event_type: "mail_sent".to_owned(),
            payload: json!({"prompt_tokens": 9999}),
        },
    )
    .await
    .unwrap();

    let usage = workflow_events::get_token_usage_for_consultation(&pool, consultation.id)
        .await
        .expect("aggregation should succeed");

    assert_eq!(usage.len(), 2);
    assert_eq!(usage[0].agent, "nutrition");
    assert_eq!(usage[0].calls, 2);
    assert_eq!(usage[0].prompt_tokens, 350);
    assert_eq!(usage[0].completion_tokens, 140);
    assert_eq!(usage[1].agent, "safety");
    assert_eq!(usage[1].calls, 1);
    assert_eq!(usage[1].prompt_tokens, 100);
    assert_eq!(usage[1].completion_tokens, 20);

    pool.close().await;
}

#[tokio::test]
async fn token_usage_is_empty_without_llm_events() {
    let pool = create_test_db().await;

    let consultation = consultations::insert_consultation(&pool, "p", "goal")
        .await
        .unwrap();

    let usage = workflow_events::get_token_usage_for_consultation(&pool, consultation.id)
        .await
        .unwrap();
    assert!(usage.is_empty());

    pool.close().await;
}
