//! Consultation orchestrator: drives one consultation through the flow,
//! persisting every step as a workflow event.
//!
//! Steps run sequentially. Validation failures loop back to generation
//! with tightened instructions until the retry budget runs out, at
//! which point the consultation escalates to a human. Cancellation is
//! checked between steps; the step in progress is allowed to finish.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use nutriloop_db::models::ConsultationStatus;
use nutriloop_db::queries::consultations;
use nutriloop_db::queries::workflow_events::{self, NewWorkflowEvent};

use crate::agent::nutrition::stricter_instructions;
use crate::agent::{CallCost, NutritionAgent, SafetyAgent};
use crate::flow::{ConsultationStep, FlowCursor};
use crate::intake::Intake;
use crate::llm::LlmProvider;
use crate::state::{ConsultationState, MealPlan, PatientProfile};
use crate::tools::{CalendarTool, GroceryTool, MailConfig, MailTool, ToolRegistry, calendar};
use crate::validate::{self, DoctorDecision, ValidationOutcome};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Plan generation attempts before escalating.
    pub retry_max: i32,
    /// Where unsafe-goal notifications go.
    pub doctor_email: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry_max: 3,
            doctor_email: "doctor@nutriloop.local".to_string(),
        }
    }
}

/// Terminal result of a consultation run.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsultationOutcome {
    /// Plan validated, reviewed, and delivered.
    Completed {
        consultation_id: Uuid,
        meal_plan: String,
        next_visit: NaiveDate,
        grocery_items: usize,
    },
    /// No valid plan within the retry budget; a human takes over.
    Escalated {
        consultation_id: Uuid,
        reasons: Vec<String>,
    },
    /// Cancelled between steps before reaching a terminal step.
    Canceled { consultation_id: Uuid },
}

/// Drives consultations end to end.
pub struct Orchestrator {
    pool: SqlitePool,
    config: OrchestratorConfig,
    safety: SafetyAgent,
    nutrition: NutritionAgent,
    tools: ToolRegistry,
}

impl Orchestrator {
    /// Build an orchestrator with the standard tool set.
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn LlmProvider>,
        mail: MailConfig,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(MailTool::new(mail)?))?;
        tools.register(Arc::new(CalendarTool::new()))?;
        tools.register(Arc::new(GroceryTool::new()))?;

        Ok(Self {
            pool,
            config,
            safety: SafetyAgent::new(provider.clone()),
            nutrition: NutritionAgent::new(provider),
            tools,
        })
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one consultation. Errors mark the stored row `failed`; the
    /// other endings are reported through [`ConsultationOutcome`].
    pub async fn run_consultation(
        &self,
        intake: Intake,
        cancel: CancellationToken,
    ) -> Result<ConsultationOutcome> {
        let mut state = intake.into_state();
        let row =
            consultations::insert_consultation(&self.pool, &state.patient.name, &state.goal)
                .await?;
        let id = row.id;
        tracing::info!(
            consultation_id = %id,
            patient = %state.patient.name,
            goal = %state.goal,
            "consultation started"
        );

        let mut cursor = FlowCursor::new();
        match self.drive(id, &mut state, &mut cursor, &cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                // Best effort: leave the row terminal and the failure on
                // the event log before surfacing the error.
                self.record_event(
                    id,
                    cursor.current(),
                    "consultation_failed",
                    json!({"error": format!("{err:#}")}),
                )
                .await;
                if let Err(update_err) =
                    consultations::set_consultation_status(&self.pool, id, ConsultationStatus::Failed)
                        .await
                {
                    tracing::warn!(
                        consultation_id = %id,
                        error = %update_err,
                        "failed to mark consultation failed"
                    );
                }
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        id: Uuid,
        state: &mut ConsultationState,
        cursor: &mut FlowCursor,
        cancel: &CancellationToken,
    ) -> Result<ConsultationOutcome> {
        // 1. Assess the stated goal.
        if cancel.is_cancelled() {
            return self.cancel(id).await;
        }
        let assessment = self.safety.assess_goal(&state.patient, &state.goal).await?;
        self.record_llm_call(id, cursor.current(), SafetyAgent::NAME, &assessment.cost)
            .await;
        self.record_event(
            id,
            cursor.current(),
            "goal_assessed",
            json!({
                "goal": state.goal,
                "safe": assessment.verdict.is_safe(),
                "rationale": assessment.verdict.rationale(),
            }),
        )
        .await;
        let goal_is_safe = assessment.verdict.is_safe();
        state.safety = Some(assessment.verdict.clone());

        if goal_is_safe {
            cursor.advance(ConsultationStep::CollectPreferences)?;
        } else {
            // 2. Unsafe: tell the doctor, then plan against a revision.
            cursor.advance(ConsultationStep::ReviseGoal)?;
            self.notify_doctor(id, cursor.current(), state, assessment.verdict.rationale())
                .await?;

            let revision = self
                .safety
                .revise_goal(&state.patient, &state.goal, assessment.verdict.rationale())
                .await?;
            self.record_llm_call(id, cursor.current(), SafetyAgent::NAME, &revision.cost)
                .await;
            self.record_event(
                id,
                cursor.current(),
                "goal_revised",
                json!({
                    "original_goal": state.goal,
                    "revised_goal": revision.goal,
                    "note": "Adjusted to a more gradual pace per safety guidelines",
                }),
            )
            .await;
            state.goal = revision.goal;
            consultations::update_consultation_goal(&self.pool, id, &state.goal).await?;
            cursor.advance(ConsultationStep::CollectPreferences)?;
        }

        // 3. Preferences and constraints come from the intake.
        if cancel.is_cancelled() {
            return self.cancel(id).await;
        }
        self.record_event(
            id,
            cursor.current(),
            "preferences_collected",
            json!({
                "preferences": state.preferences,
                "allergies": state.allergies,
                "weekly_budget": state.weekly_budget,
            }),
        )
        .await;
        cursor.advance(ConsultationStep::GeneratePlan)?;

        // 4. Generate and validate, retrying with tightened instructions.
        let mut extra_instructions = String::new();
        let escalation_reasons = loop {
            if cancel.is_cancelled() {
                return self.cancel(id).await;
            }

            state.attempt += 1;
            consultations::update_consultation_attempt(&self.pool, id, state.attempt).await?;
            let generated = self
                .nutrition
                .generate_meal_plan(state, &extra_instructions)
                .await?;
            self.record_llm_call(id, cursor.current(), NutritionAgent::NAME, &generated.cost)
                .await;
            self.record_event(
                id,
                cursor.current(),
                "plan_generated",
                json!({
                    "attempt": state.attempt,
                    "days": generated.plan.day_count(),
                }),
            )
            .await;
            state.meal_plan = Some(generated.plan);
            cursor.advance(ConsultationStep::ValidatePlan)?;

            let plan = state
                .meal_plan
                .as_ref()
                .context("meal plan missing after generation")?;
            let outcome = validate::validate_meal_plan(plan, &state.allergies, state.weekly_budget);
            self.record_event(
                id,
                cursor.current(),
                "plan_validated",
                json!({
                    "attempt": state.attempt,
                    "valid": outcome.is_valid(),
                    "reasons": outcome.reasons(),
                }),
            )
            .await;

            match outcome {
                ValidationOutcome::Valid => {
                    cursor.advance(ConsultationStep::DoctorReview)?;
                    break None;
                }
                ValidationOutcome::Invalid { reasons } => {
                    if state.attempt >= self.config.retry_max {
                        cursor.advance(ConsultationStep::Escalated)?;
                        break Some(reasons);
                    }
                    self.record_event(
                        id,
                        cursor.current(),
                        "plan_rejected",
                        json!({"attempt": state.attempt, "reasons": reasons}),
                    )
                    .await;
                    let addendum = stricter_instructions(&state.allergies, &reasons);
                    if !addendum.is_empty() && !extra_instructions.contains(&addendum) {
                        if !extra_instructions.is_empty() {
                            extra_instructions.push(' ');
                        }
                        extra_instructions.push_str(&addendum);
                    }
                    tracing::info!(
                        consultation_id = %id,
                        attempt = state.attempt,
                        reasons = ?reasons,
                        "plan rejected, regenerating"
                    );
                    cursor.advance(ConsultationStep::GeneratePlan)?;
                }
            }
        };

        if let Some(reasons) = escalation_reasons {
            tracing::warn!(
                consultation_id = %id,
                attempts = state.attempt,
                reasons = ?reasons,
                "no valid plan within retry budget, escalating"
            );
            consultations::set_consultation_status(&self.pool, id, ConsultationStatus::Escalated)
                .await?;
            self.record_event(
                id,
                cursor.current(),
                "consultation_failed",
                json!({"reasons": reasons, "attempts": state.attempt}),
            )
            .await;
            return Ok(ConsultationOutcome::Escalated {
                consultation_id: id,
                reasons,
            });
        }

        // 5. Doctor review: mail the proposed plan, then apply the reply.
        if cancel.is_cancelled() {
            return self.cancel(id).await;
        }
        let plan = state
            .meal_plan
            .clone()
            .context("meal plan missing before doctor review")?;
        self.mail_doctor(
            id,
            cursor.current(),
            &format!("Proposed meal plan for {}", state.patient.name),
            &format!("Proposed meal plan:\n{}", plan.text()),
        )
        .await?;
        match validate::doctor_review(&plan) {
            DoctorDecision::Approved { feedback } => {
                self.record_event(
                    id,
                    cursor.current(),
                    "doctor_reviewed",
                    json!({"approved": true, "feedback": feedback}),
                )
                .await;
            }
            DoctorDecision::Adjusted { feedback, plan } => {
                self.record_event(
                    id,
                    cursor.current(),
                    "doctor_reviewed",
                    json!({"approved": false, "feedback": feedback}),
                )
                .await;
                state.meal_plan = Some(plan);
            }
        }
        cursor.advance(ConsultationStep::Finalize)?;

        // 6. Finalize: book the visit, mail the patient, order groceries.
        if cancel.is_cancelled() {
            return self.cancel(id).await;
        }
        let final_plan = state
            .meal_plan
            .clone()
            .context("meal plan missing at finalize")?;

        let next_visit = calendar::follow_up_date(Utc::now().date_naive());
        let calendar_tool = self.tools.get(CalendarTool::NAME)?;
        let booked = calendar_tool
            .invoke(json!({"patient": state.patient.name, "date": next_visit.to_string()}))
            .await?;
        state.next_visit = Some(next_visit);
        self.record_event(
            id,
            cursor.current(),
            "visit_scheduled",
            json!({"date": next_visit.to_string(), "result": booked}),
        )
        .await;

        self.mail_patient(id, cursor.current(), state, &final_plan)
            .await?;

        let groceries = validate::derive_grocery_list(&final_plan);
        if groceries.is_empty() {
            tracing::warn!(consultation_id = %id, "no grocery items derived from plan");
        } else {
            let grocery_tool = self.tools.get(GroceryTool::NAME)?;
            let order = grocery_tool
                .invoke(json!({"items": groceries.as_map()}))
                .await?;
            self.record_event(
                id,
                cursor.current(),
                "grocery_ordered",
                json!({
                    "item_count": groceries.len(),
                    "total_units": groceries.total_units(),
                    "order": order,
                }),
            )
            .await;
        }

        // 7. Mark the consultation completed.
        consultations::complete_consultation(&self.pool, id, final_plan.text(), next_visit)
            .await?;
        cursor.advance(ConsultationStep::Completed)?;
        tracing::info!(
            consultation_id = %id,
            next_visit = %next_visit,
            attempts = state.attempt,
            "consultation completed"
        );

        Ok(ConsultationOutcome::Completed {
            consultation_id: id,
            meal_plan: final_plan.text().to_string(),
            next_visit,
            grocery_items: groceries.len(),
        })
    }

    async fn cancel(&self, id: Uuid) -> Result<ConsultationOutcome> {
        tracing::warn!(consultation_id = %id, "consultation canceled");
        consultations::set_consultation_status(&self.pool, id, ConsultationStatus::Canceled)
            .await?;
        Ok(ConsultationOutcome::Canceled {
            consultation_id: id,
        })
    }

    async fn notify_doctor(
        &self,
        id: Uuid,
        step: ConsultationStep,
        state: &ConsultationState,
        rationale: &str,
    ) -> Result<()> {
        let subject = format!("Unsafe dietary goal flagged for {}", state.patient.name);
        let body = format!(
            "The initial goal appears unsafe. Please provide a safer alternative.\n\n\
             Patient: {}\nStated goal: {}\nAssessment: {}\n",
            state.patient.summary(),
            state.goal,
            rationale
        );
        self.mail_doctor(id, step, &subject, &body).await
    }

    async fn mail_doctor(
        &self,
        id: Uuid,
        step: ConsultationStep,
        subject: &str,
        body: &str,
    ) -> Result<()> {
        let mail = self.tools.get(MailTool::NAME)?;
        let result = mail
            .invoke(json!({"to": self.config.doctor_email, "subject": subject, "body": body}))
            .await?;
        self.record_event(
            id,
            step,
            "mail_sent",
            json!({"to": self.config.doctor_email, "subject": subject, "result": result}),
        )
        .await;
        Ok(())
    }

    async fn mail_patient(
        &self,
        id: Uuid,
        step: ConsultationStep,
        state: &ConsultationState,
        plan: &MealPlan,
    ) -> Result<()> {
        let to = patient_address(&state.patient);
        let subject = "Your weekly meal plan";
        let next_visit = state
            .next_visit
            .map(|d| d.to_string())
            .unwrap_or_else(|| "to be confirmed".to_string());
        let body = format!(
            "Hello {},\n\nHere is your personalised weekly meal plan:\n\n{}\n\nYour next \
             appointment is scheduled on {}.\nPlease let us know if you have any questions \
             or concerns.\n",
            state.patient.name,
            plan.text(),
            next_visit
        );
        let mail = self.tools.get(MailTool::NAME)?;
        let result = mail
            .invoke(json!({"to": to, "subject": subject, "body": body}))
            .await?;
        self.record_event(
            id,
            step,
            "mail_sent",
            json!({"to": to, "subject": subject, "result": result}),
        )
        .await;
        Ok(())
    }

    /// Best effort: event logging never aborts a consultation.
    async fn record_event(
        &self,
        id: Uuid,
        step: ConsultationStep,
        event_type: &str,
        payload: serde_json::Value,
    ) {
        let event = NewWorkflowEvent {
            consultation_id: id,
            step: step.to_string(),
            event_type: event_type.to_string(),
            payload,
        };
        if let Err(err) = workflow_events::insert_workflow_event(&self.pool, &event).await {
            tracing::warn!(
                consultation_id = %id,
                event_type,
                error = %err,
                "failed to record workflow event"
            );
        }
    }

    async fn record_llm_call(
        &self,
        id: Uuid,
        step: ConsultationStep,
        agent: &str,
        cost: &CallCost,
    ) {
        self.record_event(
            id,
            step,
            "llm_called",
            json!({
                "agent": agent,
                "model": cost.model,
                "prompt_tokens": cost.usage.prompt_tokens,
                "completion_tokens": cost.usage.completion_tokens,
            }),
        )
        .await;
    }
}

/// Mailing address for a patient: taken from the intake when present,
/// derived from the name otherwise.
fn patient_address(patient: &PatientProfile) -> String {
    match &patient.email {
        Some(email) => email.clone(),
        None => format!(
            "{}@patients.nutriloop.local",
            patient.name.trim().to_lowercase().replace(' ', ".")
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_three_attempts() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.retry_max, 3);
        assert_eq!(config.doctor_email, "doctor@nutriloop.local");
    }

    #[test]
    fn patient_address_prefers_intake_email() {
        let mut patient = PatientProfile {
            name: "Jane Roe".to_string(),
            age: 34,
            weight_kg: 82.5,
            conditions: vec![],
            email: Some("jane@example.com".to_string()),
        };
        assert_eq!(patient_address(&patient), "jane@example.com");

        patient.email = None;
        assert_eq!(patient_address(&patient), "jane.roe@patients.nutriloop.local");
    }
}
