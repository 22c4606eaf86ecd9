//! Nutrition agent: generates the weekly meal plan.

use std::sync::Arc;

use tracing::info;

use super::CallCost;
use crate::llm::LlmProvider;
use crate::prompt::{AgentChain, ChainError, MEAL_PLAN};
use crate::state::{ConsultationState, MealPlan};

/// A generated plan plus the cost of obtaining it.
#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    pub plan: MealPlan,
    pub cost: CallCost,
}

pub struct NutritionAgent {
    chain: AgentChain,
}

impl NutritionAgent {
    pub const NAME: &'static str = "nutrition";

    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            chain: AgentChain::new(MEAL_PLAN, provider),
        }
    }

    /// Generate a plan for the consultation's goal and constraints.
    ///
    /// `extra_instructions` carries the tightened wording added after a
    /// rejected attempt; empty on the first try.
    pub async fn generate_meal_plan(
        &self,
        state: &ConsultationState,
        extra_instructions: &str,
    ) -> Result<GeneratedPlan, ChainError> {
        let preferences = join_or_none(&state.preferences);
        let allergies = join_or_none(&state.allergies);
        let budget = match state.weekly_budget {
            Some(budget) => budget.to_string(),
            None => "no budget specified".to_string(),
        };
        let extra = if extra_instructions.is_empty() {
            String::new()
        } else {
            format!("\n{extra_instructions}")
        };

        let response = self
            .chain
            .run(&[
                ("goal", &state.goal),
                ("preferences", &preferences),
                ("allergies", &allergies),
                ("budget", &budget),
                ("extra_instructions", &extra),
            ])
            .await?;
        let plan = MealPlan::new(response.content);
        info!(days = plan.day_count(), "generated meal plan");

        Ok(GeneratedPlan {
            plan,
            cost: CallCost {
                model: response.model,
                usage: response.usage,
            },
        })
    }
}

/// Instructions appended to the next generation attempt after a plan is
/// rejected. Each rejection reason class contributes one sentence.
pub fn stricter_instructions(allergies: &[String], reasons: &[String]) -> String {
    let mut extra = Vec::new();
    if reasons.iter().any(|r| r.contains("allergen")) {
        extra.push(format!(
            "Please avoid the following foods: {}.",
            allergies.join(", ")
        ));
    }
    if reasons.iter().any(|r| r.contains("budget")) {
        extra.push(
            "Also ensure the total estimated cost does not exceed the patient's budget."
                .to_string(),
        );
    }
    extra.join(" ")
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "none".to_string()
    } else {
        values.join(", ")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedProvider;
    use crate::state::PatientProfile;

    fn state() -> ConsultationState {
        let patient = PatientProfile {
            name: "Jane Roe".to_string(),
            age: 34,
            weight_kg: 82.5,
            conditions: vec![],
            email: None,
        };
        ConsultationState::new(patient, "lose 3 kg in 2 months")
    }

    #[tokio::test]
    async fn generates_seven_day_plan() {
        let agent = NutritionAgent::new(Arc::new(ScriptedProvider::new()));
        let generated = agent
            .generate_meal_plan(&state(), "")
            .await
            .expect("generation should run");
        assert_eq!(generated.plan.day_count(), 7);
        assert!(generated.plan.text().starts_with("Day 1: Breakfast – "));
        assert!(generated.cost.usage.completion_tokens > 0);
    }

    #[test]
    fn stricter_instructions_for_allergen_rejection() {
        let allergies = vec!["peanuts".to_string(), "shellfish".to_string()];
        let reasons = vec!["contains allergen 'peanuts'".to_string()];
        assert_eq!(
            stricter_instructions(&allergies, &reasons),
            "Please avoid the following foods: peanuts, shellfish."
        );
    }

    #[test]
    fn stricter_instructions_for_budget_rejection() {
        let reasons = vec!["estimated cost 105 exceeds budget 50".to_string()];
        assert_eq!(
            stricter_instructions(&[], &reasons),
            "Also ensure the total estimated cost does not exceed the patient's budget."
        );
    }

    #[test]
    fn stricter_instructions_combine_in_order() {
        let allergies = vec!["eggs".to_string()];
        let reasons = vec![
            "contains allergen 'eggs'".to_string(),
            "estimated cost 105 exceeds budget 50".to_string(),
        ];
        assert_eq!(
            stricter_instructions(&allergies, &reasons),
            "Please avoid the following foods: eggs. Also ensure the total estimated cost \
             does not exceed the patient's budget."
        );
    }

    #[test]
    fn no_instructions_for_unrelated_reasons() {
        assert_eq!(stricter_instructions(&[], &["odd".to_string()]), "");
    }
}
