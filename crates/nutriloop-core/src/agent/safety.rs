//! Safety agent: assesses dietary goals, revises the unsafe ones.

use std::sync::Arc;

use tracing::info;

use super::CallCost;
use crate::llm::{LlmProvider, ProviderError};
use crate::prompt::{AgentChain, ChainError, GOAL_REVISION, SAFETY_ASSESSMENT};
use crate::state::{PatientProfile, SafetyVerdict};

/// Verdict plus the cost of obtaining it.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub verdict: SafetyVerdict,
    pub cost: CallCost,
}

/// A safer replacement goal plus the cost of obtaining it.
#[derive(Debug, Clone)]
pub struct Revision {
    pub goal: String,
    pub cost: CallCost,
}

pub struct SafetyAgent {
    assess: AgentChain,
    revise: AgentChain,
}

impl SafetyAgent {
    pub const NAME: &'static str = "safety";

    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            assess: AgentChain::new(SAFETY_ASSESSMENT, provider.clone()),
            revise: AgentChain::new(GOAL_REVISION, provider),
        }
    }

    /// Ask whether `goal` is safe for this patient.
    pub async fn assess_goal(
        &self,
        patient: &PatientProfile,
        goal: &str,
    ) -> Result<Assessment, ChainError> {
        let summary = patient.summary();
        let response = self
            .assess
            .run(&[("patient", &summary), ("goal", goal)])
            .await?;
        let verdict = SafetyVerdict::parse(&response.content);
        info!(goal, safe = verdict.is_safe(), "assessed dietary goal");

        Ok(Assessment {
            verdict,
            cost: CallCost {
                model: response.model,
                usage: response.usage,
            },
        })
    }

    /// Produce a safer revision of a goal judged unsafe.
    ///
    /// The revised goal is the first non-empty line of the reply; a
    /// blank reply is an error, since planning cannot proceed without a
    /// goal.
    pub async fn revise_goal(
        &self,
        patient: &PatientProfile,
        goal: &str,
        rationale: &str,
    ) -> Result<Revision, ChainError> {
        let summary = patient.summary();
        let response = self
            .revise
            .run(&[
                ("patient", &summary),
                ("goal", goal),
                ("rationale", rationale),
            ])
            .await?;

        let revised = response
            .content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or(ChainError::Provider(ProviderError::EmptyResponse))?
            .to_string();
        info!(from = goal, to = %revised, "revised dietary goal");

        Ok(Revision {
            goal: revised,
            cost: CallCost {
                model: response.model,
                usage: response.usage,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedProvider;

    fn patient() -> PatientProfile {
        PatientProfile {
            name: "Jane Roe".to_string(),
            age: 34,
            weight_kg: 82.5,
            conditions: vec![],
            email: None,
        }
    }

    fn agent() -> SafetyAgent {
        SafetyAgent::new(Arc::new(ScriptedProvider::new()))
    }

    #[tokio::test]
    async fn gradual_goal_assessed_safe() {
        let assessment = agent()
            .assess_goal(&patient(), "lose 3 kg in 2 months")
            .await
            .expect("assessment should run");
        assert!(assessment.verdict.is_safe());
        assert_eq!(assessment.verdict.rationale(), "The goal appears reasonable.");
        assert_eq!(assessment.cost.model, "scripted");
        assert!(assessment.cost.usage.prompt_tokens > 0);
    }

    #[tokio::test]
    async fn rapid_goal_assessed_unsafe() {
        let assessment = agent()
            .assess_goal(&patient(), "lose 10 kg rapidly")
            .await
            .expect("assessment should run");
        assert!(!assessment.verdict.is_safe());
        assert_eq!(
            assessment.verdict.rationale(),
            "The goal is too aggressive and may pose health risks."
        );
    }

    #[tokio::test]
    async fn revision_returns_single_line_goal() {
        let revision = agent()
            .revise_goal(&patient(), "lose 10 kg rapidly", "too fast")
            .await
            .expect("revision should run");
        assert_eq!(revision.goal, "lose 5 kg in 8 weeks");
    }
}
