//! Prompt templates and the chain that binds a template to a provider.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` render literal
//! braces. Rendering fails on a placeholder with no matching variable,
//! so prompt drift surfaces as an error rather than as text sent to a
//! model with a hole in it.

use std::sync::Arc;

use thiserror::Error;

use crate::llm::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, ProviderError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from template rendering.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("missing template variable '{0}'")]
    MissingVariable(String),

    #[error("unclosed placeholder in template '{0}'")]
    UnclosedPlaceholder(String),
}

/// Errors from running a chain: rendering or the provider call.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// A named prompt with a fixed system part and a templated user part.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    name: &'static str,
    system: &'static str,
    user: &'static str,
}

impl PromptTemplate {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Render both parts into the message pair sent to a provider.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<Vec<ChatMessage>, PromptError> {
        let system = fill(self.name, self.system, vars)?;
        let user = fill(self.name, self.user, vars)?;
        Ok(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }
}

/// Goal safety assessment.
pub const SAFETY_ASSESSMENT: PromptTemplate = PromptTemplate {
    name: "safety_assessment",
    system: "You are a medical safety assistant. Given a patient's profile and a goal, \
             decide whether the goal is medically safe. Respond with either 'safe' or \
             'unsafe' and briefly explain why.",
    user: "Patient profile: {patient}. Goal: {goal}.\nIs this goal safe?",
};

/// Revision of a goal judged unsafe.
pub const GOAL_REVISION: PromptTemplate = PromptTemplate {
    name: "goal_revision",
    system: "You are a medical safety assistant. Revise unsafe dietary goals into safer, \
             more gradual ones.",
    user: "Patient: {patient}\nGoal: {goal}\nAssessment: {rationale}\nRevise the goal to \
           a safer alternative. Respond with only the revised goal.",
};

/// Weekly meal plan generation.
///
/// `extra_instructions` is empty on the first attempt; retries append
/// constraint reminders to the end of the user message.
pub const MEAL_PLAN: PromptTemplate = PromptTemplate {
    name: "meal_plan",
    system: "You are a nutritionist tasked with creating simple weekly meal plans. The \
             plan should cover 7 days with breakfast, lunch and dinner. Avoid any foods \
             the patient is allergic to and aim to respect the stated budget when \
             possible. List each day's meals on a separate line in the format: 'Day X: \
             Breakfast – ...; Lunch – ...; Dinner – ...'.",
    user: "Goal: {goal}\nPatient preferences: {preferences}.\nAllergies: {allergies}.\n\
           Budget: {budget}.\nPlease generate a weekly meal plan.{extra_instructions}",
};

fn fill(name: &str, template: &str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut key = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    key.push(c);
                }
                if !closed {
                    return Err(PromptError::UnclosedPlaceholder(name.to_string()));
                }
                match vars.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => return Err(PromptError::MissingVariable(key)),
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// A template bound to a provider; one `run` renders and completes.
pub struct AgentChain {
    template: PromptTemplate,
    provider: Arc<dyn LlmProvider>,
}

impl AgentChain {
    pub fn new(template: PromptTemplate, provider: Arc<dyn LlmProvider>) -> Self {
        Self { template, provider }
    }

    pub fn template_name(&self) -> &'static str {
        self.template.name()
    }

    pub async fn run(&self, vars: &[(&str, &str)]) -> Result<CompletionResponse, ChainError> {
        let messages = self.template.render(vars)?;
        let response = self
            .provider
            .complete(CompletionRequest::new(messages))
            .await?;
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Role, ScriptedProvider};

    #[test]
    fn fill_substitutes_placeholders() {
        let out = fill("t", "Goal: {goal} for {patient}", &[("goal", "g"), ("patient", "p")])
            .expect("should render");
        assert_eq!(out, "Goal: g for p");
    }

    #[test]
    fn fill_ignores_extra_variables() {
        let out = fill("t", "hello {name}", &[("name", "world"), ("unused", "x")])
            .expect("should render");
        assert_eq!(out, "hello world");
    }

    #[test]
    fn fill_errors_on_missing_variable() {
        let err = fill("t", "hello {name}", &[]).expect_err("should fail");
        assert_eq!(err, PromptError::MissingVariable("name".to_string()));
    }

    #[test]
    fn fill_errors_on_unclosed_placeholder() {
        let err = fill("t", "hello {name", &[]).expect_err("should fail");
        assert_eq!(err, PromptError::UnclosedPlaceholder("t".to_string()));
    }

    #[test]
    fn doubled_braces_render_literally() {
        let out = fill("t", "json: {{\"k\": \"{v}\"}}", &[("v", "1")]).expect("should render");
        assert_eq!(out, "json: {\"k\": \"1\"}");
    }

    #[test]
    fn safety_template_renders_patient_and_goal() {
        let messages = SAFETY_ASSESSMENT
            .render(&[("patient", "Jane, age 34"), ("goal", "lose 3 kg")])
            .expect("should render");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("'safe' or 'unsafe'"));
        assert_eq!(
            messages[1].content,
            "Patient profile: Jane, age 34. Goal: lose 3 kg.\nIs this goal safe?"
        );
    }

    #[test]
    fn meal_plan_user_message_carries_the_request() {
        let messages = MEAL_PLAN
            .render(&[
                ("goal", "g"),
                ("preferences", "none"),
                ("allergies", "none"),
                ("budget", "100"),
                ("extra_instructions", ""),
            ])
            .expect("should render");
        assert!(messages[1].content.contains("Budget: 100."));
        assert!(messages[1].content.ends_with("Please generate a weekly meal plan."));
    }

    #[test]
    fn meal_plan_extra_instructions_append_to_the_end() {
        let messages = MEAL_PLAN
            .render(&[
                ("goal", "g"),
                ("preferences", "none"),
                ("allergies", "peanuts"),
                ("budget", "no budget specified"),
                ("extra_instructions", "\nPlease avoid the following foods: peanuts."),
            ])
            .expect("should render");
        assert!(messages[1].content.contains("Budget: no budget specified."));
        assert!(messages[1].content.ends_with("Please avoid the following foods: peanuts."));
    }

    #[test]
    fn revision_template_contains_revise_keyword() {
        let messages = GOAL_REVISION
            .render(&[("patient", "p"), ("goal", "g"), ("rationale", "r")])
            .expect("should render");
        assert!(messages[1].content.to_lowercase().contains("revise"));
    }

    #[tokio::test]
    async fn chain_renders_then_completes() {
        let chain = AgentChain::new(SAFETY_ASSESSMENT, Arc::new(ScriptedProvider::new()));
        assert_eq!(chain.template_name(), "safety_assessment");
        let response = chain
            .run(&[("patient", "Jane, age 34"), ("goal", "lose 3 kg in 2 months")])
            .await
            .expect("chain should run");
        assert_eq!(response.content, "safe: The goal appears reasonable.");
        assert!(response.usage.prompt_tokens > 0);
    }

    #[tokio::test]
    async fn chain_surfaces_render_errors() {
        let chain = AgentChain::new(SAFETY_ASSESSMENT, Arc::new(ScriptedProvider::new()));
        let err = chain.run(&[("patient", "p")]).await.expect_err("should fail");
        assert!(matches!(
            err,
            ChainError::Prompt(PromptError::MissingVariable(ref v)) if v == "goal"
        ));
    }
}
