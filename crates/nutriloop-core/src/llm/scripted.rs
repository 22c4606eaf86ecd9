//! Deterministic offline provider.
//!
//! Answers from fixed rules instead of a model: keyword-matched safety
//! verdicts, a rotating selection of staple foods for meal plans, and a
//! canned goal revision. Used when no API key is configured, and by
//! tests that need reproducible runs.

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmProvider, ProviderError, Role, Usage};

/// Staple foods the generated plans rotate through.
const SAFE_FOODS: [&str; 9] = [
    "oatmeal",
    "yogurt",
    "salad",
    "grilled chicken",
    "steamed vegetables",
    "brown rice",
    "fruit",
    "quinoa",
    "lentil soup",
];

/// Words that flag a goal as unsafe.
const UNSAFE_MARKERS: [&str; 4] = ["rapid", "aggressive", "anorexia", "dangerous"];

/// The revision offered for any unsafe goal.
pub const REVISED_GOAL: &str = "lose 5 kg in 8 weeks";

/// Rule-based provider with fully deterministic replies.
///
/// Only the last user message is inspected; system text never routes
/// a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedProvider;

impl ScriptedProvider {
    pub fn new() -> Self {
        Self
    }

    /// Dispatch on keywords in the last user message. Revision is
    /// checked first because revision prompts also mention safety and
    /// the goal.
    fn reply_for(prompt: &str) -> String {
        let lower = prompt.to_lowercase();
        if lower.contains("revise") {
            return REVISED_GOAL.to_string();
        }
        if lower.contains("safe") && lower.contains("goal") {
            if UNSAFE_MARKERS.iter().any(|w| lower.contains(w)) {
                return "unsafe: The goal is too aggressive and may pose health risks."
                    .to_string();
            }
            return "safe: The goal appears reasonable.".to_string();
        }
        if lower.contains("meal plan") {
            return render_week();
        }
        "ok".to_string()
    }
}

fn render_week() -> String {
    let mut lines = Vec::with_capacity(7);
    for day in 1..=7usize {
        let breakfast = SAFE_FOODS[(day * 3) % SAFE_FOODS.len()];
        let lunch = SAFE_FOODS[(day * 3 + 1) % SAFE_FOODS.len()];
        let dinner = SAFE_FOODS[(day * 3 + 2) % SAFE_FOODS.len()];
        lines.push(format!(
            "Day {day}: Breakfast – {breakfast}; Lunch – {lunch}; Dinner – {dinner}"
        ));
    }
    lines.join("\n")
}

/// Whitespace token count, standing in for real tokenizer counts.
fn estimate_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let content = Self::reply_for(last_user);

        let prompt_tokens: u32 = request
            .messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum();
        let completion_tokens = estimate_tokens(&content);
        let usage = Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        };

        Ok(CompletionResponse {
            content,
            model: "scripted".to_string(),
            usage,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    #[test]
    fn benign_goal_is_judged_safe() {
        let reply = ScriptedProvider::reply_for(
            "Patient profile: Jane. Goal: lose 3 kg in 2 months.\nIs this goal safe?",
        );
        assert_eq!(reply, "safe: The goal appears reasonable.");
    }

    #[test]
    fn rapid_goal_is_judged_unsafe() {
        let reply = ScriptedProvider::reply_for(
            "Patient profile: Jane. Goal: lose 10 kg rapidly.\nIs this goal safe?",
        );
        assert_eq!(
            reply,
            "unsafe: The goal is too aggressive and may pose health risks."
        );
    }

    #[test]
    fn unsafe_markers_match_any_case() {
        let reply = ScriptedProvider::reply_for(
            "Is this goal safe?\nGoal: AGGRESSIVE cutting before summer",
        );
        assert!(reply.starts_with("unsafe:"));
    }

    #[test]
    fn revision_prompt_wins_over_safety_keywords() {
        // Contains "safe" and "goal" too; "revise" must take precedence.
        let reply =
            ScriptedProvider::reply_for("The goal was unsafe. Revise it to a safer alternative.");
        assert_eq!(reply, REVISED_GOAL);
    }

    #[test]
    fn meal_plan_rotates_staples_over_seven_days() {
        let reply = ScriptedProvider::reply_for("Please generate a weekly meal plan.");
        let lines: Vec<&str> = reply.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(
            lines[0],
            "Day 1: Breakfast – grilled chicken; Lunch – steamed vegetables; Dinner – brown rice"
        );
        assert_eq!(
            lines[1],
            "Day 2: Breakfast – fruit; Lunch – quinoa; Dinner – lentil soup"
        );
        assert_eq!(
            lines[2],
            "Day 3: Breakfast – oatmeal; Lunch – yogurt; Dinner – salad"
        );
        // The rotation wraps: day 4 repeats day 1.
        assert_eq!(lines[3], lines[0]);
    }

    #[test]
    fn unrecognized_prompt_gets_ok() {
        assert_eq!(ScriptedProvider::reply_for("ping"), "ok");
    }

    #[tokio::test]
    async fn system_text_never_routes_the_reply() {
        let provider = ScriptedProvider::new();
        let request = CompletionRequest::new(vec![
            ChatMessage::system("Decide whether the goal is safe. Produce a meal plan."),
            ChatMessage::user("ping"),
        ]);
        let response = provider
            .complete(request)
            .await
            .expect("scripted provider should never fail");
        assert_eq!(response.content, "ok");
    }

    #[tokio::test]
    async fn complete_counts_whitespace_tokens() {
        let provider = ScriptedProvider::new();
        let request = CompletionRequest::new(vec![
            ChatMessage::system("one two three"),
            ChatMessage::user("four five"),
        ]);
        let response = provider
            .complete(request)
            .await
            .expect("scripted provider should never fail");
        assert_eq!(response.content, "ok");
        assert_eq!(response.model, "scripted");
        assert_eq!(response.usage.prompt_tokens, 5);
        assert_eq!(response.usage.completion_tokens, 1);
        assert_eq!(response.usage.total_tokens, 6);
    }
}
