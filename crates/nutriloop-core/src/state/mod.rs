//! In-memory consultation state and the domain types that move through
//! the flow: patient profile, safety verdict, and meal plan.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Patient profile
// ---------------------------------------------------------------------------

/// The patient a consultation is for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub name: String,
    pub age: u32,
    pub weight_kg: f64,
    #[serde(default)]
    pub conditions: Vec<String>,
    /// Mailing address; derived from the name when absent.
    #[serde(default)]
    pub email: Option<String>,
}

impl PatientProfile {
    /// One-line summary used in prompts.
    pub fn summary(&self) -> String {
        let conditions = if self.conditions.is_empty() {
            "none".to_string()
        } else {
            self.conditions.join(", ")
        };
        format!(
            "{}, age {}, weight {} kg, conditions: {}",
            self.name, self.age, self.weight_kg, conditions
        )
    }
}

// ---------------------------------------------------------------------------
// Safety verdict
// ---------------------------------------------------------------------------

/// Outcome of a goal safety assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyVerdict {
    Safe { rationale: String },
    Unsafe { rationale: String },
}

impl SafetyVerdict {
    /// Parse an assessment reply.
    ///
    /// A reply starting with `unsafe` (any case) is unsafe; everything
    /// else, including free-form text, is treated as safe. The leading
    /// `safe`/`unsafe` marker and separator are stripped from the
    /// rationale.
    pub fn parse(reply: &str) -> Self {
        let trimmed = reply.trim();
        let lower = trimmed.to_lowercase();
        if lower.starts_with("unsafe") {
            Self::Unsafe {
                rationale: strip_marker(trimmed, "unsafe"),
            }
        } else if lower.starts_with("safe") {
            Self::Safe {
                rationale: strip_marker(trimmed, "safe"),
            }
        } else {
            Self::Safe {
                rationale: trimmed.to_string(),
            }
        }
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe { .. })
    }

    pub fn rationale(&self) -> &str {
        match self {
            Self::Safe { rationale } | Self::Unsafe { rationale } => rationale,
        }
    }
}

fn strip_marker(reply: &str, marker: &str) -> String {
    reply[marker.len()..]
        .trim_start_matches([':', ',', '.'])
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Meal plan
// ---------------------------------------------------------------------------

/// A generated weekly meal plan.
///
/// The canonical line shape is
/// `Day N: Breakfast – X; Lunch – Y; Dinner – Z` (en dash between the
/// meal label and the dish); validators and grocery derivation parse
/// that shape but tolerate free-form lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MealPlan {
    text: String,
}

impl MealPlan {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Non-empty trimmed lines, one per day.
    pub fn days(&self) -> Vec<&str> {
        self.text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    pub fn day_count(&self) -> usize {
        self.days().len()
    }
}

impl std::fmt::Display for MealPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

// ---------------------------------------------------------------------------
// Consultation state
// ---------------------------------------------------------------------------

/// The evolving state of one consultation run.
#[derive(Debug, Clone)]
pub struct ConsultationState {
    pub patient: PatientProfile,
    /// Current goal; replaced when a safety revision lands.
    pub goal: String,
    /// Goal as stated in the intake, never mutated.
    pub original_goal: String,
    pub preferences: Vec<String>,
    pub allergies: Vec<String>,
    /// Weekly food budget; `None` means no limit.
    pub weekly_budget: Option<f64>,
    pub meal_plan: Option<MealPlan>,
    pub safety: Option<SafetyVerdict>,
    pub next_visit: Option<NaiveDate>,
    /// Plan generation attempts so far.
    pub attempt: i32,
}

impl ConsultationState {
    pub fn new(patient: PatientProfile, goal: impl Into<String>) -> Self {
        let goal = goal.into();
        Self {
            patient,
            original_goal: goal.clone(),
            goal,
            preferences: Vec::new(),
            allergies: Vec::new(),
            weekly_budget: None,
            meal_plan: None,
            safety: None,
            next_visit: None,
            attempt: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
