//! Plan validation, the doctor review gate, and grocery derivation.
//!
//! All three are pure functions over the plan text, so they behave the
//! same inside the orchestrator and behind `nutriloop validate`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::MealPlan;

/// Meals per plan line.
const MEALS_PER_DAY: f64 = 3.0;
/// Flat cost estimate per meal, in the intake's currency units.
const COST_PER_MEAL: f64 = 5.0;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Result of checking a plan against the intake constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Valid,
    Invalid { reasons: Vec<String> },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            Self::Valid => &[],
            Self::Invalid { reasons } => reasons,
        }
    }

    /// All reasons joined with `"; "`; empty for a valid plan.
    pub fn report(&self) -> String {
        self.reasons().join("; ")
    }
}

/// Check a plan for allergens and for fitting the weekly budget.
///
/// Allergen matching is a case-insensitive substring search over the
/// whole plan. Cost is a flat estimate: three meals per non-empty line
/// at five units each, compared against the budget when one is set.
pub fn validate_meal_plan(
    plan: &MealPlan,
    allergies: &[String],
    weekly_budget: Option<f64>,
) -> ValidationOutcome {
    let mut reasons = Vec::new();
    let plan_lower = plan.text().to_lowercase();

    for allergy in allergies {
        let needle = allergy.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        if plan_lower.contains(&needle) {
            reasons.push(format!("contains allergen '{allergy}'"));
        }
    }

    if let Some(budget) = weekly_budget {
        let estimated_cost = plan.day_count() as f64 * MEALS_PER_DAY * COST_PER_MEAL;
        if estimated_cost > budget {
            reasons.push(format!("estimated cost {estimated_cost} exceeds budget {budget}"));
        }
    }

    if reasons.is_empty() {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::Invalid { reasons }
    }
}

// ---------------------------------------------------------------------------
// Doctor review
// ---------------------------------------------------------------------------

/// Decision from the doctor review of a validated plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoctorDecision {
    Approved {
        feedback: String,
    },
    /// The plan came back with adjustments applied.
    Adjusted {
        feedback: String,
        plan: MealPlan,
    },
}

impl DoctorDecision {
    pub fn feedback(&self) -> &str {
        match self {
            Self::Approved { feedback } | Self::Adjusted { feedback, .. } => feedback,
        }
    }
}

/// Apply the supervising doctor's standing rule: fried items come back
/// replaced with grilled alternatives, anything else is approved as is.
pub fn doctor_review(plan: &MealPlan) -> DoctorDecision {
    let lower = plan.text().to_lowercase();
    if lower.contains("fried") {
        DoctorDecision::Adjusted {
            feedback: "Please replace all fried items with grilled alternatives.".to_string(),
            plan: MealPlan::new(lower.replace("fried", "grilled")),
        }
    } else {
        DoctorDecision::Approved {
            feedback: "Doctor approved the meal plan.".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Grocery derivation
// ---------------------------------------------------------------------------

/// Grocery items for one week, keyed by lowercased dish name with the
/// number of times each appears in the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroceryList {
    items: BTreeMap<String, u32>,
}

impl GroceryList {
    pub fn items(&self) -> impl Iterator<Item = (&str, u32)> {
        self.items.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn as_map(&self) -> &BTreeMap<String, u32> {
        &self.items
    }

    pub fn count(&self, item: &str) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_units(&self) -> u32 {
        self.items.values().sum()
    }
}

/// Derive the shopping list from a plan.
///
/// Each line drops everything up to its first colon, meal separators
/// are normalized, and the remaining dish names are counted. Lines
/// without a colon are taken whole. Meal labels are stripped without
/// regard to case, along with any separator characters they drag in.
pub fn derive_grocery_list(plan: &MealPlan) -> GroceryList {
    let mut items = BTreeMap::new();

    for line in plan.days() {
        let meals = match line.split_once(':') {
            Some((_, rest)) => rest,
            None => line,
        };
        let meals = meals.replace('–', ":").replace(';', ",");
        for part in meals.split(',') {
            let mut dish = part.trim();
            for label in ["Breakfast", "Lunch", "Dinner"] {
                let matches_label = dish
                    .get(..label.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(label));
                if matches_label {
                    dish = dish[label.len()..].trim_matches(|c: char| {
                        c == '–' || c == '-' || c == ':' || c.is_whitespace()
                    });
                }
            }
            if dish.is_empty() {
                continue;
            }
            *items.entry(dish.to_lowercase()).or_insert(0) += 1;
        }
    }

    GroceryList { items }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
