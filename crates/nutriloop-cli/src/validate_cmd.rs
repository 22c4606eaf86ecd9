//! `nutriloop validate` command: run the plan validators standalone.

use std::path::Path;

use anyhow::{Context, Result};

use nutriloop_core::state::MealPlan;
use nutriloop_core::validate::{self, ValidationOutcome};

/// Run the validate command. Exit code 1 when the plan is invalid.
pub fn run_validate(plan_path: &Path, allergies: &[String], budget: Option<f64>) -> Result<()> {
    let text = std::fs::read_to_string(plan_path)
        .with_context(|| format!("failed to read plan file {}", plan_path.display()))?;
    let plan = MealPlan::new(text);

    println!("Validating {} ({} days)", plan_path.display(), plan.day_count());
    if !allergies.is_empty() {
        println!("  Allergies: {}", allergies.join(", "));
    }
    match budget {
        Some(budget) => println!("  Budget: {budget}"),
        None => println!("  Budget: none"),
    }
    println!();

    match validate::validate_meal_plan(&plan, allergies, budget) {
        ValidationOutcome::Valid => {
            println!("Plan is valid.");
        }
        ValidationOutcome::Invalid { reasons } => {
            println!("Plan is invalid:");
            for reason in &reasons {
                println!("  - {reason}");
            }
            std::process::exit(1);
        }
    }

    Ok(())
}
