//! Intake documents: the TOML file that starts a consultation.
//!
//! ```toml
//! goal = "lose 10 kg rapidly"
//! preferences = ["vegetarian"]
//! allergies = ["peanuts"]
//! weekly_budget = 100.0
//!
//! [patient]
//! name = "Jane Roe"
//! age = 34
//! weight_kg = 82.5
//! conditions = ["hypertension"]
//! ```
//!
//! Only `patient` and `goal` are required. An absent `weekly_budget`
//! means no spending limit.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::state::{ConsultationState, PatientProfile};

/// One consultation request, as loaded from an intake file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intake {
    pub patient: PatientProfile,
    pub goal: String,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub weekly_budget: Option<f64>,
}

impl Intake {
    /// Parse and validate an intake document.
    pub fn from_toml(text: &str) -> Result<Self> {
        let intake: Intake = toml::from_str(text).context("failed to parse intake document")?;
        intake.validate()?;
        Ok(intake)
    }

    /// Load an intake document from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read intake file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid intake file {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.patient.name.trim().is_empty() {
            bail!("patient.name must not be empty");
        }
        if self.goal.trim().is_empty() {
            bail!("goal must not be empty");
        }
        if let Some(budget) = self.weekly_budget {
            if budget <= 0.0 {
                bail!("weekly_budget must be positive, got {budget}");
            }
        }
        Ok(())
    }

    /// Build the initial consultation state. List entries are trimmed
    /// and blanks dropped.
    pub fn into_state(self) -> ConsultationState {
        let mut state = ConsultationState::new(self.patient, self.goal);
        state.preferences = normalize(self.preferences);
        state.allergies = normalize(self.allergies);
        state.weekly_budget = self.weekly_budget;
        state
    }
}

fn normalize(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
