//! The consultation flow graph.
//!
//! Steps are nodes, transitions are edges, and a cursor walks the graph
//! enforcing that only legal edges are taken:
//!
//! ```text
//! assess_goal         -> collect_preferences   (goal safe)
//! assess_goal         -> revise_goal           (goal unsafe)
//! revise_goal         -> collect_preferences
//! collect_preferences -> generate_plan
//! generate_plan       -> validate_plan
//! validate_plan       -> generate_plan         (rejected, retry)
//! validate_plan       -> doctor_review         (valid)
//! validate_plan       -> escalated             (retries exhausted)
//! doctor_review       -> finalize
//! finalize            -> completed
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A node in the consultation flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStep {
    AssessGoal,
    ReviseGoal,
    CollectPreferences,
    GeneratePlan,
    ValidatePlan,
    DoctorReview,
    Finalize,
    Completed,
    Escalated,
}

impl ConsultationStep {
    /// Check whether `from -> to` is an edge of the flow graph.
    pub fn is_valid_transition(from: Self, to: Self) -> bool {
        use ConsultationStep::*;
        matches!(
            (from, to),
            (AssessGoal, CollectPreferences)
                | (AssessGoal, ReviseGoal)
                | (ReviseGoal, CollectPreferences)
                | (CollectPreferences, GeneratePlan)
                | (GeneratePlan, ValidatePlan)
                | (ValidatePlan, GeneratePlan)
                | (ValidatePlan, DoctorReview)
                | (ValidatePlan, Escalated)
                | (DoctorReview, Finalize)
                | (Finalize, Completed)
        )
    }

    /// Steps with no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Escalated)
    }
}

impl fmt::Display for ConsultationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AssessGoal => "assess_goal",
            Self::ReviseGoal => "revise_goal",
            Self::CollectPreferences => "collect_preferences",
            Self::GeneratePlan => "generate_plan",
            Self::ValidatePlan => "validate_plan",
            Self::DoctorReview => "doctor_review",
            Self::Finalize => "finalize",
            Self::Completed => "completed",
            Self::Escalated => "escalated",
        };
        write!(f, "{}", s)
    }
}

/// Error parsing a step name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepParseError(pub String);

impl fmt::Display for StepParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid consultation step: {}", self.0)
    }
}

impl std::error::Error for StepParseError {}

impl FromStr for ConsultationStep {
    type Err = StepParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assess_goal" => Ok(Self::AssessGoal),
            "revise_goal" => Ok(Self::ReviseGoal),
            "collect_preferences" => Ok(Self::CollectPreferences),
            "generate_plan" => Ok(Self::GeneratePlan),
            "validate_plan" => Ok(Self::ValidatePlan),
            "doctor_review" => Ok(Self::DoctorReview),
            "finalize" => Ok(Self::Finalize),
            "completed" => Ok(Self::Completed),
            "escalated" => Ok(Self::Escalated),
            other => Err(StepParseError(other.to_string())),
        }
    }
}

/// Attempted transition that is not an edge of the graph.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid step transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ConsultationStep,
    pub to: ConsultationStep,
}

/// Walks the flow graph, starting at [`ConsultationStep::AssessGoal`].
#[derive(Debug, Clone)]
pub struct FlowCursor {
    current: ConsultationStep,
}

impl FlowCursor {
    pub fn new() -> Self {
        Self {
            current: ConsultationStep::AssessGoal,
        }
    }

    pub fn current(&self) -> ConsultationStep {
        self.current
    }

    /// Move along one edge, rejecting anything not in the graph.
    pub fn advance(&mut self, to: ConsultationStep) -> Result<(), InvalidTransition> {
        if !ConsultationStep::is_valid_transition(self.current, to) {
            return Err(InvalidTransition {
                from: self.current,
                to,
            });
        }
        self.current = to;
        Ok(())
    }
}

impl Default for FlowCursor {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ConsultationStep::*;

    #[test]
    fn happy_path_edges_are_valid() {
        let path = [
            (AssessGoal, CollectPreferences),
            (CollectPreferences, GeneratePlan),
            (GeneratePlan, ValidatePlan),
            (ValidatePlan, DoctorReview),
            (DoctorReview, Finalize),
            (Finalize, Completed),
        ];
        for (from, to) in path {
            assert!(
                ConsultationStep::is_valid_transition(from, to),
                "{from} -> {to} should be valid"
            );
        }
    }

    #[test]
    fn revision_and_retry_edges_are_valid() {
        assert!(ConsultationStep::is_valid_transition(AssessGoal, ReviseGoal));
        assert!(ConsultationStep::is_valid_transition(ReviseGoal, CollectPreferences));
        assert!(ConsultationStep::is_valid_transition(ValidatePlan, GeneratePlan));
        assert!(ConsultationStep::is_valid_transition(ValidatePlan, Escalated));
    }

    #[test]
    fn skipping_steps_is_invalid() {
        assert!(!ConsultationStep::is_valid_transition(AssessGoal, GeneratePlan));
        assert!(!ConsultationStep::is_valid_transition(GeneratePlan, DoctorReview));
        assert!(!ConsultationStep::is_valid_transition(CollectPreferences, Completed));
    }

    const ALL_STEPS: [ConsultationStep; 9] = [
        AssessGoal,
        ReviseGoal,
        CollectPreferences,
        GeneratePlan,
        ValidatePlan,
        DoctorReview,
        Finalize,
        Completed,
        Escalated,
    ];

    #[test]
    fn terminal_steps_have_no_outgoing_edges() {
        for to in ALL_STEPS {
            assert!(!ConsultationStep::is_valid_transition(Completed, to));
            assert!(!ConsultationStep::is_valid_transition(Escalated, to));
        }
        assert!(Completed.is_terminal());
        assert!(Escalated.is_terminal());
        assert!(!ValidatePlan.is_terminal());
    }

    #[test]
    fn display_and_parse_round_trip() {
        for step in ALL_STEPS {
            let parsed: ConsultationStep =
                step.to_string().parse().expect("should parse rendered step");
            assert_eq!(parsed, step);
        }
    }

    #[test]
    fn parse_rejects_unknown_step() {
        let err = "teleport".parse::<ConsultationStep>().expect_err("should fail");
        assert_eq!(err, StepParseError("teleport".to_string()));
    }

    #[test]
    fn cursor_walks_valid_edges_only() {
        let mut cursor = FlowCursor::new();
        assert_eq!(cursor.current(), AssessGoal);

        cursor.advance(CollectPreferences).expect("edge should be valid");
        cursor.advance(GeneratePlan).expect("edge should be valid");
        assert_eq!(cursor.current(), GeneratePlan);

        let err = cursor.advance(Completed).expect_err("jump should be rejected");
        assert_eq!(
            err,
            InvalidTransition {
                from: GeneratePlan,
                to: Completed
            }
        );
        // Rejected advance leaves the cursor in place.
        assert_eq!(cursor.current(), GeneratePlan);
    }
}
