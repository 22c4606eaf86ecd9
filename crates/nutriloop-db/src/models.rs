use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Running,
    Completed,
    Escalated,
    Failed,
    Canceled,
}

impl ConsultationStatus {
    /// Whether this status ends the consultation.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Escalated => "escalated",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

impl FromStr for ConsultationStatus {
    type Err = ConsultationStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "escalated" => Ok(Self::Escalated),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(ConsultationStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ConsultationStatus`] string.
#[derive(Debug, Clone)]
pub struct ConsultationStatusParseError(pub String);

impl fmt::Display for ConsultationStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid consultation status: {:?}", self.0)
    }
}

impl std::error::Error for ConsultationStatusParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A consultation -- one end-to-end run of the nutrition pipeline for a
/// single patient and goal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Consultation {
    pub id: Uuid,
    pub patient_name: String,
    /// Current goal; may differ from `original_goal` after a safety revision.
    pub goal: String,
    pub original_goal: String,
    pub status: ConsultationStatus,
    /// Plan generation attempts so far.
    pub attempt: i32,
    pub meal_plan: Option<String>,
    pub next_visit: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// An event recorded as a consultation advances through the flow.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowEvent {
    pub id: i64,
    pub consultation_id: Uuid,
    /// Flow step that produced the event.
    pub step: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
