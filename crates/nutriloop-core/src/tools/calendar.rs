//! Calendar tool: books the follow-up visit.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::{Tool, ToolError};

/// Days between the consultation and the follow-up visit.
pub const FOLLOW_UP_DAYS: i64 = 14;

/// Follow-up date for a consultation held on `from`.
pub fn follow_up_date(from: NaiveDate) -> NaiveDate {
    from + Duration::days(FOLLOW_UP_DAYS)
}

#[derive(Debug, Deserialize)]
struct CalendarArgs {
    patient: String,
    /// ISO date, `YYYY-MM-DD`.
    date: String,
}

/// Books follow-up visits on the clinic calendar.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarTool;

impl CalendarTool {
    pub const NAME: &'static str = "schedule_visit";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for CalendarTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Schedule a follow-up visit on the clinic calendar"
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let args: CalendarArgs =
            serde_json::from_value(args).map_err(|e| ToolError::BadArgs(e.to_string()))?;
        let date = NaiveDate::parse_from_str(&args.date, "%Y-%m-%d")
            .map_err(|e| ToolError::BadArgs(format!("invalid date '{}': {e}", args.date)))?;
        info!(patient = %args.patient, date = %date, "scheduled follow-up visit");

        Ok(json!({
            "scheduled": true,
            "patient": args.patient,
            "date": date.to_string(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_up_is_two_weeks_out() {
        let from = NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date");
        assert_eq!(
            follow_up_date(from),
            NaiveDate::from_ymd_opt(2025, 3, 15).expect("valid date")
        );
    }

    #[tokio::test]
    async fn schedules_a_parsed_date() {
        let tool = CalendarTool::new();
        let result = tool
            .invoke(json!({"patient": "Jane Roe", "date": "2025-03-15"}))
            .await
            .expect("scheduling should succeed");
        assert_eq!(result["scheduled"], true);
        assert_eq!(result["date"], "2025-03-15");
    }

    #[tokio::test]
    async fn rejects_malformed_dates() {
        let tool = CalendarTool::new();
        let err = tool
            .invoke(json!({"patient": "Jane Roe", "date": "15/03/2025"}))
            .await
            .expect_err("bad date should fail");
        assert!(matches!(err, ToolError::BadArgs(_)));
    }
}
