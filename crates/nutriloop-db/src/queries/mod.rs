//! Query functions, one module per table.

pub mod consultations;
pub mod workflow_events;
