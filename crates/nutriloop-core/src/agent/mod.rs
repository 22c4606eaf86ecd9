//! The two LLM-backed agents: safety assessment and nutrition planning.

pub mod nutrition;
pub mod safety;

pub use nutrition::NutritionAgent;
pub use safety::SafetyAgent;

use crate::llm::Usage;

/// What one agent call cost, for token accounting.
#[derive(Debug, Clone)]
pub struct CallCost {
    /// Model that served the call.
    pub model: String,
    pub usage: Usage,
}
