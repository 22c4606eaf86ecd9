//! Side-effecting integrations behind one object-safe interface.
//!
//! Tools take JSON arguments and return a JSON result, so the registry
//! can hold them uniformly and the CLI can list them.

pub mod calendar;
pub mod grocery;
pub mod mail;

pub use calendar::CalendarTool;
pub use grocery::GroceryTool;
pub use mail::{MailBackend, MailConfig, MailTool};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors from tool invocation and registry operations.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid tool arguments: {0}")]
    BadArgs(String),

    #[error("unknown tool: {0}")]
    Unknown(String),

    #[error("tool already registered: {0}")]
    Duplicate(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mail delivery failed: {0}")]
    Mail(String),
}

/// An invokable integration.
///
/// Object safe: the registry holds `Arc<dyn Tool>`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry key, e.g. `"send_mail"`.
    fn name(&self) -> &str;

    /// One-line description shown by `nutriloop tools`.
    fn description(&self) -> &str;

    /// Invoke with JSON arguments.
    async fn invoke(&self, args: Value) -> Result<Value, ToolError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Tool) {}
};

/// A collection of registered [`Tool`] implementations, keyed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Duplicate names are rejected rather than
    /// silently replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::Unknown(name.to_string()))
    }

    /// `(name, description)` pairs, sorted by name.
    pub fn list(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .tools
            .values()
            .map(|tool| (tool.name().to_string(), tool.description().to_string()))
            .collect();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
