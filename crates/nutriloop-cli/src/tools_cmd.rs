//! `nutriloop tools` command: list the registered tools.

use std::sync::Arc;

use anyhow::Result;

use nutriloop_core::tools::{CalendarTool, GroceryTool, MailConfig, MailTool, ToolRegistry};

/// Run the tools command.
pub fn run_tools(mail: MailConfig) -> Result<()> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(MailTool::new(mail)?))?;
    registry.register(Arc::new(CalendarTool::new()))?;
    registry.register(Arc::new(GroceryTool::new()))?;

    println!("Registered tools ({}):", registry.len());
    for (name, description) in registry.list() {
        println!("  {name:<16} {description}");
    }

    Ok(())
}
