//! Grocery tool: places the weekly staples order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::{Tool, ToolError};

#[derive(Debug, Deserialize)]
struct GroceryArgs {
    /// Item name to quantity.
    items: BTreeMap<String, u32>,
}

/// Orders the groceries a meal plan calls for.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroceryTool;

impl GroceryTool {
    pub const NAME: &'static str = "order_groceries";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for GroceryTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Place a grocery order for the week's meal plan"
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let args: GroceryArgs =
            serde_json::from_value(args).map_err(|e| ToolError::BadArgs(e.to_string()))?;
        if args.items.is_empty() {
            return Err(ToolError::BadArgs("no items to order".to_string()));
        }

        let total_units: u32 = args.items.values().sum();
        let order_ref = Uuid::new_v4();
        info!(
            items = args.items.len(),
            total_units,
            order_ref = %order_ref,
            "placed grocery order"
        );

        Ok(json!({
            "ordered": true,
            "order_ref": order_ref.to_string(),
            "item_count": args.items.len(),
            "total_units": total_units,
            "items": args.items,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
