//! Forced fast charge toggle

use std::path::Path;

use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::NodeError;
use crate::parts::PixelParts;
use crate::sensors::sysfs::{read_parsed, NodePort};
use crate::shared::{internal_error, on_off};

// === Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetFastChargeParams {
    #[schemars(description = "Force fast charging on (true) or leave it to the kernel (false)")]
    pub enabled: bool,
}

// === Helper Functions ===

pub fn read(port: &dyn NodePort, path: &Path) -> Result<bool, NodeError> {
    read_parsed::<u8>(port, path).map(|v| v != 0)
}

pub fn write(port: &dyn NodePort, path: &Path, enabled: bool) -> Result<(), NodeError> {
    port.write(path, if enabled { "1" } else { "0" })
}

// === Tool Functions ===

pub async fn get_fast_charge(parts: &PixelParts) -> Result<CallToolResult, McpError> {
    let config = parts.settings();
    let text = match read(parts.port(), &config.nodes.fast_charge) {
        Ok(enabled) => format!(
            "Fast charge: {} (saved setting: {})",
            on_off(enabled),
            on_off(config.fast_charge.enabled)
        ),
        Err(e) => format!("Fast charge is not supported on this kernel ({})", e),
    };
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

pub async fn set_fast_charge(
    parts: &PixelParts,
    params: SetFastChargeParams,
) -> Result<CallToolResult, McpError> {
    let path = parts.settings().nodes.fast_charge;
    if !parts.port().is_writable(&path) {
        return Ok(CallToolResult::success(vec![Content::text(format!(
            "Fast charge node {} is not writable",
            path.display()
        ))]));
    }

    write(parts.port(), &path, params.enabled)
        .map_err(|e| internal_error(format!("Failed to set fast charge: {}", e)))?;
    parts
        .update(|c| c.fast_charge.enabled = params.enabled)
        .map_err(|e| internal_error(format!("Failed to save settings: {}", e)))?;
    tracing::info!("Fast charge set to {}", params.enabled);

    Ok(CallToolResult::success(vec![Content::text(format!(
        "Fast charge {}",
        if params.enabled { "enabled" } else { "disabled" }
    ))]))
}
