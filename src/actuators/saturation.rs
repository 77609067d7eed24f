//! Display saturation through SurfaceFlinger

use std::path::Path;

use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::process::Command;

use crate::control::saturation;
use crate::parts::PixelParts;
use crate::shared::internal_error;

const SERVICE_BIN: &str = "/system/bin/service";
/// SurfaceFlinger transaction that sets the saturation matrix
const SATURATION_TRANSACTION: &str = "1022";

// === Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetSaturationParams {
    #[schemars(description = "Saturation level 0-100 (100 is stock)")]
    pub level: u32,
}

// === Helper Functions ===

/// Push the saturation for `level` to SurfaceFlinger
pub async fn apply(level: u32) -> anyhow::Result<()> {
    if !Path::new(SERVICE_BIN).exists() {
        anyhow::bail!("{} not found, not running on Android", SERVICE_BIN);
    }

    let factor = saturation::factor(level);
    let factor_arg = factor.to_string();
    let output = Command::new(SERVICE_BIN)
        .args(["call", "SurfaceFlinger", SATURATION_TRANSACTION, "f", factor_arg.as_str()])
        .output()
        .await?;

    if !output.status.success() {
        anyhow::bail!(
            "service call failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    tracing::info!("Saturation set to {} (factor {})", level, factor);
    Ok(())
}

// === Tool Functions ===

pub async fn get_saturation(parts: &PixelParts) -> Result<CallToolResult, McpError> {
    let level = parts.settings().saturation.level;
    Ok(CallToolResult::success(vec![Content::text(format!(
        "Saturation: {}% (factor {})",
        level,
        saturation::factor(level)
    ))]))
}

pub async fn set_saturation(
    parts: &PixelParts,
    params: SetSaturationParams,
) -> Result<CallToolResult, McpError> {
    let level = params.level.min(100);
    parts
        .update(|c| c.saturation.level = level)
        .map_err(|e| internal_error(format!("Failed to save settings: {}", e)))?;

    match apply(level).await {
        Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
            "Saturation set to {}%",
            level
        ))])),
        Err(e) => Ok(CallToolResult::success(vec![Content::text(format!(
            "Saved saturation {}%, but failed to apply it: {}",
            level, e
        ))])),
    }
}
