//! Battery telemetry source

use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::config::NodePaths;
use crate::control::telemetry::{derive, BatteryNode, RawTelemetrySample, TemperatureUnit};
use crate::parts::PixelParts;
use crate::sensors::sysfs::NodePort;

// === Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BatteryInfoParams {
    #[schemars(description = "Show temperature in Fahrenheit (optional - uses the saved unit if not specified)")]
    pub fahrenheit: Option<bool>,
}

// === Helper Functions ===

/// Read every battery node once. Unreadable nodes are left out of the sample.
pub fn read_sample(port: &dyn NodePort, nodes: &NodePaths) -> RawTelemetrySample {
    let mut sample = RawTelemetrySample::new();
    for node in BatteryNode::ALL {
        let path = nodes.battery(node);
        match port.read(&path) {
            Ok(value) => sample.insert(node, value),
            Err(e) => tracing::debug!("Skipping battery {}: {}", node.key(), e),
        }
    }
    sample
}

// === Tool Functions ===

pub async fn get_battery_info(
    parts: &PixelParts,
    params: BatteryInfoParams,
) -> Result<CallToolResult, McpError> {
    let config = parts.settings();
    let unit = match params.fahrenheit {
        Some(true) => TemperatureUnit::Fahrenheit,
        Some(false) => TemperatureUnit::Celsius,
        None => config.battery_info.temperature_unit,
    };

    let sample = read_sample(parts.port(), &config.nodes);
    let derived = derive(&sample);

    Ok(CallToolResult::success(vec![Content::text(derived.report(unit))]))
}
