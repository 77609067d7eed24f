//! Auto high brightness mode service

use std::time::Duration;

use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::actuators::hbm::HbmSwitch;
use crate::control::ambient::{AmbientDecision, AmbientLightActuator};
use crate::parts::{AutoHbmStatus, PixelParts, Shared};
use crate::sensors::iio::{IioLightSensor, SampleSource};
use crate::services::elapsed_ms;
use crate::services::torch::SetEnabledParams;
use crate::shared::{internal_error, on_off};

// === Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetThresholdParams {
    #[schemars(description = "Ambient light in lux at or above which HBM turns on")]
    pub threshold: i32,
}

// === Service Loop ===

/// Push a decision to the HBM node and publish it
fn apply_decision(hbm: &mut HbmSwitch, decision: AmbientDecision, status: &watch::Sender<AutoHbmStatus>) {
    let error = match hbm.set(decision.over_threshold) {
        Ok(true) => {
            tracing::info!(
                "HBM {} at {} lux (threshold {})",
                on_off(decision.over_threshold),
                decision.current_lux,
                decision.threshold
            );
            None
        }
        Ok(false) => None,
        Err(e) => {
            tracing::warn!("Failed to switch HBM: {}", e);
            Some(e.to_string())
        }
    };

    let hbm_on = hbm.last();
    status.send_modify(|s| {
        s.decision = Some(decision);
        s.hbm_on = hbm_on;
        s.last_error = error;
    });
}

pub async fn run(shared: Shared, mut shutdown: watch::Receiver<bool>) {
    let config = shared.settings();
    let mut actuator = AmbientLightActuator::new();
    let mut source = IioLightSensor::new(shared.port.clone(), config.nodes.light_device);
    let mut hbm = HbmSwitch::new(shared.port.clone(), config.nodes.hbm);
    if !hbm.is_available() {
        tracing::warn!("HBM node is not writable, decisions will only be reported");
    }

    let mut ticker = interval(Duration::from_millis(config.auto_hbm.poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = Instant::now();
    let mut threshold = config.auto_hbm.threshold;
    let mut failing = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let previous = threshold;
        threshold = shared.settings().auto_hbm.threshold;

        let decision = match source.sample(elapsed_ms(started)) {
            Ok(reading) => {
                if failing {
                    tracing::info!("Light sensor readable again");
                    failing = false;
                }
                actuator.on_reading(&reading, threshold)
            }
            Err(e) => {
                if !failing {
                    tracing::warn!("Light sensor unavailable: {}", e);
                    shared.hbm_status.send_modify(|s| s.last_error = Some(e.to_string()));
                    failing = true;
                }
                // keep HBM in line with a new threshold while the sensor is away
                if threshold != previous {
                    actuator.rethreshold(threshold)
                } else {
                    None
                }
            }
        };

        if let Some(decision) = decision {
            apply_decision(&mut hbm, decision, &shared.hbm_status);
        }
    }

    if hbm.last() == Some(true) {
        match hbm.set(false) {
            Ok(_) => tracing::info!("HBM off, service stopping"),
            Err(e) => tracing::warn!("Failed to switch HBM off: {}", e),
        }
    }
    shared.hbm_status.send_modify(|s| s.hbm_on = hbm.last());
    tracing::debug!("Auto HBM loop exiting");
}

// === Tool Functions ===

pub async fn get_auto_hbm(parts: &PixelParts) -> Result<CallToolResult, McpError> {
    let settings = parts.settings().auto_hbm;
    let state = parts.auto_hbm_state().await;
    let status = parts.shared().hbm_status.borrow().clone();

    let mut text = String::from("Auto HBM:\n\n");
    text.push_str(&format!("  Enabled: {}\n", on_off(settings.enabled)));
    text.push_str(&format!("  Service: {}\n", state.label()));
    text.push_str(&format!("  Threshold: {} lux\n", settings.threshold));
    if let Some(d) = status.decision {
        text.push_str(&format!(
            "  Current lux: {} / {} ({:.0}%)\n",
            d.current_lux,
            d.threshold,
            d.percent.ratio() * 100.0
        ));
        text.push_str(&format!(
            "  Recommendation: HBM {}\n",
            on_off(d.over_threshold)
        ));
    }
    if let Some(on) = status.hbm_on {
        text.push_str(&format!("  HBM node: {}\n", on_off(on)));
    }
    if let Some(e) = &status.last_error {
        text.push_str(&format!("  Last error: {}\n", e));
    }

    Ok(CallToolResult::success(vec![Content::text(text)]))
}

pub async fn set_auto_hbm(
    parts: &PixelParts,
    params: SetEnabledParams,
) -> Result<CallToolResult, McpError> {
    parts
        .update(|c| c.auto_hbm.enabled = params.enabled)
        .map_err(|e| internal_error(format!("Failed to save settings: {}", e)))?;
    let state = parts.reconcile_auto_hbm().await;

    Ok(CallToolResult::success(vec![Content::text(format!(
        "Auto HBM {}, service {}",
        if params.enabled { "enabled" } else { "disabled" },
        state.label()
    ))]))
}

pub async fn set_auto_hbm_threshold(
    parts: &PixelParts,
    params: SetThresholdParams,
) -> Result<CallToolResult, McpError> {
    if params.threshold < 0 {
        return Ok(CallToolResult::success(vec![Content::text(format!(
            "Threshold must not be negative (got {})",
            params.threshold
        ))]));
    }

    parts
        .update(|c| c.auto_hbm.threshold = params.threshold)
        .map_err(|e| internal_error(format!("Failed to save settings: {}", e)))?;

    Ok(CallToolResult::success(vec![Content::text(format!(
        "Auto HBM threshold set to {} lux",
        params.threshold
    ))]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;
    use crate::control::ambient::{decide, Percent};
    use crate::sensors::sysfs::fake::MemoryNodes;
    use crate::services::ServiceState;

    #[test]
    fn test_apply_decision_publishes_and_writes() {
        let nodes = Arc::new(MemoryNodes::new());
        nodes.set("/hbm", "0\n");
        let mut hbm = HbmSwitch::new(nodes.clone(), "/hbm");
        let status = watch::Sender::new(AutoHbmStatus::default());

        apply_decision(&mut hbm, decide(30_000, 20_000), &status);
        apply_decision(&mut hbm, decide(25_000, 20_000), &status);
        assert_eq!(nodes.writes_to("/hbm"), vec!["1"]);
        {
            let s = status.borrow();
            assert_eq!(s.hbm_on, Some(true));
            assert_eq!(s.decision.unwrap().percent, Percent::FULL);
        }

        apply_decision(&mut hbm, decide(100, 20_000), &status);
        assert_eq!(nodes.writes_to("/hbm"), vec!["1", "0"]);
        assert_eq!(status.borrow().hbm_on, Some(false));
    }

    #[test]
    fn test_unwritable_node_still_reports_decision() {
        let nodes = Arc::new(MemoryNodes::new());
        let mut hbm = HbmSwitch::new(nodes, "/hbm");
        let status = watch::Sender::new(AutoHbmStatus::default());
        apply_decision(&mut hbm, decide(30_000, 20_000), &status);
        let s = status.borrow();
        assert!(s.decision.unwrap().over_threshold);
        assert_eq!(s.hbm_on, None);
        assert!(s.last_error.is_some());
    }

    #[tokio::test]
    async fn test_service_turns_hbm_off_when_stopped() {
        let nodes = Arc::new(MemoryNodes::new());
        let mut config = Config::default();
        config.auto_hbm.enabled = true;
        config.auto_hbm.poll_interval_ms = 5;
        config.nodes.light_device = "/als".into();
        config.nodes.hbm = "/hbm".into();
        nodes.set("/als/in_illuminance_input", "45000\n");
        nodes.set("/hbm", "0\n");

        let parts = PixelParts::new(nodes.clone(), config, None);
        assert_eq!(parts.reconcile_auto_hbm().await, ServiceState::Running);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(nodes.writes_to("/hbm"), vec!["1"]);

        parts.update(|c| c.auto_hbm.enabled = false).unwrap();
        assert_eq!(parts.reconcile_auto_hbm().await, ServiceState::Stopped);
        assert_eq!(nodes.writes_to("/hbm"), vec!["1", "0"]);
        assert_eq!(parts.shared().hbm_status.borrow().hbm_on, Some(false));
    }

    #[tokio::test]
    async fn test_garbled_light_node_leaves_hbm_alone() {
        let nodes = Arc::new(MemoryNodes::new());
        let mut config = Config::default();
        config.auto_hbm.enabled = true;
        config.auto_hbm.poll_interval_ms = 5;
        config.nodes.light_device = "/als".into();
        config.nodes.hbm = "/hbm".into();
        nodes.set("/als/in_illuminance_input", "inf\n");
        nodes.set("/hbm", "0\n");

        let parts = PixelParts::new(nodes.clone(), config, None);
        parts.reconcile_auto_hbm().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        parts.shutdown().await;

        assert!(nodes.writes_to("/hbm").is_empty());
        let status = parts.shared().hbm_status.borrow().clone();
        assert!(status.decision.is_none());
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_threshold_tool() {
        let parts = PixelParts::new(Arc::new(MemoryNodes::new()), Config::default(), None);
        set_auto_hbm_threshold(&parts, SetThresholdParams { threshold: -5 })
            .await
            .unwrap();
        assert_eq!(parts.settings().auto_hbm.threshold, 20_000);
        set_auto_hbm_threshold(&parts, SetThresholdParams { threshold: 8_000 })
            .await
            .unwrap();
        assert_eq!(parts.settings().auto_hbm.threshold, 8_000);
    }
}
