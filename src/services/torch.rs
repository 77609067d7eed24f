//! Torch on shake service

use std::time::Duration;

use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::actuators::torch::LedTorch;
use crate::control::shake::ShakeDetector;
use crate::control::torch::{self, TorchCommand};
use crate::parts::{PixelParts, Shared, TorchStatus};
use crate::sensors::iio::{IioAccelerometer, SampleSource};
use crate::sensors::SensorReading;
use crate::services::elapsed_ms;
use crate::shared::{format_millis, internal_error, on_off};

// === Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetEnabledParams {
    #[schemars(description = "Enable (true) or disable (false) the service")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TorchSettingsParams {
    #[schemars(description = "Torch strength level; 0 keeps the torch off (optional)")]
    pub strength: Option<i32>,
    #[schemars(description = "Milliseconds to ignore shakes after one fired (optional)")]
    pub shake_threshold: Option<i32>,
    #[schemars(description = "Acceleration magnitude a shake must exceed, in m/s² (optional)")]
    pub shake_sensitivity: Option<i32>,
}

// === Service Loop ===

/// Feed one reading through the detector and drive the torch if it fired
fn handle_reading(
    detector: &mut ShakeDetector,
    led: &LedTorch,
    reading: &SensorReading,
    strength: i32,
    status: &watch::Sender<TorchStatus>,
) {
    let Some(event) = detector.on_reading(reading) else {
        return;
    };

    let hardware_on = match led.is_on() {
        Ok(on) => on,
        Err(e) => {
            tracing::debug!("Torch state unknown, assuming off: {}", e);
            false
        }
    };

    let command = torch::decide(hardware_on, strength);
    let error = match command {
        Some(cmd) => match led.apply(cmd) {
            Ok(level) => {
                tracing::info!("Shake ({:.0} m/s²): torch level {}", event.magnitude, level);
                None
            }
            Err(e) => {
                tracing::warn!("Torch rejected {:?}: {}", cmd, e);
                Some(e.to_string())
            }
        },
        None => {
            tracing::debug!("Shake ignored, torch strength is 0");
            None
        }
    };

    status.send_modify(|s| {
        s.shakes += 1;
        s.last_shake_ms = Some(event.timestamp_ms);
        s.last_command = command;
        s.last_error = error;
    });
}

pub async fn run(shared: Shared, mut shutdown: watch::Receiver<bool>) {
    let config = shared.settings();
    let settings = config.pixel_torch;
    let mut detector = ShakeDetector::new(settings.shake_threshold, settings.shake_sensitivity);
    let mut source = IioAccelerometer::new(shared.port.clone(), config.nodes.accel_device);
    let led = LedTorch::new(shared.port.clone(), config.nodes.torch_led);

    let mut ticker = interval(Duration::from_millis(settings.poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = Instant::now();
    let mut failing = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let settings = shared.settings().pixel_torch;
        detector.reconfigure(settings.shake_threshold, settings.shake_sensitivity);

        let reading = match source.sample(elapsed_ms(started)) {
            Ok(reading) => {
                if failing {
                    tracing::info!("Accelerometer readable again");
                    failing = false;
                }
                reading
            }
            Err(e) => {
                if !failing {
                    tracing::warn!("Accelerometer unavailable: {}", e);
                    shared.torch_status.send_modify(|s| s.last_error = Some(e.to_string()));
                    failing = true;
                }
                continue;
            }
        };

        handle_reading(
            &mut detector,
            &led,
            &reading,
            settings.strength,
            &shared.torch_status,
        );
    }

    tracing::debug!("Torch loop exiting");
}

// === Tool Functions ===

fn describe(status: &TorchStatus) -> String {
    let mut text = format!("  Shakes detected: {}\n", status.shakes);
    if let Some(ms) = status.last_shake_ms {
        text.push_str(&format!("  Last shake: {} after service start\n", format_millis(ms)));
    }
    match status.last_command {
        Some(TorchCommand::On { strength }) => {
            text.push_str(&format!("  Last action: torch on at strength {}\n", strength))
        }
        Some(TorchCommand::Off) => text.push_str("  Last action: torch off\n"),
        None => {}
    }
    if let Some(e) = &status.last_error {
        text.push_str(&format!("  Last error: {}\n", e));
    }
    text
}

pub async fn get_pixel_torch(parts: &PixelParts) -> Result<CallToolResult, McpError> {
    let settings = parts.settings().pixel_torch;
    let state = parts.torch_state().await;
    let status = parts.shared().torch_status.borrow().clone();

    let mut text = String::from("Pixel Torch:\n\n");
    text.push_str(&format!("  Enabled: {}\n", on_off(settings.enabled)));
    text.push_str(&format!("  Service: {}\n", state.label()));
    text.push_str(&format!("  Strength: {}\n", settings.strength));
    text.push_str(&format!("  Shake threshold: {}ms\n", settings.shake_threshold));
    text.push_str(&format!("  Shake sensitivity: {}\n", settings.shake_sensitivity));
    text.push_str(&describe(&status));

    Ok(CallToolResult::success(vec![Content::text(text)]))
}

pub async fn set_pixel_torch(
    parts: &PixelParts,
    params: SetEnabledParams,
) -> Result<CallToolResult, McpError> {
    parts
        .update(|c| c.pixel_torch.enabled = params.enabled)
        .map_err(|e| internal_error(format!("Failed to save settings: {}", e)))?;
    let state = parts.reconcile_torch().await;

    Ok(CallToolResult::success(vec![Content::text(format!(
        "Pixel torch {}, service {}",
        if params.enabled { "enabled" } else { "disabled" },
        state.label()
    ))]))
}

pub async fn set_pixel_torch_settings(
    parts: &PixelParts,
    params: TorchSettingsParams,
) -> Result<CallToolResult, McpError> {
    for (name, value) in [
        ("strength", params.strength),
        ("shake_threshold", params.shake_threshold),
        ("shake_sensitivity", params.shake_sensitivity),
    ] {
        if let Some(v) = value {
            if v < 0 {
                return Ok(CallToolResult::success(vec![Content::text(format!(
                    "{} must not be negative (got {})",
                    name, v
                ))]));
            }
        }
    }

    let config = parts
        .update(|c| {
            let torch = &mut c.pixel_torch;
            if let Some(v) = params.strength {
                torch.strength = v;
            }
            if let Some(v) = params.shake_threshold {
                torch.shake_threshold = v;
            }
            if let Some(v) = params.shake_sensitivity {
                torch.shake_sensitivity = v;
            }
        })
        .map_err(|e| internal_error(format!("Failed to save settings: {}", e)))?;

    let torch = config.pixel_torch;
    Ok(CallToolResult::success(vec![Content::text(format!(
        "Pixel torch settings: strength {}, threshold {}ms, sensitivity {}",
        torch.strength, torch.shake_threshold, torch.shake_sensitivity
    ))]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;
    use crate::control::shake::AccelerationSample;
    use crate::sensors::sysfs::fake::MemoryNodes;

    fn setup() -> (Arc<MemoryNodes>, LedTorch, watch::Sender<TorchStatus>) {
        let nodes = Arc::new(MemoryNodes::new());
        nodes.set("/led/brightness", "0\n");
        let led = LedTorch::new(nodes.clone(), "/led");
        (nodes, led, watch::Sender::new(TorchStatus::default()))
    }

    fn shake(t: u64) -> SensorReading {
        SensorReading::Acceleration(AccelerationSample::new(0.0, 0.0, 500.0, t))
    }

    #[test]
    fn test_shakes_toggle_torch() {
        let (nodes, led, status) = setup();
        let mut detector = ShakeDetector::new(1024, 400);

        handle_reading(&mut detector, &led, &shake(0), 45, &status);
        assert_eq!(nodes.get("/led/brightness").as_deref(), Some("45\n"));

        // inside the refractory window
        handle_reading(&mut detector, &led, &shake(500), 45, &status);
        assert_eq!(nodes.writes_to("/led/brightness").len(), 1);

        handle_reading(&mut detector, &led, &shake(1_100), 45, &status);
        assert_eq!(nodes.get("/led/brightness").as_deref(), Some("0\n"));

        let s = status.borrow().clone();
        assert_eq!(s.shakes, 2);
        assert_eq!(s.last_shake_ms, Some(1_100));
        assert_eq!(s.last_command, Some(TorchCommand::Off));
    }

    #[test]
    fn test_torch_turned_on_elsewhere_is_turned_off() {
        let (nodes, led, status) = setup();
        nodes.set("/led/brightness", "30\n");
        let mut detector = ShakeDetector::new(0, 400);
        handle_reading(&mut detector, &led, &shake(1), 45, &status);
        assert_eq!(nodes.writes_to("/led/brightness"), vec!["0"]);
    }

    #[test]
    fn test_zero_strength_writes_nothing() {
        let (nodes, led, status) = setup();
        let mut detector = ShakeDetector::new(0, 400);
        handle_reading(&mut detector, &led, &shake(1), 0, &status);
        assert!(nodes.writes().is_empty());
        assert_eq!(status.borrow().shakes, 1);
        assert_eq!(status.borrow().last_command, None);
    }

    #[test]
    fn test_rejected_command_is_reported() {
        let (nodes, led, status) = setup();
        nodes.make_read_only("/led/brightness");
        let mut detector = ShakeDetector::new(0, 400);
        handle_reading(&mut detector, &led, &shake(1), 45, &status);
        assert!(status.borrow().last_error.is_some());
    }

    #[tokio::test]
    async fn test_service_loop_drives_led() {
        let nodes = Arc::new(MemoryNodes::new());
        let mut config = Config::default();
        config.pixel_torch.enabled = true;
        config.pixel_torch.poll_interval_ms = 5;
        config.nodes.accel_device = "/accel".into();
        config.nodes.torch_led = "/led".into();
        nodes.set("/led/brightness", "0\n");
        nodes.set("/accel/in_accel_x_raw", "0\n");
        nodes.set("/accel/in_accel_y_raw", "0\n");
        nodes.set("/accel/in_accel_z_raw", "900\n");

        let parts = PixelParts::new(nodes.clone(), config, None);
        parts.reconcile_torch().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        parts.shutdown().await;

        // first tick toggles on, the rest fall inside the 1024ms window
        assert_eq!(nodes.writes_to("/led/brightness"), vec!["45"]);
        assert_eq!(parts.shared().torch_status.borrow().shakes, 1);
    }

    #[tokio::test]
    async fn test_settings_tool_rejects_negative() {
        let parts = PixelParts::new(Arc::new(MemoryNodes::new()), Config::default(), None);
        let params = TorchSettingsParams {
            strength: Some(-1),
            shake_threshold: None,
            shake_sensitivity: Some(10),
        };
        set_pixel_torch_settings(&parts, params).await.unwrap();
        assert_eq!(parts.settings().pixel_torch.shake_sensitivity, 400);

        let params = TorchSettingsParams {
            strength: Some(80),
            shake_threshold: None,
            shake_sensitivity: None,
        };
        set_pixel_torch_settings(&parts, params).await.unwrap();
        assert_eq!(parts.settings().pixel_torch.strength, 80);
        assert_eq!(parts.settings().pixel_torch.shake_threshold, 1024);
    }
}
