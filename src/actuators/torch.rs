//! Flashlight LED actuator
//!
//! Drives a LED class device: `brightness` 0 is off, anything else is the
//! strength level, capped at `max_brightness`.

use std::path::PathBuf;
use std::sync::Arc;

use crate::control::torch::TorchCommand;
use crate::error::NodeError;
use crate::sensors::sysfs::{read_parsed, NodePort};

#[derive(Debug)]
pub struct LedTorch {
    port: Arc<dyn NodePort>,
    led_dir: PathBuf,
}

impl LedTorch {
    pub fn new(port: Arc<dyn NodePort>, led_dir: impl Into<PathBuf>) -> Self {
        Self {
            port,
            led_dir: led_dir.into(),
        }
    }

    fn brightness_path(&self) -> PathBuf {
        self.led_dir.join("brightness")
    }

    /// Torch state as the hardware reports it
    pub fn is_on(&self) -> Result<bool, NodeError> {
        read_parsed::<u32>(self.port.as_ref(), &self.brightness_path()).map(|b| b > 0)
    }

    pub fn max_strength(&self) -> Option<u32> {
        read_parsed::<u32>(self.port.as_ref(), &self.led_dir.join("max_brightness")).ok()
    }

    /// Returns the level actually written
    pub fn apply(&self, command: TorchCommand) -> Result<u32, NodeError> {
        let level = match command {
            TorchCommand::Off => 0,
            TorchCommand::On { strength } => match self.max_strength() {
                Some(max) if strength > max => {
                    tracing::debug!("Torch strength {} capped to {}", strength, max);
                    max
                }
                _ => strength,
            },
        };
        self.port.write(&self.brightness_path(), &level.to_string())?;
        Ok(level)
    }
}
