//! Persisted settings
//!
//! Reads/writes ~/.config/pixelparts/config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::control::saturation;
use crate::control::telemetry::{BatteryNode, TemperatureUnit};

pub const DEFAULT_TORCH_STRENGTH: i32 = 45;
pub const DEFAULT_SHAKE_THRESHOLD_MS: i32 = 1024;
pub const DEFAULT_SHAKE_SENSITIVITY: i32 = 400;
pub const DEFAULT_AUTO_HBM_THRESHOLD: i32 = 20_000;
/// Roughly Android's SENSOR_DELAY_NORMAL
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// All settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pixel_torch: TorchSettings,
    pub auto_hbm: AutoHbmSettings,
    pub battery_info: BatteryInfoSettings,
    pub saturation: SaturationSettings,
    pub fast_charge: FastChargeSettings,
    pub nodes: NodePaths,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorchSettings {
    /// Run the torch-on-shake service
    pub enabled: bool,
    /// Torch strength level, 0 keeps the torch off
    pub strength: i32,
    /// Refractory window after a shake in milliseconds
    pub shake_threshold: i32,
    /// Minimum acceleration magnitude in m/s²
    pub shake_sensitivity: i32,
    pub poll_interval_ms: u64,
}

impl Default for TorchSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: DEFAULT_TORCH_STRENGTH,
            shake_threshold: DEFAULT_SHAKE_THRESHOLD_MS,
            shake_sensitivity: DEFAULT_SHAKE_SENSITIVITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoHbmSettings {
    pub enabled: bool,
    /// Lux at or above which HBM is switched on
    pub threshold: i32,
    pub poll_interval_ms: u64,
}

impl Default for AutoHbmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: DEFAULT_AUTO_HBM_THRESHOLD,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryInfoSettings {
    pub temperature_unit: TemperatureUnit,
    /// Refresh every second instead of every five
    pub fast_refresh: bool,
}

impl BatteryInfoSettings {
    pub fn refresh_interval(&self) -> Duration {
        if self.fast_refresh {
            Duration::from_millis(1000)
        } else {
            Duration::from_millis(5000)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaturationSettings {
    /// 0-100, 100 is stock
    pub level: u32,
}

impl Default for SaturationSettings {
    fn default() -> Self {
        Self {
            level: saturation::DEFAULT_LEVEL,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastChargeSettings {
    pub enabled: bool,
}

/// Kernel node locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePaths {
    pub battery_dir: PathBuf,
    pub usb_type: PathBuf,
    pub hbm: PathBuf,
    pub fast_charge: PathBuf,
    /// LED class directory of the flashlight
    pub torch_led: PathBuf,
    /// IIO device exposing in_accel_{x,y,z}_raw
    pub accel_device: PathBuf,
    /// IIO device exposing in_illuminance_input or in_illuminance_raw
    pub light_device: PathBuf,
}

impl Default for NodePaths {
    fn default() -> Self {
        Self {
            battery_dir: PathBuf::from("/sys/class/power_supply/battery"),
            usb_type: PathBuf::from("/sys/class/power_supply/usb/usb_type"),
            hbm: PathBuf::from("/sys/class/backlight/panel0-backlight/hbm_mode"),
            fast_charge: PathBuf::from("/sys/kernel/fast_charge/force_fast_charge"),
            torch_led: PathBuf::from("/sys/class/leds/flashlight"),
            accel_device: PathBuf::from("/sys/bus/iio/devices/iio:device0"),
            light_device: PathBuf::from("/sys/bus/iio/devices/iio:device1"),
        }
    }
}

impl NodePaths {
    pub fn battery(&self, node: BatteryNode) -> PathBuf {
        let file = match node {
            BatteryNode::UsbType => return self.usb_type.clone(),
            BatteryNode::Technology => "technology",
            BatteryNode::Status => "status",
            BatteryNode::Temperature => "temp",
            BatteryNode::Capacity => "capacity",
            BatteryNode::CapacityLevel => "capacity_level",
            BatteryNode::Current => "current_now",
            BatteryNode::Voltage => "voltage_now",
            BatteryNode::Health => "health",
            BatteryNode::CycleCount => "cycle_count",
        };
        self.battery_dir.join(file)
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pixelparts").join("config.toml"))
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            tracing::warn!("Could not determine config directory, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", path);
            return Self::default();
        }

        let mut config = match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::error!("Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!("Failed to read config file: {}", e);
                Self::default()
            }
        };
        config.sanitize();
        config
    }

    /// Save config to file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Clamp values a hand-edited file may have pushed out of range
    pub fn sanitize(&mut self) {
        fn non_negative(name: &str, value: &mut i32) {
            if *value < 0 {
                tracing::warn!("{} = {} is negative, using 0", name, value);
                *value = 0;
            }
        }

        non_negative("pixel_torch.strength", &mut self.pixel_torch.strength);
        non_negative("pixel_torch.shake_threshold", &mut self.pixel_torch.shake_threshold);
        non_negative("pixel_torch.shake_sensitivity", &mut self.pixel_torch.shake_sensitivity);
        non_negative("auto_hbm.threshold", &mut self.auto_hbm.threshold);

        if self.saturation.level > 100 {
            tracing::warn!("saturation.level = {} is above 100, using 100", self.saturation.level);
            self.saturation.level = 100;
        }
        for interval in [
            &mut self.pixel_torch.poll_interval_ms,
            &mut self.auto_hbm.poll_interval_ms,
        ] {
            if *interval == 0 {
                *interval = DEFAULT_POLL_INTERVAL_MS;
            }
        }
    }
}
