//! Battery telemetry derivation
//!
//! Turns the raw strings read from power_supply nodes into display units.
//! Every metric is derived on its own: an unreadable or garbled node only
//! blanks out that one metric.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// The fixed set of power_supply nodes battery info reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryNode {
    Technology,
    Status,
    UsbType,
    Temperature,
    Capacity,
    CapacityLevel,
    Current,
    Voltage,
    Health,
    CycleCount,
}

impl BatteryNode {
    pub const ALL: [BatteryNode; 10] = [
        BatteryNode::Technology,
        BatteryNode::Status,
        BatteryNode::UsbType,
        BatteryNode::Temperature,
        BatteryNode::Capacity,
        BatteryNode::CapacityLevel,
        BatteryNode::Current,
        BatteryNode::Voltage,
        BatteryNode::Health,
        BatteryNode::CycleCount,
    ];

    pub fn key(self) -> &'static str {
        match self {
            BatteryNode::Technology => "technology",
            BatteryNode::Status => "status",
            BatteryNode::UsbType => "usb_type",
            BatteryNode::Temperature => "temperature",
            BatteryNode::Capacity => "capacity",
            BatteryNode::CapacityLevel => "capacity_level",
            BatteryNode::Current => "current",
            BatteryNode::Voltage => "voltage",
            BatteryNode::Health => "health",
            BatteryNode::CycleCount => "cycle_count",
        }
    }
}

/// Raw node contents from one refresh; a missing entry means the node was unreadable
#[derive(Debug, Clone, Default)]
pub struct RawTelemetrySample {
    values: HashMap<BatteryNode, String>,
}

impl RawTelemetrySample {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with(mut self, node: BatteryNode, value: impl Into<String>) -> Self {
        self.insert(node, value);
        self
    }

    pub fn insert(&mut self, node: BatteryNode, value: impl Into<String>) {
        self.values.insert(node, value.into());
    }

    pub fn get(&self, node: BatteryNode) -> Option<&str> {
        self.values.get(&node).map(String::as_str)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// One derived metric, or the marker that it could not be derived
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Metric<T> {
    Available(T),
    Unavailable,
}

impl<T> Metric<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Metric::Available(_))
    }

    pub fn as_ref(&self) -> Metric<&T> {
        match self {
            Metric::Available(v) => Metric::Available(v),
            Metric::Unavailable => Metric::Unavailable,
        }
    }

    #[cfg(test)]
    pub fn available(self) -> Option<T> {
        match self {
            Metric::Available(v) => Some(v),
            Metric::Unavailable => None,
        }
    }
}

impl<T> From<Result<T, TelemetryError>> for Metric<T> {
    fn from(result: Result<T, TelemetryError>) -> Self {
        match result {
            Ok(v) => Metric::Available(v),
            Err(_) => Metric::Unavailable,
        }
    }
}

// === Units ===

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperature {
    pub celsius: f64,
    pub fahrenheit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl Temperature {
    pub fn display(&self, unit: TemperatureUnit) -> String {
        match unit {
            TemperatureUnit::Celsius => format!("{:.1}°C", self.celsius),
            TemperatureUnit::Fahrenheit => format!("{:.1}°F", self.fahrenheit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Current {
    pub milliamps: u64,
}

impl fmt::Display for Current {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}mA", self.milliamps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Voltage {
    pub volts: f64,
}

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}V", self.volts)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Wattage {
    pub watts: f64,
}

impl fmt::Display for Wattage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}W", self.watts)
    }
}

// === Closed enumerations ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Unknown,
    Charging,
    Discharging,
    NotCharging,
    Full,
    Unrecognized,
}

impl ChargeStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Unknown" => ChargeStatus::Unknown,
            "Charging" => ChargeStatus::Charging,
            "Discharging" => ChargeStatus::Discharging,
            "Not charging" => ChargeStatus::NotCharging,
            "Full" => ChargeStatus::Full,
            _ => ChargeStatus::Unrecognized,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChargeStatus::Unknown => "Unknown",
            ChargeStatus::Charging => "Charging",
            ChargeStatus::Discharging => "Discharging",
            ChargeStatus::NotCharging => "Not charging",
            ChargeStatus::Full => "Full",
            ChargeStatus::Unrecognized => "Unrecognized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Unknown,
    Good,
    Overheat,
    Dead,
    OverVoltage,
    UnspecifiedFailure,
    Cold,
    WatchdogTimerExpire,
    SafetyTimerExpire,
    OverCurrent,
    CalibrationRequired,
    Warm,
    Cool,
    Hot,
    Unrecognized,
}

impl Health {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Unknown" => Health::Unknown,
            "Good" => Health::Good,
            "Overheat" => Health::Overheat,
            "Dead" => Health::Dead,
            "Over voltage" => Health::OverVoltage,
            "Unspecified failure" => Health::UnspecifiedFailure,
            "Cold" => Health::Cold,
            "Watchdog timer expire" => Health::WatchdogTimerExpire,
            "Safety timer expire" => Health::SafetyTimerExpire,
            "Over current" => Health::OverCurrent,
            "Calibration required" => Health::CalibrationRequired,
            "Warm" => Health::Warm,
            "Cool" => Health::Cool,
            "Hot" => Health::Hot,
            _ => Health::Unrecognized,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Health::Unknown => "Unknown",
            Health::Good => "Good",
            Health::Overheat => "Overheat",
            Health::Dead => "Dead",
            Health::OverVoltage => "Over voltage",
            Health::UnspecifiedFailure => "Unspecified failure",
            Health::Cold => "Cold",
            Health::WatchdogTimerExpire => "Watchdog timer expired",
            Health::SafetyTimerExpire => "Safety timer expired",
            Health::OverCurrent => "Over current",
            Health::CalibrationRequired => "Calibration required",
            Health::Warm => "Warm",
            Health::Cool => "Cool",
            Health::Hot => "Hot",
            Health::Unrecognized => "Unrecognized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityLevel {
    Unknown,
    Critical,
    Low,
    Normal,
    High,
    Full,
    Unrecognized,
}

impl CapacityLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Unknown" => CapacityLevel::Unknown,
            "Critical" => CapacityLevel::Critical,
            "Low" => CapacityLevel::Low,
            "Normal" => CapacityLevel::Normal,
            "High" => CapacityLevel::High,
            "Full" => CapacityLevel::Full,
            _ => CapacityLevel::Unrecognized,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CapacityLevel::Unknown => "Unknown",
            CapacityLevel::Critical => "Critical",
            CapacityLevel::Low => "Low",
            CapacityLevel::Normal => "Normal",
            CapacityLevel::High => "High",
            CapacityLevel::Full => "Full",
            CapacityLevel::Unrecognized => "Unrecognized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsbType {
    /// `[Unknown]`, also reported when nothing is plugged in
    Unknown,
    /// Standard downstream port
    Sdp,
    /// Charging downstream port
    Cdp,
    /// Dedicated charging port
    Dcp,
    Unrecognized,
}

impl UsbType {
    const TOKENS: [(&'static str, UsbType); 4] = [
        ("Unknown", UsbType::Unknown),
        ("SDP", UsbType::Sdp),
        ("CDP", UsbType::Cdp),
        ("DCP", UsbType::Dcp),
    ];

    /// The node lists every supported type and brackets the active one,
    /// e.g. `Unknown SDP [CDP] DCP`. The first bracketed token we know wins.
    pub fn parse(raw: &str) -> Self {
        let mut rest = raw;
        while let Some(open) = rest.find('[') {
            let after = &rest[open + 1..];
            let Some(close) = after.find(']') else {
                break;
            };
            let token = &after[..close];
            if let Some((_, ty)) = Self::TOKENS.iter().find(|(name, _)| *name == token) {
                return *ty;
            }
            rest = &after[close + 1..];
        }
        UsbType::Unrecognized
    }

    pub fn label(self) -> &'static str {
        match self {
            UsbType::Unknown => "Unknown or not connected",
            UsbType::Sdp => "Standard downstream port",
            UsbType::Cdp => "Charging downstream port",
            UsbType::Dcp => "Dedicated charging port",
            UsbType::Unrecognized => "Unrecognized",
        }
    }
}

// === Derivation ===

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedTelemetry {
    pub technology: Metric<String>,
    pub status: Metric<ChargeStatus>,
    pub usb_type: Metric<UsbType>,
    pub temperature: Metric<Temperature>,
    pub capacity: Metric<u32>,
    pub capacity_level: Metric<CapacityLevel>,
    pub current: Metric<Current>,
    pub voltage: Metric<Voltage>,
    pub wattage: Metric<Wattage>,
    pub health: Metric<Health>,
    pub cycle_count: Metric<u32>,
}

/// Round to one decimal, halves away from zero
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn present(raw: &RawTelemetrySample, node: BatteryNode) -> Result<&str, TelemetryError> {
    raw.get(node)
        .map(str::trim)
        .ok_or(TelemetryError::Unavailable)
}

fn parse_num<T: std::str::FromStr>(
    raw: &RawTelemetrySample,
    node: BatteryNode,
) -> Result<T, TelemetryError> {
    let value = present(raw, node)?;
    value
        .parse::<T>()
        .map_err(|_| TelemetryError::Malformed(value.to_string()))
}

fn parse_float(raw: &RawTelemetrySample, node: BatteryNode) -> Result<f64, TelemetryError> {
    let value = parse_num::<f64>(raw, node)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TelemetryError::Malformed(value.to_string()))
    }
}

fn parse_label<T>(
    raw: &RawTelemetrySample,
    node: BatteryNode,
    parse: fn(&str) -> T,
) -> Result<T, TelemetryError> {
    present(raw, node).map(parse)
}

pub fn temperature(raw: &RawTelemetrySample) -> Result<Temperature, TelemetryError> {
    let tenths = parse_num::<i32>(raw, BatteryNode::Temperature)?;
    let celsius = tenths as f64 / 10.0;
    let fahrenheit = celsius * 1.8 + 32.0;
    Ok(Temperature {
        celsius: round1(celsius),
        fahrenheit: round1(fahrenheit),
    })
}

pub fn current(raw: &RawTelemetrySample) -> Result<Current, TelemetryError> {
    let microamps = parse_num::<i64>(raw, BatteryNode::Current)?;
    Ok(Current {
        milliamps: microamps.unsigned_abs() / 1000,
    })
}

pub fn voltage(raw: &RawTelemetrySample) -> Result<Voltage, TelemetryError> {
    let microvolts = parse_float(raw, BatteryNode::Voltage)?;
    Ok(Voltage {
        volts: round1(microvolts / 1_000_000.0),
    })
}

pub fn wattage(raw: &RawTelemetrySample) -> Result<Wattage, TelemetryError> {
    // Unlike the displayed current, the milliamps here keep their fraction.
    let milliamps = parse_num::<i64>(raw, BatteryNode::Current)? as f64 / 1000.0;
    let volts = parse_float(raw, BatteryNode::Voltage)? / 1_000_000.0;
    Ok(Wattage {
        watts: round1((volts * milliamps).abs() / 1000.0),
    })
}

pub fn technology(raw: &RawTelemetrySample) -> Result<String, TelemetryError> {
    let value = present(raw, BatteryNode::Technology)?;
    if value.is_empty() {
        Err(TelemetryError::Unavailable)
    } else {
        Ok(value.to_string())
    }
}

pub fn derive(raw: &RawTelemetrySample) -> DerivedTelemetry {
    let derived = DerivedTelemetry {
        technology: technology(raw).into(),
        status: parse_label(raw, BatteryNode::Status, ChargeStatus::parse).into(),
        usb_type: parse_label(raw, BatteryNode::UsbType, UsbType::parse).into(),
        temperature: temperature(raw).into(),
        capacity: parse_num::<u32>(raw, BatteryNode::Capacity).into(),
        capacity_level: parse_label(raw, BatteryNode::CapacityLevel, CapacityLevel::parse).into(),
        current: current(raw).into(),
        voltage: voltage(raw).into(),
        wattage: wattage(raw).into(),
        health: parse_label(raw, BatteryNode::Health, Health::parse).into(),
        cycle_count: parse_num::<u32>(raw, BatteryNode::CycleCount).into(),
    };

    for node in BatteryNode::ALL {
        if let Some(value) = raw.get(node) {
            if !derived.is_available(node) {
                tracing::debug!("Battery node {} has malformed value {:?}", node.key(), value);
            }
        }
    }

    derived
}

impl DerivedTelemetry {
    fn is_available(&self, node: BatteryNode) -> bool {
        match node {
            BatteryNode::Technology => self.technology.is_available(),
            BatteryNode::Status => self.status.is_available(),
            BatteryNode::UsbType => self.usb_type.is_available(),
            BatteryNode::Temperature => self.temperature.is_available(),
            BatteryNode::Capacity => self.capacity.is_available(),
            BatteryNode::CapacityLevel => self.capacity_level.is_available(),
            BatteryNode::Current => self.current.is_available(),
            BatteryNode::Voltage => self.voltage.is_available(),
            BatteryNode::Health => self.health.is_available(),
            BatteryNode::CycleCount => self.cycle_count.is_available(),
        }
    }

    /// Human readable report, one line per metric
    pub fn report(&self, unit: TemperatureUnit) -> String {
        fn line<T>(out: &mut String, name: &str, metric: Metric<T>, show: impl FnOnce(T) -> String) {
            let value = match metric {
                Metric::Available(v) => show(v),
                Metric::Unavailable => "unavailable (kernel node not accessible)".to_string(),
            };
            out.push_str(&format!("  {}: {}\n", name, value));
        }

        let mut out = String::from("Battery Info:\n\n");
        line(&mut out, "Technology", self.technology.as_ref(), |v| v.clone());
        line(&mut out, "Status", self.status.as_ref(), |v| v.label().to_string());
        line(&mut out, "USB type", self.usb_type.as_ref(), |v| v.label().to_string());
        line(&mut out, "Temperature", self.temperature.as_ref(), |v| v.display(unit));
        line(&mut out, "Capacity", self.capacity.as_ref(), |v| format!("{}%", v));
        line(&mut out, "Capacity level", self.capacity_level.as_ref(), |v| {
            v.label().to_string()
        });
        line(&mut out, "Current", self.current.as_ref(), |v| v.to_string());
        line(&mut out, "Voltage", self.voltage.as_ref(), |v| v.to_string());
        line(&mut out, "Wattage", self.wattage.as_ref(), |v| v.to_string());
        line(&mut out, "Health", self.health.as_ref(), |v| v.label().to_string());
        line(&mut out, "Cycle count", self.cycle_count.as_ref(), |v| v.to_string());
        out
    }
}
