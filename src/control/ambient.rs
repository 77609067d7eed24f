//! Ambient light threshold for high brightness mode
//!
//! No smoothing and no hysteresis band: one sample at or above the threshold
//! recommends HBM on, the next one below recommends it off again.

use serde::Serialize;

use crate::sensors::SensorReading;

/// Illuminance reading in lux with a monotonic timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LuxSample {
    pub lux: f32,
    pub timestamp_ms: u64,
}

impl LuxSample {
    pub fn new(lux: f32, timestamp_ms: u64) -> Self {
        Self { lux, timestamp_ms }
    }
}

/// Progress pair for display, `used` out of `total`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Percent {
    pub used: i32,
    pub total: i32,
}

impl Percent {
    pub const FULL: Percent = Percent {
        used: 100,
        total: 100,
    };

    /// Filled fraction in `0.0..=1.0`
    pub fn ratio(&self) -> f32 {
        if self.total <= 0 {
            return if self.used >= self.total { 1.0 } else { 0.0 };
        }
        (self.used as f32 / self.total as f32).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmbientDecision {
    pub current_lux: i32,
    pub threshold: i32,
    pub over_threshold: bool,
    pub percent: Percent,
}

/// Pure decision for one `(lux, threshold)` pair
pub fn decide(current_lux: i32, threshold: i32) -> AmbientDecision {
    let over_threshold = current_lux >= threshold;
    let percent = if over_threshold {
        Percent::FULL
    } else {
        Percent {
            used: current_lux,
            total: threshold,
        }
    };
    AmbientDecision {
        current_lux,
        threshold,
        over_threshold,
        percent,
    }
}

#[derive(Debug, Clone, Default)]
pub struct AmbientLightActuator {
    current_lux: Option<i32>,
}

impl AmbientLightActuator {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn current_lux(&self) -> Option<i32> {
        self.current_lux
    }

    pub fn on_sample(&mut self, sample: LuxSample, threshold: i32) -> AmbientDecision {
        // float to int casts truncate toward zero and saturate
        let lux = sample.lux as i32;
        self.current_lux = Some(lux);
        decide(lux, threshold)
    }

    /// Re-evaluate the last seen lux against a new threshold
    pub fn rethreshold(&self, threshold: i32) -> Option<AmbientDecision> {
        self.current_lux.map(|lux| decide(lux, threshold))
    }

    /// Readings from any other sensor are ignored
    pub fn on_reading(&mut self, reading: &SensorReading, threshold: i32) -> Option<AmbientDecision> {
        match reading {
            SensorReading::Light(sample) => Some(self.on_sample(*sample, threshold)),
            _ => None,
        }
    }
}
