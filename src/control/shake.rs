//! Shake detection over accelerometer samples

use crate::sensors::SensorReading;

/// One accelerometer reading in m/s² with a monotonic timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelerationSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub timestamp_ms: u64,
}

impl AccelerationSample {
    pub fn new(x: f32, y: f32, z: f32, timestamp_ms: u64) -> Self {
        Self { x, y, z, timestamp_ms }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeEvent {
    pub timestamp_ms: u64,
    pub magnitude: f32,
}

/// Fires at most once per refractory window (`threshold_ms`) when the
/// acceleration magnitude is strictly above `sensitivity`.
#[derive(Debug, Clone)]
pub struct ShakeDetector {
    threshold_ms: i32,
    sensitivity: i32,
    last_trigger_ms: Option<u64>,
}

impl ShakeDetector {
    pub fn new(threshold_ms: i32, sensitivity: i32) -> Self {
        Self {
            threshold_ms,
            sensitivity,
            last_trigger_ms: None,
        }
    }

    #[cfg(test)]
    pub fn last_trigger_ms(&self) -> Option<u64> {
        self.last_trigger_ms
    }

    /// Swap settings without forgetting the last trigger
    pub fn reconfigure(&mut self, threshold_ms: i32, sensitivity: i32) {
        self.threshold_ms = threshold_ms;
        self.sensitivity = sensitivity;
    }

    pub fn on_sample(&mut self, sample: AccelerationSample) -> Option<ShakeEvent> {
        if let Some(last) = self.last_trigger_ms {
            // Out-of-order samples land inside the window.
            let elapsed = sample.timestamp_ms.saturating_sub(last);
            if elapsed <= self.threshold_ms.max(0) as u64 {
                return None;
            }
        }

        let magnitude = sample.magnitude();
        if magnitude > self.sensitivity as f32 {
            self.last_trigger_ms = Some(sample.timestamp_ms);
            Some(ShakeEvent {
                timestamp_ms: sample.timestamp_ms,
                magnitude,
            })
        } else {
            None
        }
    }

    /// Readings from any other sensor are ignored
    pub fn on_reading(&mut self, reading: &SensorReading) -> Option<ShakeEvent> {
        match reading {
            SensorReading::Acceleration(sample) => self.on_sample(*sample),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ambient::LuxSample;

    fn shake(t: u64, x: f32) -> AccelerationSample {
        AccelerationSample::new(x, 0.0, 0.0, t)
    }

    #[test]
    fn test_first_strong_sample_triggers() {
        let mut d = ShakeDetector::new(1024, 400);
        let event = d.on_sample(shake(10, 500.0)).expect("should trigger");
        assert_eq!(event.timestamp_ms, 10);
        assert_eq!(d.last_trigger_ms(), Some(10));
    }

    #[test]
    fn test_magnitude_equal_to_sensitivity_does_not_trigger() {
        let mut d = ShakeDetector::new(1024, 400);
        assert!(d.on_sample(shake(5_000, 400.0)).is_none());
        assert!(d.last_trigger_ms().is_none());
    }

    #[test]
    fn test_magnitude_uses_all_axes() {
        let mut d = ShakeDetector::new(0, 400);
        // 300-400-0 triangle has hypotenuse 500
        assert!(d.on_sample(AccelerationSample::new(300.0, 400.0, 0.0, 1)).is_some());
        assert!(d.on_sample(AccelerationSample::new(200.0, 200.0, 200.0, 2)).is_none());
    }

    #[test]
    fn test_refractory_window_is_inclusive() {
        let mut d = ShakeDetector::new(1024, 400);
        assert!(d.on_sample(shake(1_000, 401.0)).is_some());
        assert!(d.on_sample(shake(1_500, 900.0)).is_none());
        assert!(d.on_sample(shake(2_024, 900.0)).is_none());
        assert!(d.on_sample(shake(2_025, 401.0)).is_some());
        assert_eq!(d.last_trigger_ms(), Some(2_025));
    }

    #[test]
    fn test_weak_sample_after_window_does_not_move_trigger_time() {
        let mut d = ShakeDetector::new(100, 400);
        d.on_sample(shake(0, 401.0));
        assert!(d.on_sample(shake(500, 10.0)).is_none());
        assert_eq!(d.last_trigger_ms(), Some(0));
    }

    #[test]
    fn test_zero_threshold_disables_debounce() {
        let mut d = ShakeDetector::new(0, 400);
        assert!(d.on_sample(shake(1, 401.0)).is_some());
        assert!(d.on_sample(shake(2, 401.0)).is_some());
        // same timestamp is still inside a zero-length window
        assert!(d.on_sample(shake(2, 401.0)).is_none());
    }

    #[test]
    fn test_out_of_order_sample_is_debounced() {
        let mut d = ShakeDetector::new(10, 400);
        d.on_sample(shake(1_000, 401.0));
        assert!(d.on_sample(shake(900, 900.0)).is_none());
        assert_eq!(d.last_trigger_ms(), Some(1_000));
    }

    #[test]
    fn test_events_never_closer_than_threshold() {
        let threshold = 250;
        let mut d = ShakeDetector::new(threshold, 400);
        let mut fired = Vec::new();
        for t in (0..10_000u64).step_by(7) {
            let x = if t % 3 == 0 { 800.0 } else { 100.0 };
            if let Some(e) = d.on_sample(shake(t, x)) {
                fired.push(e.timestamp_ms);
            }
        }
        assert!(fired.len() > 10);
        for pair in fired.windows(2) {
            assert!(pair[1] - pair[0] > threshold as u64);
        }
    }

    #[test]
    fn test_reconfigure_keeps_last_trigger() {
        let mut d = ShakeDetector::new(1024, 400);
        d.on_sample(shake(100, 401.0));
        d.reconfigure(50, 10);
        assert_eq!(d.last_trigger_ms(), Some(100));
        assert!(d.on_sample(shake(140, 20.0)).is_none());
        assert!(d.on_sample(shake(151, 20.0)).is_some());
    }

    #[test]
    fn test_light_readings_are_ignored() {
        let mut d = ShakeDetector::new(0, 0);
        let reading = SensorReading::Light(LuxSample::new(90_000.0, 1));
        assert!(d.on_reading(&reading).is_none());
        let reading = SensorReading::Acceleration(shake(2, 1.0));
        assert!(d.on_reading(&reading).is_some());
    }
}
