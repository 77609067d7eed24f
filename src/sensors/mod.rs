//! Sensors - sample sources feeding the control loops

use crate::control::ambient::LuxSample;
use crate::control::shake::AccelerationSample;

pub mod battery;
pub mod iio;
pub mod sysfs;

/// A reading from one of the sensors the control loops listen to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    Acceleration(AccelerationSample),
    Light(LuxSample),
}
