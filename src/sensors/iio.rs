//! Industrial I/O sensor sources
//!
//! Accelerometer and ambient light readings polled from
//! /sys/bus/iio/devices/iio:deviceN.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::control::ambient::LuxSample;
use crate::control::shake::AccelerationSample;
use crate::error::NodeError;
use crate::sensors::sysfs::{read_parsed, NodePort};
use crate::sensors::SensorReading;

/// Something that can be asked for the next reading
pub trait SampleSource: Send {
    fn sample(&mut self, timestamp_ms: u64) -> Result<SensorReading, NodeError>;
}

/// Like `read_parsed`, but "inf" and "NaN" count as malformed
fn read_finite(port: &dyn NodePort, path: &Path) -> Result<f32, NodeError> {
    let value = read_parsed::<f32>(port, path)?;
    finite(path, value)
}

fn finite(path: &Path, value: f32) -> Result<f32, NodeError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NodeError::Malformed {
            path: path.to_path_buf(),
            value: value.to_string(),
        })
    }
}

/// `in_<channel>_scale` if the driver exposes one, otherwise 1.0
fn scale(port: &dyn NodePort, device: &Path, channel: &str) -> f32 {
    read_finite(port, &device.join(format!("in_{}_scale", channel))).unwrap_or(1.0)
}

#[derive(Debug)]
pub struct IioAccelerometer {
    port: Arc<dyn NodePort>,
    device: PathBuf,
    scale: Option<f32>,
}

impl IioAccelerometer {
    pub fn new(port: Arc<dyn NodePort>, device: impl Into<PathBuf>) -> Self {
        Self {
            port,
            device: device.into(),
            scale: None,
        }
    }

    fn axis(&self, axis: char, scale: f32) -> Result<f32, NodeError> {
        let path = self.device.join(format!("in_accel_{}_raw", axis));
        let raw = read_finite(self.port.as_ref(), &path)?;
        finite(&path, raw * scale)
    }
}

impl SampleSource for IioAccelerometer {
    fn sample(&mut self, timestamp_ms: u64) -> Result<SensorReading, NodeError> {
        let scale = match self.scale {
            Some(s) => s,
            None => {
                let s = scale(self.port.as_ref(), &self.device, "accel");
                self.scale = Some(s);
                s
            }
        };
        let x = self.axis('x', scale)?;
        let y = self.axis('y', scale)?;
        let z = self.axis('z', scale)?;
        Ok(SensorReading::Acceleration(AccelerationSample::new(x, y, z, timestamp_ms)))
    }
}

#[derive(Debug)]
pub struct IioLightSensor {
    port: Arc<dyn NodePort>,
    device: PathBuf,
}

impl IioLightSensor {
    pub fn new(port: Arc<dyn NodePort>, device: impl Into<PathBuf>) -> Self {
        Self {
            port,
            device: device.into(),
        }
    }

    fn lux(&self) -> Result<f32, NodeError> {
        let port = self.port.as_ref();
        let input = self.device.join("in_illuminance_input");
        match read_finite(port, &input) {
            Ok(lux) => Ok(lux),
            Err(NodeError::Read { .. }) => {
                let raw_path = self.device.join("in_illuminance_raw");
                let raw = read_finite(port, &raw_path)?;
                finite(&raw_path, raw * scale(port, &self.device, "illuminance"))
            }
            Err(e) => Err(e),
        }
    }
}

impl SampleSource for IioLightSensor {
    fn sample(&mut self, timestamp_ms: u64) -> Result<SensorReading, NodeError> {
        Ok(SensorReading::Light(LuxSample::new(self.lux()?, timestamp_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::sysfs::fake::MemoryNodes;

    #[test]
    fn test_accelerometer_applies_scale() {
        let nodes = Arc::new(MemoryNodes::new());
        nodes.set("/iio/in_accel_x_raw", "100\n");
        nodes.set("/iio/in_accel_y_raw", "-200\n");
        nodes.set("/iio/in_accel_z_raw", "0\n");
        nodes.set("/iio/in_accel_scale", "0.5\n");

        let mut accel = IioAccelerometer::new(nodes.clone(), "/iio");
        match accel.sample(7).unwrap() {
            SensorReading::Acceleration(s) => {
                assert_eq!((s.x, s.y, s.z, s.timestamp_ms), (50.0, -100.0, 0.0, 7));
            }
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_accelerometer_missing_axis_is_error() {
        let nodes = Arc::new(MemoryNodes::new());
        nodes.set("/iio/in_accel_x_raw", "1");
        let mut accel = IioAccelerometer::new(nodes, "/iio");
        assert!(matches!(accel.sample(0), Err(NodeError::Read { .. })));
    }

    #[test]
    fn test_light_prefers_processed_input() {
        let nodes = Arc::new(MemoryNodes::new());
        nodes.set("/als/in_illuminance_input", "2500.5\n");
        nodes.set("/als/in_illuminance_raw", "1\n");
        let mut als = IioLightSensor::new(nodes, "/als");
        match als.sample(3).unwrap() {
            SensorReading::Light(s) => assert_eq!(s.lux, 2500.5),
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_light_falls_back_to_raw_times_scale() {
        let nodes = Arc::new(MemoryNodes::new());
        nodes.set("/als/in_illuminance_raw", "300\n");
        nodes.set("/als/in_illuminance_scale", "2\n");
        let mut als = IioLightSensor::new(nodes.clone(), "/als");
        match als.sample(3).unwrap() {
            SensorReading::Light(s) => assert_eq!(s.lux, 600.0),
            other => panic!("unexpected reading {:?}", other),
        }

        nodes.set("/als/in_illuminance_input", "dark");
        assert!(matches!(als.sample(4), Err(NodeError::Malformed { .. })));
    }

    #[test]
    fn test_non_finite_values_are_malformed() {
        let nodes = Arc::new(MemoryNodes::new());
        let mut als = IioLightSensor::new(nodes.clone(), "/als");
        for value in ["inf\n", "NaN\n", "-inf\n"] {
            nodes.set("/als/in_illuminance_input", value);
            assert!(matches!(als.sample(1), Err(NodeError::Malformed { .. })));
        }

        nodes.set("/accel/in_accel_x_raw", "0\n");
        nodes.set("/accel/in_accel_y_raw", "NaN\n");
        nodes.set("/accel/in_accel_z_raw", "9\n");
        let mut accel = IioAccelerometer::new(nodes, "/accel");
        assert!(matches!(accel.sample(1), Err(NodeError::Malformed { .. })));
    }
}
