//! High brightness mode switch

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::NodeError;
use crate::sensors::sysfs::NodePort;

/// Writes the HBM node only when the requested state differs from the last write
#[derive(Debug)]
pub struct HbmSwitch {
    port: Arc<dyn NodePort>,
    path: PathBuf,
    last: Option<bool>,
}

impl HbmSwitch {
    pub fn new(port: Arc<dyn NodePort>, path: impl Into<PathBuf>) -> Self {
        Self {
            port,
            path: path.into(),
            last: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.port.is_writable(&self.path)
    }

    pub fn last(&self) -> Option<bool> {
        self.last
    }

    /// Returns whether the node was written
    pub fn set(&mut self, on: bool) -> Result<bool, NodeError> {
        if self.last == Some(on) {
            return Ok(false);
        }
        self.port.write(&self.path, if on { "1" } else { "0" })?;
        self.last = Some(on);
        Ok(true)
    }
}
