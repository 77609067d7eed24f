//! Error types shared by the sysfs port and the telemetry deriver

use std::path::PathBuf;

/// Failure talking to a kernel node
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("node {} is not readable: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("node {} holds malformed value {value:?}", path.display())]
    Malformed { path: PathBuf, value: String },
    #[error("node {} is not writable: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single metric could not be derived. Never escapes the metric it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TelemetryError {
    #[error("value unavailable")]
    Unavailable,
    #[error("malformed value {0:?}")]
    Malformed(String),
}
