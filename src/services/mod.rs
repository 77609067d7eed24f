//! Background services - one tokio task per control loop
//!
//! A service is either stopped or running. Starting a running service and
//! stopping a stopped one are no-ops.

use std::future::Future;

use rmcp::{model::*, ErrorData as McpError};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::parts::{AutoHbmStatus, PixelParts, TorchStatus};
use crate::shared::internal_error;

pub mod auto_hbm;
pub mod torch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Stopped,
    Running,
}

impl ServiceState {
    pub fn label(self) -> &'static str {
        match self {
            ServiceState::Stopped => "stopped",
            ServiceState::Running => "running",
        }
    }
}

#[derive(Debug)]
struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
pub struct Service {
    name: &'static str,
    running: Option<Running>,
}

impl Service {
    pub fn new(name: &'static str) -> Self {
        Self { name, running: None }
    }

    pub fn state(&self) -> ServiceState {
        match &self.running {
            Some(running) if !running.handle.is_finished() => ServiceState::Running,
            _ => ServiceState::Stopped,
        }
    }

    /// Spawn the loop unless it is already running. Returns whether a task was spawned.
    ///
    /// The loop gets a receiver that changes once when the service is asked to stop.
    pub fn start<F, Fut>(&mut self, run: F) -> bool
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.state() == ServiceState::Running {
            tracing::debug!("Service {} already running", self.name);
            return false;
        }

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(run(rx));
        self.running = Some(Running { shutdown, handle });
        tracing::info!("Started {} service", self.name);
        true
    }

    /// Signal the loop and wait for it to wind down. Returns whether anything was running.
    pub async fn stop(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            tracing::debug!("Service {} already stopped", self.name);
            return false;
        };

        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            tracing::warn!("Service {} ended abnormally: {}", self.name, e);
        }
        tracing::info!("Stopped {} service", self.name);
        true
    }
}

/// Milliseconds since `start` on the monotonic clock
pub(crate) fn elapsed_ms(start: tokio::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// === Tool Functions ===

#[derive(Debug, Serialize)]
struct ServiceReport<T> {
    state: ServiceState,
    status: T,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    pixel_torch: ServiceReport<TorchStatus>,
    auto_hbm: ServiceReport<AutoHbmStatus>,
    settings: Config,
}

pub async fn get_status(parts: &PixelParts) -> Result<CallToolResult, McpError> {
    let torch_state = parts.torch_state().await;
    let hbm_state = parts.auto_hbm_state().await;
    let report = StatusReport {
        pixel_torch: ServiceReport {
            state: torch_state,
            status: parts.shared().torch_status.borrow().clone(),
        },
        auto_hbm: ServiceReport {
            state: hbm_state,
            status: parts.shared().hbm_status.borrow().clone(),
        },
        settings: parts.settings(),
    };

    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| internal_error(format!("Failed to serialize status: {}", e)))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
