//! Runtime state shared by the tools and the service loops

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::actuators::{fast_charge, saturation};
use crate::config::Config;
use crate::control::ambient::AmbientDecision;
use crate::control::torch::TorchCommand;
use crate::sensors::sysfs::NodePort;
use crate::services::{auto_hbm, torch, Service, ServiceState};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TorchStatus {
    pub shakes: u64,
    pub last_shake_ms: Option<u64>,
    pub last_command: Option<TorchCommand>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutoHbmStatus {
    pub decision: Option<AmbientDecision>,
    /// What was last written to the HBM node
    pub hbm_on: Option<bool>,
    pub last_error: Option<String>,
}

/// Handles the service loops need; cheap to clone
#[derive(Debug, Clone)]
pub struct Shared {
    pub port: Arc<dyn NodePort>,
    config: Arc<RwLock<Config>>,
    pub torch_status: Arc<watch::Sender<TorchStatus>>,
    pub hbm_status: Arc<watch::Sender<AutoHbmStatus>>,
}

impl Shared {
    pub fn new(port: Arc<dyn NodePort>, config: Config) -> Self {
        Self {
            port,
            config: Arc::new(RwLock::new(config)),
            torch_status: Arc::new(watch::Sender::new(TorchStatus::default())),
            hbm_status: Arc::new(watch::Sender::new(AutoHbmStatus::default())),
        }
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn modify(&self, f: impl FnOnce(&mut Config)) -> Config {
        let mut config = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut config);
        config.sanitize();
        config.clone()
    }
}

#[derive(Debug)]
pub struct PixelParts {
    shared: Shared,
    /// Where settings are persisted; `None` keeps them in memory only
    config_path: Option<PathBuf>,
    torch: Mutex<Service>,
    auto_hbm: Mutex<Service>,
}

impl PixelParts {
    pub fn new(port: Arc<dyn NodePort>, config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            shared: Shared::new(port, config),
            config_path,
            torch: Mutex::new(Service::new("pixel_torch")),
            auto_hbm: Mutex::new(Service::new("auto_hbm")),
        }
    }

    pub fn shared(&self) -> &Shared {
        &self.shared
    }

    pub fn port(&self) -> &dyn NodePort {
        self.shared.port.as_ref()
    }

    pub fn settings(&self) -> Config {
        self.shared.settings()
    }

    /// Apply a settings change and persist it
    pub fn update(&self, f: impl FnOnce(&mut Config)) -> anyhow::Result<Config> {
        let config = self.shared.modify(f);
        if let Some(path) = &self.config_path {
            config.save_to(path)?;
        }
        Ok(config)
    }

    pub async fn torch_state(&self) -> ServiceState {
        self.torch.lock().await.state()
    }

    pub async fn auto_hbm_state(&self) -> ServiceState {
        self.auto_hbm.lock().await.state()
    }

    /// Start or stop the torch service to match `pixel_torch.enabled`
    pub async fn reconcile_torch(&self) -> ServiceState {
        let enabled = self.settings().pixel_torch.enabled;
        let mut service = self.torch.lock().await;
        if enabled {
            let shared = self.shared.clone();
            service.start(move |shutdown| torch::run(shared, shutdown));
        } else {
            service.stop().await;
        }
        service.state()
    }

    /// Start or stop the auto HBM service to match `auto_hbm.enabled`
    pub async fn reconcile_auto_hbm(&self) -> ServiceState {
        let enabled = self.settings().auto_hbm.enabled;
        let mut service = self.auto_hbm.lock().await;
        if enabled {
            let shared = self.shared.clone();
            service.start(move |shutdown| auto_hbm::run(shared, shutdown));
        } else {
            service.stop().await;
        }
        service.state()
    }

    /// Bring the device in line with the persisted settings after boot
    pub async fn restore(&self) {
        let config = self.settings();

        self.reconcile_auto_hbm().await;

        if self.port().is_writable(&config.nodes.fast_charge) {
            match fast_charge::write(self.port(), &config.nodes.fast_charge, config.fast_charge.enabled) {
                Ok(()) => tracing::info!("Restored fast charge: {}", config.fast_charge.enabled),
                Err(e) => tracing::warn!("Failed to restore fast charge: {}", e),
            }
        } else {
            tracing::debug!("Fast charge node not writable, skipping restore");
        }

        self.reconcile_torch().await;

        if let Err(e) = saturation::apply(config.saturation.level).await {
            tracing::warn!("Failed to restore saturation: {}", e);
        }
    }

    pub async fn shutdown(&self) {
        self.torch.lock().await.stop().await;
        self.auto_hbm.lock().await.stop().await;
    }
}
