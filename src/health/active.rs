//! Active health refresh.
//!
//! # Responsibilities
//! - Periodically probe every backend's adapter
//! - Keep each backend's health cache warm so dispatch rarely probes inline

use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio::sync::broadcast;

use crate::backend::BackendPool;
use crate::config::HealthConfig;

pub struct HealthMonitor {
    backends: Arc<BackendPool>,
    config: HealthConfig,
}

impl HealthMonitor {
    pub fn new(backends: Arc<BackendPool>, config: HealthConfig) -> Self {
        Self { backends, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.active_enabled {
            tracing::info!("Active health refresh disabled");
            return;
        }

        tracing::info!(interval = self.config.interval_secs, "Health monitor starting");

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once.
    pub async fn check_all(&self) {
        for backend in self.backends.all_backends() {
            let before = backend.health().cached().await;
            let status = backend.health().refresh(backend.adapter()).await;
            if status != before {
                tracing::info!(backend = %backend.id(), from = %before, to = %status, "Backend health changed");
            }
        }
    }
}
