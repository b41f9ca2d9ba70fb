//! Main application orchestration.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use tflow_fallback::FallbackEngine;
use tflow_gateway::{Gateway, GatewayOutcome, HttpGateway};
use tflow_health::{HealthTracker, HttpProber};
use tflow_hub::{run_server, BroadcastHub};
use tflow_persistence::{JsonLinesStore, Storage};
use tflow_scheduler::{RefreshScheduler, Services};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Wired engine: store, tracker, hub and scheduler, ready to run.
pub struct Application {
    config: AppConfig,
    storage: Arc<JsonLinesStore>,
    gateway: Arc<HttpGateway>,
    health: Arc<HealthTracker>,
    hub: Arc<BroadcastHub>,
    scheduler: Arc<RefreshScheduler>,
}

impl Application {
    /// Build every service and provision the configured entities.
    ///
    /// Failing to open the store is the only fatal startup condition
    /// besides invalid configuration.
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let storage = Arc::new(JsonLinesStore::open(
            &config.persistence.data_dir,
            config.persistence.buffer_size,
            config.persistence.retention,
        )?);
        let provisioned = storage.provision(config.seed_entities()).await?;
        info!(
            provisioned,
            data_dir = %config.persistence.data_dir,
            "Store opened"
        );

        let health = Arc::new(HealthTracker::new(config.health.clone()));
        for entity in storage.entities().await? {
            health.register(entity.id, entity.status);
        }

        let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
        let fallback = Arc::new(FallbackEngine::from_config(&config.fallback));
        let prober = Arc::new(HttpProber::new(&config.health)?);
        let hub = Arc::new(BroadcastHub::new(config.hub.client_buffer));

        let services = Services {
            storage: storage.clone(),
            gateway: gateway.clone(),
            fallback,
            health: health.clone(),
            prober,
            hub: hub.clone(),
        };
        let scheduler = Arc::new(RefreshScheduler::new(config.scheduler.clone(), services));

        Ok(Self {
            config,
            storage,
            gateway,
            health,
            hub,
            scheduler,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<JsonLinesStore> {
        &self.storage
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    /// Check the optimization service's liveness endpoint.
    ///
    /// An unreachable service is not fatal: cycles fall back per entity.
    pub async fn gateway_reachable(&self) -> bool {
        match self.gateway.health().await {
            GatewayOutcome::Available(()) => {
                info!(base_url = %self.config.gateway.base_url, "Optimization service reachable");
                true
            }
            GatewayOutcome::Unavailable => {
                warn!(
                    base_url = %self.config.gateway.base_url,
                    "Optimization service unreachable, cycles will use fallbacks"
                );
                false
            }
        }
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Run the hub server and all cadences until `signal` resolves, then
    /// stop them and flush the store.
    pub async fn run_until<F>(self, signal: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            entities = self.health.len(),
            hub_enabled = self.config.hub.enabled,
            "Starting application"
        );
        self.gateway_reachable().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let server_handle = if self.config.hub.enabled {
            let hub = self.hub.clone();
            let hub_config = self.config.hub.clone();
            let shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = run_server(hub, hub_config, shutdown).await {
                    error!(error = %e, "Hub server failed");
                }
            }))
        } else {
            info!("Hub server disabled");
            None
        };

        let cadences = self.scheduler.spawn(shutdown_rx);

        signal.await;
        info!("Shutdown signal received");

        // Receivers may already be gone if every task exited early.
        let _ = shutdown_tx.send(true);
        for handle in cadences {
            if let Err(e) = handle.await {
                warn!(error = %e, "Cadence task ended abnormally");
            }
        }
        if let Some(handle) = server_handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Hub server task ended abnormally");
            }
        }

        self.storage.flush().await?;
        info!("Shutdown complete");
        Ok(())
    }
}
