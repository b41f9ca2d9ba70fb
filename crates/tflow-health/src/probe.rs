//! Connectivity probes.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use tracing::debug;

use tflow_core::{Entity, EntityStatus};

use crate::config::{HealthConfig, SimulatedRates};
use crate::error::{HealthError, HealthResult};
use crate::tracker::ProbeOutcome;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can check whether an entity answers.
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, entity: &'a Entity) -> BoxFuture<'a, ProbeOutcome>;
}

/// Probe without a network: success odds depend on the current status.
pub struct SimulatedProber<R = StdRng> {
    rates: SimulatedRates,
    rng: Mutex<R>,
}

impl SimulatedProber<StdRng> {
    pub fn new(rates: SimulatedRates) -> Self {
        Self::with_rng(rates, StdRng::from_entropy())
    }

    pub fn seeded(rates: SimulatedRates, seed: u64) -> Self {
        Self::with_rng(rates, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SimulatedProber<R> {
    pub fn with_rng(rates: SimulatedRates, rng: R) -> Self {
        Self {
            rates,
            rng: Mutex::new(rng),
        }
    }

    fn success_rate(&self, status: EntityStatus) -> f64 {
        let rate = match status {
            EntityStatus::Active => self.rates.active,
            EntityStatus::Error => self.rates.error,
            EntityStatus::Offline => self.rates.offline,
            EntityStatus::Maintenance => self.rates.maintenance,
        };
        rate.clamp(0.0, 1.0)
    }

    /// Draw one outcome synchronously.
    pub fn sample(&self, status: EntityStatus) -> ProbeOutcome {
        let rate = self.success_rate(status);
        let mut rng = self.rng.lock();
        if rng.gen_bool(rate) {
            let (min, max) = (self.rates.min_latency_ms, self.rates.max_latency_ms);
            let latency_ms = if max > min { rng.gen_range(min..max) } else { min };
            ProbeOutcome::Success { latency_ms }
        } else {
            ProbeOutcome::Failure {
                error: "no response".to_string(),
                latency_ms: None,
            }
        }
    }
}

impl<R: Rng + Send> Prober for SimulatedProber<R> {
    fn probe<'a>(&'a self, entity: &'a Entity) -> BoxFuture<'a, ProbeOutcome> {
        let outcome = self.sample(entity.status);
        Box::pin(async move { outcome })
    }
}

/// HTTP GET against the entity's `probe_url`.
///
/// Entities without a probe endpoint are delegated to the simulator.
pub struct HttpProber {
    client: Client,
    timeout: Duration,
    simulated: SimulatedProber,
}

impl HttpProber {
    pub fn new(config: &HealthConfig) -> HealthResult<Self> {
        let timeout = Duration::from_millis(config.probe_timeout_ms);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HealthError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout,
            simulated: SimulatedProber::new(config.simulated.clone()),
        })
    }

    async fn probe_url(&self, url: &str) -> ProbeOutcome {
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, async {
            self.client.get(url).send().await?.error_for_status()
        })
        .await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(Ok(_)) => ProbeOutcome::Success { latency_ms },
            Ok(Err(e)) => {
                debug!(url, error = %e, "Probe failed");
                ProbeOutcome::Failure {
                    error: e.to_string(),
                    latency_ms: e.status().map(|_| latency_ms),
                }
            }
            Err(_) => ProbeOutcome::Failure {
                error: format!("timed out after {}ms", self.timeout.as_millis()),
                latency_ms: None,
            },
        }
    }
}

impl Prober for HttpProber {
    fn probe<'a>(&'a self, entity: &'a Entity) -> BoxFuture<'a, ProbeOutcome> {
        match entity.probe_url.as_deref() {
            Some(url) => Box::pin(self.probe_url(url)),
            None => self.simulated.probe(entity),
        }
    }
}

impl std::fmt::Debug for HttpProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProber")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use tflow_core::{EntityId, EntityKind, GeoPoint};

    fn entity(status: EntityStatus, probe_url: Option<String>) -> Entity {
        let mut entity = Entity::new(
            EntityId::new(1),
            EntityKind::Camera,
            "North cam",
            GeoPoint { lat: 0.0, lon: 0.0 },
        );
        entity.status = status;
        entity.probe_url = probe_url;
        entity
    }

    #[tokio::test]
    async fn test_simulated_rates_by_status() {
        let prober = SimulatedProber::seeded(SimulatedRates::default(), 3);
        let successes = |status| {
            (0..1_000)
                .filter(|_| prober.sample(status).is_success())
                .count()
        };

        let active = successes(EntityStatus::Active);
        let maintenance = successes(EntityStatus::Maintenance);
        assert!(active > 900, "active {active}");
        assert!(maintenance < 300, "maintenance {maintenance}");
    }

    #[tokio::test]
    async fn test_simulated_latency_bounds() {
        let prober = SimulatedProber::seeded(SimulatedRates::default(), 9);
        let target = entity(EntityStatus::Active, None);
        for _ in 0..200 {
            if let ProbeOutcome::Success { latency_ms } = prober.probe(&target).await {
                assert!((20.0..200.0).contains(&latency_ms));
            }
        }
    }

    #[tokio::test]
    async fn test_http_probe_success_and_failure() {
        let router = Router::new()
            .route("/up", get(|| async { "ok" }))
            .route(
                "/down",
                get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "down") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let prober = HttpProber::new(&HealthConfig::default()).unwrap();

        let up = entity(EntityStatus::Active, Some(format!("http://{addr}/up")));
        assert!(prober.probe(&up).await.is_success());

        let down = entity(EntityStatus::Active, Some(format!("http://{addr}/down")));
        match prober.probe(&down).await {
            ProbeOutcome::Failure { latency_ms, .. } => assert!(latency_ms.is_some()),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_probe_unreachable() {
        let prober = HttpProber::new(&HealthConfig {
            probe_timeout_ms: 500,
            ..HealthConfig::default()
        })
        .unwrap();
        let target = entity(EntityStatus::Active, Some("http://127.0.0.1:9/".to_string()));
        assert!(!prober.probe(&target).await.is_success());
    }
}
