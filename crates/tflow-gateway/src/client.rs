//! HTTP client for the optimization / detection / prediction service.
//!
//! Endpoints:
//! - `POST {base}/optimize` → [`OptimizeResponse`]
//! - `POST {base}/detect`   → [`DetectResponse`]
//! - `POST {base}/predict`  → [`PredictResponse`]
//! - `GET  {base}/health`   → any 2xx

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use tflow_core::EntityId;
use tflow_telemetry::Metrics;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::types::{
    BoxFuture, DetectRequestBody, DetectResponse, EnrichedData, EnrichmentRequest, Gateway,
    GatewayOutcome, OptimizeRequestBody, OptimizeResponse, PredictRequestBody, PredictResponse,
    RequestKind,
};

/// Gateway backed by the external HTTP service.
pub struct HttpGateway {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Bound on every request.
    timeout: Duration,
    /// Upstream credential.
    api_key: Option<String>,
    /// Disabled gateways never touch the network.
    enabled: bool,
}

impl HttpGateway {
    /// Create a new gateway from configuration.
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| GatewayError::InvalidUrl(format!("{base_url}: {e}")))?;

        let timeout = config.effective_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        info!(
            base_url = %base_url,
            timeout_ms = timeout.as_millis() as u64,
            enabled = config.enabled,
            credentials = config.has_credentials(),
            "Gateway configured"
        );

        Ok(Self {
            client,
            base_url,
            timeout,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            enabled: config.enabled,
        })
    }

    /// Configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Send a request and decode the JSON body, bounded by the timeout.
    ///
    /// Every failure cause is logged here and collapsed to `Unavailable`.
    async fn execute<T: DeserializeOwned>(
        &self,
        kind: RequestKind,
        entity_id: Option<EntityId>,
        builder: RequestBuilder,
    ) -> GatewayOutcome<T> {
        if !self.enabled {
            return GatewayOutcome::Unavailable;
        }

        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, async {
            let response = builder.send().await?.error_for_status()?;
            response.json::<T>().await
        })
        .await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let outcome = match result {
            Ok(Ok(body)) => GatewayOutcome::Available(body),
            Ok(Err(e)) => {
                debug!(
                    kind = %kind,
                    entity_id = ?entity_id,
                    error = %e,
                    "Gateway request failed"
                );
                GatewayOutcome::Unavailable
            }
            Err(_) => {
                warn!(
                    kind = %kind,
                    entity_id = ?entity_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Gateway request timed out"
                );
                GatewayOutcome::Unavailable
            }
        };

        Metrics::gateway_request(kind.as_str(), outcome.is_available(), latency_ms);
        outcome
    }

    async fn request_inner(
        &self,
        entity_id: EntityId,
        request: EnrichmentRequest,
    ) -> GatewayOutcome<EnrichedData> {
        match request {
            EnrichmentRequest::Optimize(reading) => {
                let body = OptimizeRequestBody::new(entity_id, &reading);
                let builder = self.authorize(self.client.post(self.url("optimize")).json(&body));
                self.execute::<OptimizeResponse>(RequestKind::Optimize, Some(entity_id), builder)
                    .await
                    .map(EnrichedData::Timing)
            }
            EnrichmentRequest::Detect { image_ref } => {
                let body = DetectRequestBody {
                    camera_id: entity_id,
                    image_ref: &image_ref,
                };
                let builder = self.authorize(self.client.post(self.url("detect")).json(&body));
                self.execute::<DetectResponse>(RequestKind::Detect, Some(entity_id), builder)
                    .await
                    .map(EnrichedData::Detection)
            }
            EnrichmentRequest::Predict { horizon_hours } => {
                let body = PredictRequestBody {
                    intersection_id: entity_id,
                    horizon: horizon_hours,
                };
                let builder = self.authorize(self.client.post(self.url("predict")).json(&body));
                self.execute::<PredictResponse>(RequestKind::Predict, Some(entity_id), builder)
                    .await
                    .map(EnrichedData::Forecast)
            }
        }
    }

    async fn health_inner(&self) -> GatewayOutcome<()> {
        if !self.enabled {
            return GatewayOutcome::Unavailable;
        }

        let started = Instant::now();
        let builder = self.authorize(self.client.get(self.url("health")));
        let result = tokio::time::timeout(self.timeout, async {
            builder.send().await?.error_for_status()
        })
        .await;
        let available = matches!(result, Ok(Ok(_)));
        Metrics::gateway_request(
            RequestKind::Health.as_str(),
            available,
            started.elapsed().as_secs_f64() * 1000.0,
        );

        if available {
            GatewayOutcome::Available(())
        } else {
            debug!("Gateway health check failed");
            GatewayOutcome::Unavailable
        }
    }
}

impl Gateway for HttpGateway {
    fn request(
        &self,
        entity_id: EntityId,
        request: EnrichmentRequest,
    ) -> BoxFuture<'_, GatewayOutcome<EnrichedData>> {
        Box::pin(self.request_inner(entity_id, request))
    }

    fn health(&self) -> BoxFuture<'_, GatewayOutcome<()>> {
        Box::pin(self.health_inner())
    }
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}
