//! Scripted gateway for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use tflow_core::EntityId;

use crate::types::{
    BoxFuture, DetectResponse, EnrichedData, EnrichmentRequest, Gateway, GatewayOutcome,
    OptimizeResponse, PredictResponse,
};

/// Mock gateway with settable responses and recorded requests.
///
/// A request is `Available` only when the mock is marked available and a
/// response for that request kind has been set.
#[derive(Debug, Default)]
pub struct MockGateway {
    /// Recorded requests for verification.
    requests: Mutex<Vec<(EntityId, EnrichmentRequest)>>,
    /// Whether the service answers at all.
    available: AtomicBool,
    optimize: Mutex<Option<OptimizeResponse>>,
    detect: Mutex<Option<DetectResponse>>,
    predict: Mutex<Option<PredictResponse>>,
    /// Artificial latency applied to every request.
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockGateway {
    /// Create an unavailable mock with no responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an available mock.
    pub fn available() -> Self {
        let mock = Self::default();
        mock.set_available(true);
        mock
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_optimize(&self, response: OptimizeResponse) {
        *self.optimize.lock() = Some(response);
    }

    pub fn set_detect(&self, response: DetectResponse) {
        *self.detect.lock() = Some(response);
    }

    pub fn set_predict(&self, response: PredictResponse) {
        *self.predict.lock() = Some(response);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Get recorded requests.
    pub fn requests(&self) -> Vec<(EntityId, EnrichmentRequest)> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Highest number of requests observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, request: &EnrichmentRequest) -> GatewayOutcome<EnrichedData> {
        if !self.available.load(Ordering::SeqCst) {
            return GatewayOutcome::Unavailable;
        }
        let data = match request {
            EnrichmentRequest::Optimize(_) => self.optimize.lock().clone().map(EnrichedData::Timing),
            EnrichmentRequest::Detect { .. } => {
                self.detect.lock().clone().map(EnrichedData::Detection)
            }
            EnrichmentRequest::Predict { .. } => {
                self.predict.lock().clone().map(EnrichedData::Forecast)
            }
        };
        match data {
            Some(data) => GatewayOutcome::Available(data),
            None => GatewayOutcome::Unavailable,
        }
    }
}

impl Gateway for MockGateway {
    fn request(
        &self,
        entity_id: EntityId,
        request: EnrichmentRequest,
    ) -> BoxFuture<'_, GatewayOutcome<EnrichedData>> {
        Box::pin(async move {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let outcome = self.respond(&request);
            self.requests.lock().push((entity_id, request));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        })
    }

    fn health(&self) -> BoxFuture<'_, GatewayOutcome<()>> {
        Box::pin(async move {
            if self.available.load(Ordering::SeqCst) {
                GatewayOutcome::Available(())
            } else {
                GatewayOutcome::Unavailable
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection() -> DetectResponse {
        DetectResponse {
            vehicle_count: 12,
            avg_speed: 44.0,
            congestion_level: 0,
            confidence: 0.95,
        }
    }

    #[tokio::test]
    async fn test_unavailable_by_default() {
        let mock = MockGateway::new();
        mock.set_detect(detection());
        let outcome = mock.detect(EntityId::new(1), "cam".to_string()).await;
        assert_eq!(outcome, GatewayOutcome::Unavailable);
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_available_requires_response() {
        let mock = MockGateway::available();
        assert_eq!(
            mock.predict(EntityId::new(1), 4).await,
            GatewayOutcome::Unavailable
        );

        mock.set_detect(detection());
        assert_eq!(
            mock.detect(EntityId::new(1), "cam".to_string()).await,
            GatewayOutcome::Available(detection())
        );
    }
}
