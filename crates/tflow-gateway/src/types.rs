//! Gateway trait, outcome type and service wire formats.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tflow_core::{
    CongestionLevel, CongestionRisk, EntityId, Prediction, PredictionSet, Provenance, Reading,
    SignalTimingPlan,
};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a gateway call.
///
/// Carries no failure cause: timeouts, transport errors and
/// non-success responses are indistinguishable to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome<T> {
    Available(T),
    Unavailable,
}

impl<T> GatewayOutcome<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Convert into an `Option`, discarding the variant name.
    pub fn available(self) -> Option<T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> GatewayOutcome<U> {
        match self {
            Self::Available(value) => GatewayOutcome::Available(f(value)),
            Self::Unavailable => GatewayOutcome::Unavailable,
        }
    }
}

/// Kind of enrichment requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Optimize,
    Detect,
    Predict,
    Health,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimize => "optimize",
            Self::Detect => "detect",
            Self::Predict => "predict",
            Self::Health => "health",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload for one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentRequest {
    /// Signal timing optimization for the given reading.
    Optimize(Reading),
    /// Vehicle detection on a camera frame or feed reference.
    Detect { image_ref: String },
    /// Traffic prediction for the next `horizon_hours` hours.
    Predict { horizon_hours: u32 },
}

impl EnrichmentRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Optimize(_) => RequestKind::Optimize,
            Self::Detect { .. } => RequestKind::Detect,
            Self::Predict { .. } => RequestKind::Predict,
        }
    }
}

/// Successful gateway payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichedData {
    Timing(OptimizeResponse),
    Detection(DetectResponse),
    Forecast(PredictResponse),
}

/// Access to the external optimization / detection / prediction service.
///
/// Implementations must bound every call by a timeout and must not retry.
pub trait Gateway: Send + Sync {
    /// Request enriched data for one entity.
    fn request(
        &self,
        entity_id: EntityId,
        request: EnrichmentRequest,
    ) -> BoxFuture<'_, GatewayOutcome<EnrichedData>>;

    /// Service liveness check.
    fn health(&self) -> BoxFuture<'_, GatewayOutcome<()>>;

    /// Typed wrapper around [`Gateway::request`] for optimization.
    fn optimize(
        &self,
        entity_id: EntityId,
        reading: &Reading,
    ) -> BoxFuture<'_, GatewayOutcome<OptimizeResponse>> {
        let fut = self.request(entity_id, EnrichmentRequest::Optimize(reading.clone()));
        Box::pin(async move {
            match fut.await {
                GatewayOutcome::Available(EnrichedData::Timing(timing)) => {
                    GatewayOutcome::Available(timing)
                }
                _ => GatewayOutcome::Unavailable,
            }
        })
    }

    /// Typed wrapper around [`Gateway::request`] for detection.
    fn detect(
        &self,
        entity_id: EntityId,
        image_ref: String,
    ) -> BoxFuture<'_, GatewayOutcome<DetectResponse>> {
        let fut = self.request(entity_id, EnrichmentRequest::Detect { image_ref });
        Box::pin(async move {
            match fut.await {
                GatewayOutcome::Available(EnrichedData::Detection(detection)) => {
                    GatewayOutcome::Available(detection)
                }
                _ => GatewayOutcome::Unavailable,
            }
        })
    }

    /// Typed wrapper around [`Gateway::request`] for prediction.
    fn predict(
        &self,
        entity_id: EntityId,
        horizon_hours: u32,
    ) -> BoxFuture<'_, GatewayOutcome<PredictResponse>> {
        let fut = self.request(entity_id, EnrichmentRequest::Predict { horizon_hours });
        Box::pin(async move {
            match fut.await {
                GatewayOutcome::Available(EnrichedData::Forecast(forecast)) => {
                    GatewayOutcome::Available(forecast)
                }
                _ => GatewayOutcome::Unavailable,
            }
        })
    }
}

// ============================================================================
// Wire formats
// ============================================================================

/// `POST /optimize` request body.
#[derive(Debug, Serialize)]
pub(crate) struct OptimizeRequestBody {
    pub intersection_id: EntityId,
    pub vehicle_count: u32,
    pub avg_speed: f64,
    pub congestion_level: CongestionLevel,
}

impl OptimizeRequestBody {
    pub(crate) fn new(entity_id: EntityId, reading: &Reading) -> Self {
        Self {
            intersection_id: entity_id,
            vehicle_count: reading.vehicle_count,
            avg_speed: reading.avg_speed,
            congestion_level: reading.congestion,
        }
    }
}

/// `POST /detect` request body.
#[derive(Debug, Serialize)]
pub(crate) struct DetectRequestBody<'a> {
    pub camera_id: EntityId,
    pub image_ref: &'a str,
}

/// `POST /predict` request body.
#[derive(Debug, Serialize)]
pub(crate) struct PredictRequestBody {
    pub intersection_id: EntityId,
    pub horizon: u32,
}

/// `POST /optimize` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub green_time: u32,
    pub yellow_time: u32,
    pub red_time: u32,
    pub confidence: f64,
    pub reasoning: String,
}

impl OptimizeResponse {
    /// Convert into a gateway-provenance plan.
    pub fn into_plan(self, entity_id: EntityId, now: DateTime<Utc>) -> SignalTimingPlan {
        SignalTimingPlan {
            entity_id,
            green_secs: self.green_time,
            yellow_secs: self.yellow_time,
            red_secs: self.red_time,
            confidence: self.confidence.clamp(0.0, 1.0),
            provenance: Provenance::Gateway,
            rationale: self.reasoning,
            created_at: now,
        }
    }
}

/// `POST /detect` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectResponse {
    pub vehicle_count: u32,
    pub avg_speed: f64,
    pub congestion_level: u8,
    pub confidence: f64,
}

impl DetectResponse {
    /// Convert into a gateway-provenance reading.
    ///
    /// An out-of-range congestion level is re-derived from the vehicle count.
    pub fn into_reading(self, entity_id: EntityId, now: DateTime<Utc>) -> Reading {
        let congestion = CongestionLevel::try_from(self.congestion_level)
            .unwrap_or_else(|_| CongestionLevel::from_vehicle_count(self.vehicle_count));
        Reading {
            entity_id,
            vehicle_count: self.vehicle_count,
            avg_speed: self.avg_speed.max(0.0),
            congestion,
            confidence: self.confidence.clamp(0.0, 1.0),
            provenance: Provenance::Gateway,
            weather: None,
            recorded_at: now,
        }
    }
}

/// One prediction entry on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePrediction {
    pub timestamp: DateTime<Utc>,
    pub predicted_volume: u32,
    pub confidence: f64,
    #[serde(default)]
    pub congestion_risk: Option<CongestionRisk>,
}

/// `POST /predict` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<WirePrediction>,
}

impl PredictResponse {
    /// Convert into a gateway-provenance prediction set.
    pub fn into_prediction_set(self, entity_id: EntityId, now: DateTime<Utc>) -> PredictionSet {
        let predictions = self
            .predictions
            .into_iter()
            .map(|p| Prediction {
                at: p.timestamp,
                predicted_volume: p.predicted_volume,
                confidence: p.confidence.clamp(0.0, 1.0),
                risk: p
                    .congestion_risk
                    .unwrap_or_else(|| CongestionRisk::from_volume(p.predicted_volume)),
            })
            .collect();
        PredictionSet {
            entity_id,
            predictions,
            provenance: Provenance::Gateway,
            generated_at: now,
        }
    }
}
