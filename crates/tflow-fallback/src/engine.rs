//! Fallback engine with an injectable random source.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use tflow_core::{
    CongestionLevel, CongestionRisk, EntityId, Prediction, PredictionSet, Provenance, Reading,
    SignalTimingPlan,
};

use crate::config::FallbackConfig;
use crate::prediction::TimeOfDay;
use crate::timing::rule_based_timing;

/// Confidence assigned to synthetic readings.
pub const SYNTHETIC_CONFIDENCE: f64 = 0.8;

const MIN_SYNTHETIC_VEHICLES: u32 = 5;
const MAX_SYNTHETIC_VEHICLES: u32 = 50;
const PREDICTION_JITTER: i32 = 5;
const WEATHER_TAGS: [&str; 3] = ["clear", "cloudy", "rain"];

/// Produces local substitutes for gateway results.
///
/// The RNG sits behind a mutex so one engine can be shared by every
/// cadence task. The lock is never held across an await point.
pub struct FallbackEngine<R = StdRng> {
    rng: Mutex<R>,
}

impl FallbackEngine<StdRng> {
    /// Deterministic engine for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Engine seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn from_config(config: &FallbackConfig) -> Self {
        match config.seed {
            Some(seed) => {
                debug!(seed, "Fallback engine using fixed seed");
                Self::seeded(seed)
            }
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> FallbackEngine<R> {
    /// Wrap an arbitrary RNG.
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Rule-based signal timing (no randomness involved).
    pub fn timing(&self, reading: &Reading, now: DateTime<Utc>) -> SignalTimingPlan {
        rule_based_timing(reading, now)
    }

    /// Generate a plausible reading when no real telemetry exists.
    ///
    /// Speed is inversely correlated with the congestion tier.
    pub fn synthetic_reading(&self, entity_id: EntityId, now: DateTime<Utc>) -> Reading {
        let mut rng = self.rng.lock();

        let vehicle_count = rng.gen_range(MIN_SYNTHETIC_VEHICLES..=MAX_SYNTHETIC_VEHICLES);
        let congestion = CongestionLevel::from_vehicle_count(vehicle_count);
        let (min_speed, max_speed) = match congestion {
            CongestionLevel::Light => (40.0, 55.0),
            CongestionLevel::Moderate => (25.0, 40.0),
            CongestionLevel::Heavy => (10.0, 25.0),
        };
        let avg_speed = round1(rng.gen_range(min_speed..max_speed));
        let weather = if rng.gen_bool(0.8) {
            Some(WEATHER_TAGS[rng.gen_range(0..WEATHER_TAGS.len())].to_string())
        } else {
            None
        };

        Reading {
            entity_id,
            vehicle_count,
            avg_speed,
            congestion,
            confidence: SYNTHETIC_CONFIDENCE,
            provenance: Provenance::Synthetic,
            weather,
            recorded_at: now,
        }
    }

    /// Generate an hourly forecast for the next `horizon_hours` hours.
    pub fn synthetic_predictions(
        &self,
        entity_id: EntityId,
        horizon_hours: u32,
        now: DateTime<Utc>,
    ) -> PredictionSet {
        let mut rng = self.rng.lock();

        let predictions = (1..=horizon_hours)
            .map(|offset| {
                let at = now + Duration::hours(i64::from(offset));
                let base = TimeOfDay::at(at).base_volume() as i32;
                let jitter = rng.gen_range(-PREDICTION_JITTER..=PREDICTION_JITTER);
                let predicted_volume = (base + jitter).max(0) as u32;
                Prediction {
                    at,
                    predicted_volume,
                    confidence: rng.gen_range(0.6..=0.9),
                    risk: CongestionRisk::from_volume(predicted_volume),
                }
            })
            .collect();

        PredictionSet {
            entity_id,
            predictions,
            provenance: Provenance::Synthetic,
            generated_at: now,
        }
    }
}

impl<R> std::fmt::Debug for FallbackEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackEngine").finish_non_exhaustive()
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_seeded_engines_agree() {
        let now = Utc::now();
        let a = FallbackEngine::seeded(42);
        let b = FallbackEngine::seeded(42);
        for _ in 0..20 {
            assert_eq!(
                a.synthetic_reading(EntityId::new(1), now),
                b.synthetic_reading(EntityId::new(1), now)
            );
        }
        assert_eq!(
            a.synthetic_predictions(EntityId::new(1), 6, now),
            b.synthetic_predictions(EntityId::new(1), 6, now)
        );
    }

    #[test]
    fn test_synthetic_reading_is_plausible() {
        let engine = FallbackEngine::seeded(7);
        for _ in 0..500 {
            let reading = engine.synthetic_reading(EntityId::new(3), Utc::now());
            assert!((5..=50).contains(&reading.vehicle_count));
            assert_eq!(
                reading.congestion,
                CongestionLevel::from_vehicle_count(reading.vehicle_count)
            );
            let speed_ok = match reading.congestion {
                CongestionLevel::Light => (40.0..=55.0).contains(&reading.avg_speed),
                CongestionLevel::Moderate => (25.0..=40.0).contains(&reading.avg_speed),
                CongestionLevel::Heavy => (10.0..=25.0).contains(&reading.avg_speed),
            };
            assert!(speed_ok, "speed {} for {:?}", reading.avg_speed, reading.congestion);
            assert_eq!(reading.confidence, 0.8);
            assert_eq!(reading.provenance, Provenance::Synthetic);
        }
    }

    #[test]
    fn test_predictions_follow_time_of_day() {
        let engine = FallbackEngine::seeded(11);
        // 06:00 → horizon covers 07:00..=12:00.
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
        let set = engine.synthetic_predictions(EntityId::new(9), 6, now);

        assert_eq!(set.predictions.len(), 6);
        assert_eq!(set.provenance, Provenance::Synthetic);
        for prediction in &set.predictions {
            assert!((0.6..=0.9).contains(&prediction.confidence));
            assert_eq!(
                prediction.risk,
                CongestionRisk::from_volume(prediction.predicted_volume)
            );
        }

        // 07:00 is rush hour, 12:00 is midday.
        assert!(set.predictions[0].predicted_volume > set.predictions[5].predicted_volume);
    }

    #[test]
    fn test_rush_hour_beats_off_peak() {
        let engine = FallbackEngine::seeded(5);
        let rush = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap();
        for _ in 0..50 {
            let r = engine.synthetic_predictions(EntityId::new(1), 1, rush);
            let n = engine.synthetic_predictions(EntityId::new(1), 1, night);
            assert!(r.predictions[0].predicted_volume > n.predictions[0].predicted_volume);
        }
    }

    #[test]
    fn test_zero_horizon() {
        let engine = FallbackEngine::seeded(1);
        assert!(engine
            .synthetic_predictions(EntityId::new(1), 0, Utc::now())
            .predictions
            .is_empty());
    }
}
