//! Rule-based signal timing.
//!
//! Pure and deterministic: the same reading always yields the same plan.

use chrono::{DateTime, Utc};

use tflow_core::{CongestionLevel, Provenance, Reading, SignalTimingPlan};

pub const BASE_GREEN_SECS: u32 = 45;
pub const BASE_RED_SECS: u32 = 30;
pub const YELLOW_SECS: u32 = 3;

const MAX_GREEN_SECS: u32 = 90;
const MIN_GREEN_SECS: u32 = 30;
const MAX_RED_SECS: u32 = 45;
const MIN_RED_SECS: u32 = 20;

const SLOW_SPEED: f64 = 20.0;
const FAST_SPEED: f64 = 40.0;

/// Confidence assigned to every rule-based plan.
pub const RULE_BASED_CONFIDENCE: f64 = 0.7;

/// Compute a signal timing plan from a reading without the external service.
///
/// Starting from green=45 / red=30 / yellow=3:
/// - heavy: green += 2 × vehicle_count (cap 90), red -= 5 (floor 20)
/// - light: green -= 10 (floor 30), red += 5 (cap 45)
/// - speed < 20: green += 10; speed > 40: green -= 5
///
/// Green bounds are re-applied after the speed adjustment.
pub fn rule_based_timing(reading: &Reading, now: DateTime<Utc>) -> SignalTimingPlan {
    let mut green = BASE_GREEN_SECS;
    let mut red = BASE_RED_SECS;

    match reading.congestion {
        CongestionLevel::Heavy => {
            green = green
                .saturating_add(reading.vehicle_count.saturating_mul(2))
                .min(MAX_GREEN_SECS);
            red = red.saturating_sub(5).max(MIN_RED_SECS);
        }
        CongestionLevel::Light => {
            green = green.saturating_sub(10).max(MIN_GREEN_SECS);
            red = (red + 5).min(MAX_RED_SECS);
        }
        CongestionLevel::Moderate => {}
    }

    if reading.avg_speed < SLOW_SPEED {
        green += 10;
    } else if reading.avg_speed > FAST_SPEED {
        green = green.saturating_sub(5);
    }
    let green = green.clamp(MIN_GREEN_SECS, MAX_GREEN_SECS);

    SignalTimingPlan {
        entity_id: reading.entity_id,
        green_secs: green,
        yellow_secs: YELLOW_SECS,
        red_secs: red,
        confidence: RULE_BASED_CONFIDENCE,
        provenance: Provenance::RuleBased,
        rationale: rationale(reading.congestion).to_string(),
        created_at: now,
    }
}

fn rationale(level: CongestionLevel) -> &'static str {
    match level {
        CongestionLevel::Heavy => {
            "Heavy congestion: green phase extended to clear queued vehicles"
        }
        CongestionLevel::Moderate => "Moderate traffic: baseline timing maintained",
        CongestionLevel::Light => {
            "Light traffic: green phase shortened to reduce cross-street wait"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tflow_core::EntityId;

    fn reading(vehicle_count: u32, congestion: CongestionLevel, avg_speed: f64) -> Reading {
        Reading {
            entity_id: EntityId::new(1),
            vehicle_count,
            avg_speed,
            congestion,
            confidence: 0.8,
            provenance: Provenance::Synthetic,
            weather: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_heavy_slow_example() {
        let plan = rule_based_timing(&reading(40, CongestionLevel::Heavy, 15.0), Utc::now());
        assert_eq!(plan.green_secs, 90);
        assert_eq!(plan.red_secs, 25);
        assert_eq!(plan.yellow_secs, 3);
        assert_eq!(plan.confidence, 0.7);
        assert_eq!(plan.provenance, Provenance::RuleBased);
        assert!(plan.rationale.starts_with("Heavy"));
    }

    #[test]
    fn test_moderate_baseline() {
        let plan = rule_based_timing(&reading(25, CongestionLevel::Moderate, 30.0), Utc::now());
        assert_eq!(plan.green_secs, 45);
        assert_eq!(plan.red_secs, 30);
    }

    #[test]
    fn test_light_fast() {
        let plan = rule_based_timing(&reading(5, CongestionLevel::Light, 50.0), Utc::now());
        assert_eq!(plan.green_secs, 30);
        assert_eq!(plan.red_secs, 35);
    }

    #[test]
    fn test_heavy_bounds_hold_for_all_counts() {
        for count in 0..=200 {
            // Moderate speed isolates the congestion rule.
            let plan = rule_based_timing(&reading(count, CongestionLevel::Heavy, 30.0), Utc::now());
            assert!(plan.green_secs >= 45 && plan.green_secs <= 90, "count={count}");
            assert!(plan.red_secs >= 20);

            for speed in [0.0, 19.9, 20.0, 40.0, 40.1, 120.0] {
                let plan =
                    rule_based_timing(&reading(count, CongestionLevel::Heavy, speed), Utc::now());
                assert!(plan.green_secs <= 90);
                assert!(plan.red_secs >= 20);
            }
        }
    }

    #[test]
    fn test_light_bounds_hold_for_all_speeds() {
        for count in 0..20 {
            for speed in [0.0, 10.0, 25.0, 45.0, 90.0] {
                let plan =
                    rule_based_timing(&reading(count, CongestionLevel::Light, speed), Utc::now());
                assert!(plan.green_secs >= 30, "count={count} speed={speed}");
                assert!(plan.red_secs <= 45);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let now = Utc::now();
        let r = reading(33, CongestionLevel::Moderate, 18.0);
        assert_eq!(rule_based_timing(&r, now), rule_based_timing(&r, now));
    }
}
