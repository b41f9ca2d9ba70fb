//! Time-of-day buckets for synthetic traffic predictions.

use chrono::{DateTime, Timelike, Utc};

/// Coarse time-of-day bucket driving the synthetic base volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    /// 07:00–09:59 and 16:00–19:59.
    RushHour,
    /// 10:00–15:59.
    Midday,
    /// Everything else.
    OffPeak,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            7..=9 | 16..=19 => Self::RushHour,
            10..=15 => Self::Midday,
            _ => Self::OffPeak,
        }
    }

    pub fn at(time: DateTime<Utc>) -> Self {
        Self::from_hour(time.hour())
    }

    /// Base vehicle volume for the bucket (rush > midday > off-peak).
    pub fn base_volume(&self) -> u32 {
        match self {
            Self::RushHour => 40,
            Self::Midday => 28,
            Self::OffPeak => 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets() {
        assert_eq!(TimeOfDay::from_hour(8), TimeOfDay::RushHour);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::RushHour);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Midday);
        assert_eq!(TimeOfDay::from_hour(2), TimeOfDay::OffPeak);
        assert_eq!(TimeOfDay::from_hour(22), TimeOfDay::OffPeak);
    }

    #[test]
    fn test_base_volume_ordering() {
        assert!(TimeOfDay::RushHour.base_volume() > TimeOfDay::Midday.base_volume());
        assert!(TimeOfDay::Midday.base_volume() > TimeOfDay::OffPeak.base_volume());
    }
}
