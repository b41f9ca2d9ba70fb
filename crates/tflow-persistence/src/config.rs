//! Retention limits for the in-process tables.

use serde::{Deserialize, Serialize};

/// How much history the memory store keeps.
///
/// The audit log on disk is unaffected; these limits only bound what stays
/// queryable in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    /// Readings, plans and prediction sets kept per entity. The default
    /// covers one day of 5-minute refreshes.
    #[serde(default = "default_rows_per_entity")]
    pub rows_per_entity: usize,
    /// Health events and activity entries kept, across all entities.
    #[serde(default = "default_log_entries")]
    pub log_entries: usize,
}

fn default_rows_per_entity() -> usize {
    288
}

fn default_log_entries() -> usize {
    10_000
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            rows_per_entity: default_rows_per_entity(),
            log_entries: default_log_entries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_retention_uses_defaults() {
        let retention: Retention = serde_json::from_str(r#"{"rows_per_entity": 12}"#).unwrap();
        assert_eq!(retention.rows_per_entity, 12);
        assert_eq!(retention.log_entries, 10_000);
    }
}
