//! Application configuration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use tflow_core::{Entity, EntityId, EntityKind, EntityStatus, GeoPoint};
use tflow_fallback::FallbackConfig;
use tflow_gateway::GatewayConfig;
use tflow_health::HealthConfig;
use tflow_hub::HubConfig;
use tflow_persistence::Retention;
use tflow_scheduler::SchedulerConfig;

use crate::error::{AppError, AppResult};

/// Audit log location and buffering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding the daily `.jsonl` audit files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Records buffered before a flush to disk.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// History kept queryable in memory.
    #[serde(default)]
    pub retention: Retention,
}

fn default_data_dir() -> String {
    "data/audit".to_string()
}

fn default_buffer_size() -> usize {
    100
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            buffer_size: default_buffer_size(),
            retention: Retention::default(),
        }
    }
}

/// One provisioned entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySeed {
    pub id: u64,
    pub kind: EntityKind,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub status: EntityStatus,
    #[serde(default)]
    pub probe_url: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
}

impl EntitySeed {
    pub fn to_entity(&self) -> Entity {
        let mut entity = Entity::new(
            EntityId::new(self.id),
            self.kind,
            self.name.clone(),
            GeoPoint {
                lat: self.lat,
                lon: self.lon,
            },
        );
        entity.status = self.status;
        entity.probe_url = self.probe_url.clone();
        entity.image_ref = self.image_ref.clone();
        entity
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Provisioning seed loaded into the store at startup.
    #[serde(default)]
    pub entities: Vec<EntitySeed>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.health.failure_threshold == 0 {
            return Err(AppError::Config(
                "health.failure_threshold must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("health.latency_smoothing", self.health.latency_smoothing),
            ("health.uptime_smoothing", self.health.uptime_smoothing),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(AppError::Config(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if self.persistence.retention.rows_per_entity == 0
            || self.persistence.retention.log_entries == 0
        {
            return Err(AppError::Config(
                "persistence.retention limits must be at least 1".to_string(),
            ));
        }
        if self.hub.client_buffer == 0 {
            return Err(AppError::Config(
                "hub.client_buffer must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for seed in &self.entities {
            if !seen.insert(seed.id) {
                return Err(AppError::Config(format!("Duplicate entity id {}", seed.id)));
            }
        }
        Ok(())
    }

    /// Entities to provision at startup.
    pub fn seed_entities(&self) -> Vec<Entity> {
        self.entities.iter().map(EntitySeed::to_entity).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scheduler.traffic_refresh_mins, 5);
        assert_eq!(config.health.failure_threshold, 3);
        assert_eq!(config.hub.port, 8080);
        assert_eq!(config.persistence.buffer_size, 100);
        assert_eq!(config.persistence.retention.rows_per_entity, 288);
        assert!(config.entities.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let config = AppConfig::from_toml(
            r#"
            [scheduler]
            camera_refresh_mins = 3

            [gateway]
            base_url = "http://optimizer.local:9000"
            api_key = "secret"

            [fallback]
            seed = 42

            [persistence.retention]
            rows_per_entity = 12

            [[entities]]
            id = 1
            kind = "intersection"
            name = "Main & 1st"
            lat = 40.71
            lon = -74.0

            [[entities]]
            id = 2
            kind = "camera"
            name = "Main & 1st north"
            lat = 40.72
            lon = -74.0
            status = "maintenance"
            image_ref = "rtsp://cam-2/stream"
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.camera_refresh_mins, 3);
        assert_eq!(config.scheduler.traffic_refresh_mins, 5);
        assert_eq!(config.gateway.api_key.as_deref(), Some("secret"));
        assert_eq!(config.fallback.seed, Some(42));
        assert_eq!(config.persistence.retention.rows_per_entity, 12);
        assert_eq!(config.persistence.retention.log_entries, 10_000);

        let entities = config.seed_entities();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].status, EntityStatus::Active);
        assert_eq!(entities[1].kind, EntityKind::Camera);
        assert_eq!(entities[1].status, EntityStatus::Maintenance);
        assert_eq!(entities[1].image_ref.as_deref(), Some("rtsp://cam-2/stream"));
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [[entities]]
            id = 7
            kind = "camera"
            name = "a"
            lat = 0.0
            lon = 0.0

            [[entities]]
            id = 7
            kind = "camera"
            name = "b"
            lat = 0.0
            lon = 0.0
            "#,
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_smoothing_rejected() {
        let mut config = AppConfig::default();
        config.health.latency_smoothing = 1.5;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_retention_rejected() {
        let mut config = AppConfig::default();
        config.persistence.retention.rows_per_entity = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/default.toml");
        let config = AppConfig::from_file(path).unwrap();
        assert!(!config.entities.is_empty());
        assert_eq!(config.scheduler.health_probe_mins, 1);
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::from_file("/nonexistent/tflow.toml");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("traffic_refresh_mins"));
        assert!(toml_str.contains("failure_threshold"));
        assert!(toml_str.contains("data_dir"));
    }
}
