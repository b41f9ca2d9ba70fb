//! Fallback configuration.

use serde::{Deserialize, Serialize};

/// Fallback engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Fixed RNG seed. Unset means seeded from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}
