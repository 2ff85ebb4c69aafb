use std::path::Path;

use serde::Deserialize;

use crate::control::PidGains;
use crate::error::ConfigError;
use crate::sim::condition::SimulationEnvelope;
use crate::sim::cost::DEFAULT_POSITION_WEIGHT;

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Everything a balance run needs besides the simulator connection.
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SegwayConfig {
    pub body: String,
    pub left_motor: String,
    pub right_motor: String,
    /// Return codes strictly above this are per-cycle failures.
    pub error_threshold: i32,
    /// Weight `k` on drive-axis drift in the cost.
    pub position_weight: f64,
    /// Wait after a cycle that found no fresh data, ms. 0 only yields.
    pub poll_interval_ms: u64,
    pub gains: PidGains,
    pub envelope: SimulationEnvelope,
}

impl Default for SegwayConfig {
    fn default() -> Self {
        Self {
            body: "body".into(),
            left_motor: "leftMotor".into(),
            right_motor: "rightMotor".into(),
            error_threshold: 1,
            position_weight: DEFAULT_POSITION_WEIGHT,
            poll_interval_ms: 1,
            gains: PidGains::default(),
            envelope: SimulationEnvelope::default(),
        }
    }
}

impl SegwayConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

/// Load a config file. A missing file is an error, not a silent default.
pub fn load_config(path: impl AsRef<Path>) -> Result<SegwayConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    SegwayConfig::from_toml_str(&text)
}
