use thiserror::Error;

use crate::telemetry::ReturnCode;

/// Errors reported while talking to the simulator.
///
/// None of these stop a run: setup failures leave the loop running with
/// whatever handles did resolve, and actuation failures are logged per cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegwayError {
    #[error("object handle for '{name}' not resolved (code {code})")]
    Resolve { name: String, code: ReturnCode },

    #[error("wheel target velocity write failed (code {code})")]
    Actuation { code: ReturnCode },
}

pub type SegwayResult<T> = Result<T, SegwayError>;

/// Errors raised while loading a [`SegwayConfig`](crate::config::SegwayConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
