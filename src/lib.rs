pub mod config;
pub mod control;
pub mod error;
pub mod sim;
pub mod telemetry;

pub use config::{load_config, SegwayConfig};
pub use control::{BalanceController, Pid, PidGains};
pub use error::{ConfigError, SegwayError, SegwayResult};
pub use sim::{RunCondition, RunResult, Segway};
pub use telemetry::{Pose, SimClient};
