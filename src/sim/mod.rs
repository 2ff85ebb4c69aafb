pub mod condition;
pub mod cost;
pub mod replay;
pub mod runner;

pub use condition::{MinHeight, RunCondition, SimulationEnvelope, ZeroVelocity};
pub use cost::{score, CostAccumulator};
pub use replay::{Frame, ReplayClient};
pub use runner::{Cycle, RunResult, RunState, Segway};
