use serde::Deserialize;

use crate::telemetry::Pose;

// ---------------------------------------------------------------------------
// Run conditions
// ---------------------------------------------------------------------------

/// Decides after every completed cycle whether the run goes on.
///
/// Implementations must be pure: same `(time, pose)` in, same answer out.
pub trait RunCondition {
    /// `time_ms` is the simulation clock of the cycle just completed.
    fn keep_running(&self, time_ms: i64, pose: &Pose) -> bool;
}

impl<F> RunCondition for F
where
    F: Fn(i64, &Pose) -> bool,
{
    fn keep_running(&self, time_ms: i64, pose: &Pose) -> bool {
        self(time_ms, pose)
    }
}

/// Default run condition: the body must stay inside a box once the startup
/// grace period is over.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationEnvelope {
    pub grace_ms: i64,
    /// Lower bound on body height, m. Below it the body touches the ground
    /// (wheel radius is 0.08 m).
    pub min_height: f64,
    /// Upper bound on body height, m.
    pub max_height: f64,
    /// Bound on |y|, m.
    pub max_lateral: f64,
    /// Bound on |x| along the drive axis, m.
    pub max_drive: f64,
}

impl Default for SimulationEnvelope {
    fn default() -> Self {
        Self {
            grace_ms: 100,
            min_height: 0.04,
            max_height: 0.7,
            max_lateral: 0.05,
            max_drive: 1.0,
        }
    }
}

impl RunCondition for SimulationEnvelope {
    fn keep_running(&self, time_ms: i64, pose: &Pose) -> bool {
        if time_ms < self.grace_ms {
            return true;
        }
        let p = &pose.position;
        let height_ok = self.min_height < p.z && p.z < self.max_height;
        let lateral_ok = p.y.abs() < self.max_lateral;
        let drive_ok = p.x.abs() < self.max_drive;
        height_ok && lateral_ok && drive_ok
    }
}

/// Keeps running while the body is still moving. Useful to wait out the
/// settling phase; note the very first cycles may legitimately read zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroVelocity {
    pub epsilon: f64,
}

impl Default for ZeroVelocity {
    fn default() -> Self {
        Self { epsilon: 1e-5 }
    }
}

impl RunCondition for ZeroVelocity {
    fn keep_running(&self, _time_ms: i64, pose: &Pose) -> bool {
        let speed = pose.speed();
        log::trace!("total velocity: {:.6}", speed);
        speed > self.epsilon
    }
}

/// Keeps running while the body clears the ground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinHeight {
    pub min_z: f64,
}

impl Default for MinHeight {
    fn default() -> Self {
        Self { min_z: 0.04 }
    }
}

impl RunCondition for MinHeight {
    fn keep_running(&self, _time_ms: i64, pose: &Pose) -> bool {
        pose.position.z > self.min_z
    }
}
