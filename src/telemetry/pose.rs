use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Body snapshot: position, orientation, linear and angular velocity
// ---------------------------------------------------------------------------

/// One telemetry snapshot of the robot body, world frame.
/// Read fresh every cycle and dropped once the cycle is done.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Vector3<f64>,     // m   [x = drive axis, y = lateral, z = up]
    pub orientation: Vector3<f64>,  // rad [roll, pitch, yaw]
    pub lin_vel: Vector3<f64>,      // m/s
    pub ang_vel: Vector3<f64>,      // rad/s [droll, dpitch, dyaw]
}

impl Pose {
    /// Upright pose resting at the given position, no motion.
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            ..Self::default()
        }
    }

    /// Same pose with the pitch angle replaced.
    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.orientation.y = pitch;
        self
    }

    /// Same pose with the linear velocity replaced.
    pub fn with_lin_vel(mut self, lin_vel: Vector3<f64>) -> Self {
        self.lin_vel = lin_vel;
        self
    }

    pub fn roll(&self) -> f64 {
        self.orientation.x
    }

    /// Rotation about the lateral axis. The balance variable.
    pub fn pitch(&self) -> f64 {
        self.orientation.y
    }

    pub fn yaw(&self) -> f64 {
        self.orientation.z
    }

    /// Total linear speed, m/s.
    pub fn speed(&self) -> f64 {
        self.lin_vel.norm()
    }
}

// ---------------------------------------------------------------------------
// Wheel command output
// ---------------------------------------------------------------------------

/// Target angular velocities for the two wheel joints, rad/s.
/// A `None` wheel is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelCommand {
    pub left: Option<f64>,
    pub right: Option<f64>,
}

impl WheelCommand {
    /// Both wheels driven at the same velocity.
    pub fn symmetric(value: f64) -> Self {
        Self { left: Some(value), right: Some(value) }
    }
}
