use std::fmt;

use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Return codes
// ---------------------------------------------------------------------------

/// Per-call status reported by the simulator. Zero means success.
///
/// Small values are informational (1 = no value buffered yet); anything above
/// the configured threshold is a hard failure for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ReturnCode(pub i32);

impl ReturnCode {
    pub const OK: ReturnCode = ReturnCode(0);
    pub const NO_VALUE: ReturnCode = ReturnCode(1);

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// True when the code is strictly above `threshold`.
    pub fn exceeds(self, threshold: i32) -> bool {
        self.0 > threshold
    }

    /// The worse of two codes. Used to combine the sub-calls of one logical
    /// operation so that neither result masks the other.
    pub fn worst(self, other: ReturnCode) -> ReturnCode {
        self.max(other)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value read from the simulator, paired with the status of the read.
/// The value is whatever the transport handed back, valid only when `code`
/// is below the error threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reply<T> {
    pub code: ReturnCode,
    pub value: T,
}

impl<T> Reply<T> {
    pub fn ok(value: T) -> Self {
        Self { code: ReturnCode::OK, value }
    }

    pub fn with_code(code: ReturnCode, value: T) -> Self {
        Self { code, value }
    }
}

/// Opaque scene object handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Handle(pub i32);

/// How a call is carried out by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    /// Send and wait for the simulator to confirm.
    Blocking,
    /// Fire and forget; for reads, also asks the simulator to keep pushing
    /// this value every step.
    Streaming,
    /// Return the most recently pushed value without waiting.
    Buffer,
}

// ---------------------------------------------------------------------------
// Simulator collaborator
// ---------------------------------------------------------------------------

/// The simulator connection the control loop drives.
///
/// Implementors own the transport. All poses are reported in the world frame.
pub trait SimClient {
    /// Resolve a scene object by name.
    fn object_handle(&mut self, name: &str, mode: OpMode) -> Reply<Handle>;

    /// Euler angles (roll, pitch, yaw), rad.
    fn object_orientation(&mut self, handle: Handle, mode: OpMode) -> Reply<Vector3<f64>>;

    /// Linear (m/s) and angular (rad/s) velocity.
    fn object_velocity(
        &mut self,
        handle: Handle,
        mode: OpMode,
    ) -> Reply<(Vector3<f64>, Vector3<f64>)>;

    /// Position, m.
    fn object_position(&mut self, handle: Handle, mode: OpMode) -> Reply<Vector3<f64>>;

    fn set_joint_target_velocity(&mut self, joint: Handle, velocity: f64, mode: OpMode) -> ReturnCode;

    /// While paused, outgoing commands are queued and sent together on resume.
    fn pause_communication(&mut self, paused: bool) -> ReturnCode;

    /// Simulation time of the last command the simulator executed, ms.
    fn last_cmd_time(&mut self) -> i64;

    /// Connection id, `-1` once the link is gone.
    fn connection_id(&mut self) -> i32;

    fn is_connected(&mut self) -> bool {
        self.connection_id() != -1
    }
}
