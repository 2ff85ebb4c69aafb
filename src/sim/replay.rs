use std::collections::HashMap;

use nalgebra::Vector3;

use crate::telemetry::{Handle, OpMode, Pose, Reply, ReturnCode, SimClient};

/// Code returned when a name does not resolve (simulator "remote error" flag).
pub const UNKNOWN_OBJECT: ReturnCode = ReturnCode(8);

// ---------------------------------------------------------------------------
// Scripted telemetry
// ---------------------------------------------------------------------------

/// One simulator frame as seen through the buffered reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub time_ms: i64,
    pub pose: Pose,
    /// Codes for the orientation, velocity and position reads.
    pub read_codes: [ReturnCode; 3],
}

impl Frame {
    pub fn new(time_ms: i64, pose: Pose) -> Self {
        Self { time_ms, pose, read_codes: [ReturnCode::OK; 3] }
    }

    /// Frame whose position read reports `code`. The other reads succeed.
    pub fn failed(time_ms: i64, pose: Pose, code: ReturnCode) -> Self {
        Self { time_ms, pose, read_codes: [ReturnCode::OK, ReturnCode::OK, code] }
    }
}

/// Streamed signals, as requested at run start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Orientation,
    Velocity,
    Position,
}

/// Outgoing calls recorded by [`ReplayClient`], in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call {
    Pause(bool),
    SetVelocity { joint: Handle, velocity: f64, mode: OpMode },
    Stream(Signal),
}

/// In-process [`SimClient`] that serves a fixed list of frames and records
/// every write.
///
/// Each buffered orientation read moves to the next frame; the remaining reads
/// of the cycle and `last_cmd_time` see that same frame. Once every frame has
/// been served the connection reports as closed.
#[derive(Debug, Clone)]
pub struct ReplayClient {
    frames: Vec<Frame>,
    next: usize,
    current: Option<Frame>,
    objects: HashMap<String, Handle>,
    /// Code returned by every joint velocity write.
    pub write_code: ReturnCode,
    /// Code returned by every pause/resume.
    pub pause_code: ReturnCode,
    calls: Vec<Call>,
}

impl ReplayClient {
    /// Scene with `body`, `leftMotor` and `rightMotor`.
    pub fn new(frames: Vec<Frame>) -> Self {
        let objects = [("body", 1), ("leftMotor", 2), ("rightMotor", 3)]
            .into_iter()
            .map(|(name, id)| (name.to_string(), Handle(id)))
            .collect();
        Self {
            frames,
            next: 0,
            current: None,
            objects,
            write_code: ReturnCode::OK,
            pause_code: ReturnCode::OK,
            calls: Vec::new(),
        }
    }

    /// Drop an object from the scene so it no longer resolves.
    pub fn without_object(mut self, name: &str) -> Self {
        self.objects.remove(name);
        self
    }

    pub fn handle_of(&self, name: &str) -> Option<Handle> {
        self.objects.get(name).copied()
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Recorded wheel writes as `(joint, velocity, mode)`.
    pub fn velocity_writes(&self) -> Vec<(Handle, f64, OpMode)> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                Call::SetVelocity { joint, velocity, mode } => Some((joint, velocity, mode)),
                _ => None,
            })
            .collect()
    }

    pub fn frames_served(&self) -> usize {
        self.next
    }

    fn frame(&self) -> Frame {
        self.current.unwrap_or_else(|| Frame {
            time_ms: 0,
            pose: Pose::default(),
            read_codes: [ReturnCode::NO_VALUE; 3],
        })
    }
}

impl SimClient for ReplayClient {
    fn object_handle(&mut self, name: &str, _mode: OpMode) -> Reply<Handle> {
        match self.objects.get(name) {
            Some(&h) => Reply::ok(h),
            None => Reply::with_code(UNKNOWN_OBJECT, Handle(0)),
        }
    }

    fn object_orientation(&mut self, _handle: Handle, mode: OpMode) -> Reply<Vector3<f64>> {
        match mode {
            OpMode::Streaming => {
                self.calls.push(Call::Stream(Signal::Orientation));
                return Reply::with_code(ReturnCode::NO_VALUE, Vector3::zeros());
            }
            OpMode::Buffer => {
                if let Some(frame) = self.frames.get(self.next) {
                    self.current = Some(*frame);
                    self.next += 1;
                }
            }
            OpMode::Blocking => {}
        }
        let f = self.frame();
        Reply::with_code(f.read_codes[0], f.pose.orientation)
    }

    fn object_velocity(
        &mut self,
        _handle: Handle,
        mode: OpMode,
    ) -> Reply<(Vector3<f64>, Vector3<f64>)> {
        if mode == OpMode::Streaming {
            self.calls.push(Call::Stream(Signal::Velocity));
            return Reply::with_code(ReturnCode::NO_VALUE, (Vector3::zeros(), Vector3::zeros()));
        }
        let f = self.frame();
        Reply::with_code(f.read_codes[1], (f.pose.lin_vel, f.pose.ang_vel))
    }

    fn object_position(&mut self, _handle: Handle, mode: OpMode) -> Reply<Vector3<f64>> {
        if mode == OpMode::Streaming {
            self.calls.push(Call::Stream(Signal::Position));
            return Reply::with_code(ReturnCode::NO_VALUE, Vector3::zeros());
        }
        let f = self.frame();
        Reply::with_code(f.read_codes[2], f.pose.position)
    }

    fn set_joint_target_velocity(&mut self, joint: Handle, velocity: f64, mode: OpMode) -> ReturnCode {
        self.calls.push(Call::SetVelocity { joint, velocity, mode });
        self.write_code
    }

    fn pause_communication(&mut self, paused: bool) -> ReturnCode {
        self.calls.push(Call::Pause(paused));
        self.pause_code
    }

    fn last_cmd_time(&mut self) -> i64 {
        self.current.map_or(0, |f| f.time_ms)
    }

    fn connection_id(&mut self) -> i32 {
        if self.next < self.frames.len() {
            0
        } else {
            -1
        }
    }
}
