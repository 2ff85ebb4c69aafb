use std::thread;
use std::time::Duration;

use crate::config::SegwayConfig;
use crate::control::BalanceController;
use crate::error::{SegwayError, SegwayResult};
use crate::telemetry::{Handle, OpMode, Pose, Reply, ReturnCode, SimClient, WheelCommand};
use super::condition::RunCondition;
use super::cost::{self, CostAccumulator};

// ---------------------------------------------------------------------------
// Run bookkeeping
// ---------------------------------------------------------------------------

/// State carried from one cycle to the next.
#[derive(Debug, Clone)]
pub struct RunState {
    prev_time_ms: i64,
    cost: CostAccumulator,
    cycles: u64,
    skipped: u64,
}

impl RunState {
    pub fn new(position_weight: f64) -> Self {
        Self {
            prev_time_ms: 0,
            cost: CostAccumulator::new(position_weight),
            cycles: 0,
            skipped: 0,
        }
    }

    /// Simulation time of the last completed cycle, ms.
    pub fn time_ms(&self) -> i64 {
        self.prev_time_ms
    }

    pub fn cost(&self) -> f64 {
        self.cost.total()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn into_result(self) -> RunResult {
        RunResult {
            cost: self.cost.total(),
            final_time_ms: self.prev_time_ms,
            cycles: self.cycles,
            skipped: self.skipped,
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunResult {
    pub cost: f64,
    pub final_time_ms: i64,
    pub cycles: u64,
    pub skipped: u64,
}

impl RunResult {
    /// `log10(cost / max(t, 1)^2)`, see [`cost::score`].
    pub fn score(&self) -> f64 {
        cost::score(self.cost, self.final_time_ms)
    }

    /// `(score, final_time_ms)`.
    pub fn into_tuple(self) -> (f64, i64) {
        (self.score(), self.final_time_ms)
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cycle {
    /// A read came back above the error threshold. Nothing was updated.
    TelemetryError(ReturnCode),
    /// The simulation clock has not advanced. Nothing was updated.
    Stale,
    /// Controller stepped, wheels commanded, cost accumulated.
    Completed { time_ms: i64, pose: Pose, control: f64 },
}

// ---------------------------------------------------------------------------
// Control loop
// ---------------------------------------------------------------------------

/// Balance control loop around one simulator connection.
pub struct Segway<C: SimClient> {
    client: C,
    config: SegwayConfig,
    body: Handle,
    left_motor: Handle,
    right_motor: Handle,
    setup_errors: Vec<SegwayError>,
}

impl<C: SimClient> Segway<C> {
    /// Resolve the body and both motors, then zero the wheels.
    ///
    /// Resolution failures are logged and kept in [`setup_errors`](Self::setup_errors);
    /// the loop still runs with whatever handles came back.
    pub fn new(client: C, config: SegwayConfig) -> Self {
        let mut segway = Self {
            client,
            config,
            body: Handle::default(),
            left_motor: Handle::default(),
            right_motor: Handle::default(),
            setup_errors: Vec::new(),
        };
        segway.setup_body();
        segway.setup_motors();
        segway
    }

    pub fn setup_body(&mut self) {
        let name = self.config.body.clone();
        self.body = self.resolve(&name);
    }

    pub fn setup_motors(&mut self) {
        let left = self.config.left_motor.clone();
        let right = self.config.right_motor.clone();
        self.left_motor = self.resolve(&left);
        self.right_motor = self.resolve(&right);

        if let Err(err) = self.send_target_velocities(WheelCommand::symmetric(0.0), OpMode::Blocking) {
            log::error!("{err}");
        }
    }

    fn resolve(&mut self, name: &str) -> Handle {
        let reply = self.client.object_handle(name, OpMode::Blocking);
        if !reply.code.is_ok() {
            let err = SegwayError::Resolve { name: name.to_string(), code: reply.code };
            log::error!("{err}");
            self.setup_errors.push(err);
        }
        reply.value
    }

    pub fn setup_errors(&self) -> &[SegwayError] {
        &self.setup_errors
    }

    pub fn config(&self) -> &SegwayConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    // -----------------------------------------------------------------------
    // Actuation
    // -----------------------------------------------------------------------

    /// Write both wheel targets so they land in the same physics step.
    /// The pause and resume codes count toward the reported failure.
    pub fn set_target_velocities(&mut self, cmd: WheelCommand) -> SegwayResult<()> {
        let paused = self.pause(true);
        let written = self.write_target_velocities(cmd, OpMode::Streaming);
        let resumed = self.pause(false);
        self.check_actuation(paused.worst(written).worst(resumed))
    }

    fn send_target_velocities(&mut self, cmd: WheelCommand, mode: OpMode) -> SegwayResult<()> {
        let code = self.write_target_velocities(cmd, mode);
        self.check_actuation(code)
    }

    fn check_actuation(&self, code: ReturnCode) -> SegwayResult<()> {
        if code.exceeds(self.config.error_threshold) {
            return Err(SegwayError::Actuation { code });
        }
        Ok(())
    }

    fn write_target_velocities(&mut self, cmd: WheelCommand, mode: OpMode) -> ReturnCode {
        let mut code = ReturnCode::OK;
        if let Some(v) = cmd.left {
            code = code.worst(self.client.set_joint_target_velocity(self.left_motor, v, mode));
        }
        if let Some(v) = cmd.right {
            code = code.worst(self.client.set_joint_target_velocity(self.right_motor, v, mode));
        }
        code
    }

    fn pause(&mut self, paused: bool) -> ReturnCode {
        let code = self.client.pause_communication(paused);
        if !code.is_ok() {
            log::debug!("pause_communication({paused}) returned code {code}");
        }
        code
    }

    // -----------------------------------------------------------------------
    // Telemetry
    // -----------------------------------------------------------------------

    /// Ask the simulator to push orientation, velocity and position every step.
    pub fn start_streaming(&mut self) {
        self.client.object_orientation(self.body, OpMode::Streaming);
        self.client.object_velocity(self.body, OpMode::Streaming);
        self.client.object_position(self.body, OpMode::Streaming);
    }

    /// Read the latest buffered pose as one batch. The returned code is the
    /// worst of the three reads and the pause/resume pair around them.
    pub fn read_pose(&mut self) -> Reply<Pose> {
        let paused = self.pause(true);
        let rot = self.client.object_orientation(self.body, OpMode::Buffer);
        let vel = self.client.object_velocity(self.body, OpMode::Buffer);
        let pos = self.client.object_position(self.body, OpMode::Buffer);
        let resumed = self.pause(false);

        let (lin_vel, ang_vel) = vel.value;
        Reply::with_code(
            rot.code.worst(vel.code).worst(pos.code).worst(paused).worst(resumed),
            Pose { position: pos.value, orientation: rot.value, lin_vel, ang_vel },
        )
    }

    // -----------------------------------------------------------------------
    // Cycle
    // -----------------------------------------------------------------------

    /// Run one poll-compute-act cycle.
    ///
    /// Stale or failed telemetry leaves `state` and `controller` untouched and
    /// sends nothing to the wheels.
    pub fn step(&mut self, state: &mut RunState, controller: &mut dyn BalanceController) -> Cycle {
        let reply = self.read_pose();
        if reply.code.exceeds(self.config.error_threshold) {
            log::debug!("no data right now (code {})", reply.code);
            state.skipped += 1;
            return Cycle::TelemetryError(reply.code);
        }

        let now = self.client.last_cmd_time();
        if now <= state.prev_time_ms {
            state.skipped += 1;
            return Cycle::Stale;
        }
        let dt = (now - state.prev_time_ms) as f64;
        state.prev_time_ms = now;

        let pose = reply.value;
        let pitch = pose.pitch();
        let control = controller.control(pitch, dt);
        if let Err(err) = self.set_target_velocities(WheelCommand::symmetric(control)) {
            log::error!("{err}");
        }

        let error = controller.reference() - pitch;
        let cycle_cost = state.cost.add(error, pose.position.x);
        state.cycles += 1;
        log::trace!(
            "t={}ms pitch={:.5} control={:.5} cost+={:.6}",
            now,
            pitch,
            control,
            cycle_cost
        );

        Cycle::Completed { time_ms: now, pose, control }
    }

    fn wait(&self) {
        match self.config.poll_interval_ms {
            0 => thread::yield_now(),
            ms => thread::sleep(Duration::from_millis(ms)),
        }
    }

    /// Drive the loop until `condition` says stop or the connection drops.
    pub fn run(
        &mut self,
        controller: &mut dyn BalanceController,
        condition: &dyn RunCondition,
    ) -> RunResult {
        self.start_streaming();
        log::info!("balance run started ({} controller)", controller.name());

        let mut state = RunState::new(self.config.position_weight);
        while self.client.is_connected() {
            match self.step(&mut state, controller) {
                Cycle::Completed { time_ms, pose, .. } => {
                    if !condition.keep_running(time_ms, &pose) {
                        log::debug!("run condition ended the run at t={}ms", time_ms);
                        break;
                    }
                }
                Cycle::Stale | Cycle::TelemetryError(_) => self.wait(),
            }
        }

        let result = state.into_result();
        log::info!(
            "balance run finished: t={}ms cycles={} skipped={} cost={:.6} score={:.4}",
            result.final_time_ms,
            result.cycles,
            result.skipped,
            result.cost,
            result.score()
        );
        result
    }

    /// [`run`](Self::run) with the configured simulation envelope.
    pub fn run_default(&mut self, controller: &mut dyn BalanceController) -> RunResult {
        let envelope = self.config.envelope;
        self.run(controller, &envelope)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Pid;
    use crate::sim::replay::{Call, Frame, ReplayClient, Signal};
    use approx::assert_relative_eq;

    fn config() -> SegwayConfig {
        SegwayConfig { poll_interval_ms: 0, ..SegwayConfig::default() }
    }

    fn upright(x: f64, pitch: f64) -> Pose {
        Pose::at(x, 0.0, 0.5).with_pitch(pitch)
    }

    fn segway(frames: Vec<Frame>) -> Segway<ReplayClient> {
        Segway::new(ReplayClient::new(frames), config())
    }

    #[test]
    fn setup_zeroes_wheels_with_blocking_writes() {
        let s = segway(vec![]);
        assert!(s.setup_errors().is_empty());
        let left = s.client().handle_of("leftMotor").unwrap();
        let right = s.client().handle_of("rightMotor").unwrap();
        assert_eq!(
            s.client().velocity_writes(),
            vec![(left, 0.0, OpMode::Blocking), (right, 0.0, OpMode::Blocking)]
        );
    }

    #[test]
    fn missing_motor_is_reported_but_not_fatal() {
        let client = ReplayClient::new(vec![Frame::new(10, upright(0.0, 0.1))]).without_object("rightMotor");
        let mut s = Segway::new(client, config());
        assert_eq!(s.setup_errors().len(), 1);
        assert!(matches!(
            &s.setup_errors()[0],
            SegwayError::Resolve { name, .. } if name == "rightMotor"
        ));

        let result = s.run_default(&mut Pid::new(1.0, 0.0, 0.0));
        assert_eq!(result.cycles, 1);
    }

    #[test]
    fn completed_cycle_commands_both_wheels_in_one_batch() {
        let mut s = segway(vec![Frame::new(50, upright(0.0, 0.2))]);
        let mut pid = Pid::new(2.0, 0.0, 0.0);
        let mut state = RunState::new(1.0);
        let before = s.client().calls().len();

        let cycle = s.step(&mut state, &mut pid);
        let control = match cycle {
            Cycle::Completed { control, time_ms, .. } => {
                assert_eq!(time_ms, 50);
                control
            }
            other => panic!("unexpected cycle: {other:?}"),
        };
        assert_relative_eq!(control, -0.4);

        let calls = &s.client().calls()[before..];
        assert_eq!(
            calls,
            &[
                Call::Pause(true),
                Call::Pause(false),
                Call::Pause(true),
                Call::SetVelocity { joint: Handle(2), velocity: control, mode: OpMode::Streaming },
                Call::SetVelocity { joint: Handle(3), velocity: control, mode: OpMode::Streaming },
                Call::Pause(false),
            ]
        );
    }

    #[test]
    fn stale_clock_is_an_idempotent_skip() {
        let mut s = segway(vec![
            Frame::new(50, upright(0.1, 0.2)),
            Frame::new(50, upright(0.5, -0.3)),
        ]);
        let mut pid = Pid::new(1.0, 1.0, 1.0);
        let mut state = RunState::new(1.0);

        assert!(matches!(s.step(&mut state, &mut pid), Cycle::Completed { .. }));
        let (integral, prev_error, cost) = (pid.integral(), pid.prev_error(), state.cost());
        let writes = s.client().velocity_writes().len();

        assert_eq!(s.step(&mut state, &mut pid), Cycle::Stale);
        assert_eq!(pid.integral(), integral);
        assert_eq!(pid.prev_error(), prev_error);
        assert_eq!(state.cost(), cost);
        assert_eq!(state.cycles(), 1);
        assert_eq!(state.skipped(), 1);
        assert_eq!(s.client().velocity_writes().len(), writes);
    }

    #[test]
    fn telemetry_error_skips_controller_and_actuation() {
        let mut s = segway(vec![Frame::failed(50, upright(0.0, 0.2), ReturnCode(3))]);
        let mut pid = Pid::new(1.0, 1.0, 1.0);
        let mut state = RunState::new(1.0);
        let writes = s.client().velocity_writes().len();

        assert_eq!(s.step(&mut state, &mut pid), Cycle::TelemetryError(ReturnCode(3)));
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.prev_error(), 0.0);
        assert_eq!(state.cost(), 0.0);
        assert_eq!(state.time_ms(), 0);
        assert_eq!(s.client().velocity_writes().len(), writes);
    }

    #[test]
    fn no_value_code_is_not_a_failure() {
        let mut s = segway(vec![Frame::failed(50, upright(0.0, 0.2), ReturnCode::NO_VALUE)]);
        let mut state = RunState::new(1.0);
        let cycle = s.step(&mut state, &mut Pid::new(1.0, 0.0, 0.0));
        assert!(matches!(cycle, Cycle::Completed { .. }));
    }

    #[test]
    fn dt_is_clock_difference() {
        let mut s = segway(vec![Frame::new(20, upright(0.0, -1.0)), Frame::new(70, upright(0.0, -1.0))]);
        let mut pid = Pid::new(0.0, 1.0, 0.0);
        let mut state = RunState::new(1.0);
        s.step(&mut state, &mut pid);
        s.step(&mut state, &mut pid);
        assert_relative_eq!(pid.integral(), 70.0);
    }

    #[test]
    fn actuation_failure_does_not_stop_the_loop() {
        let mut client = ReplayClient::new(vec![
            Frame::new(10, upright(0.0, 0.1)),
            Frame::new(20, upright(0.0, 0.1)),
        ]);
        client.write_code = ReturnCode(4);
        let mut s = Segway::new(client, config());

        let result = s.run_default(&mut Pid::new(1.0, 0.0, 0.0));
        assert_eq!(result.cycles, 2);
        assert_relative_eq!(result.cost, 0.02, epsilon = 1e-12);
        assert!(s.set_target_velocities(WheelCommand::symmetric(1.0)).is_err());
    }

    #[test]
    fn failed_pause_counts_as_batch_failure() {
        let mut client = ReplayClient::new(vec![Frame::new(50, upright(0.0, 0.2))]);
        client.pause_code = ReturnCode(3);
        let mut s = Segway::new(client, config());
        let mut pid = Pid::new(1.0, 1.0, 1.0);
        let mut state = RunState::new(1.0);

        assert_eq!(s.step(&mut state, &mut pid), Cycle::TelemetryError(ReturnCode(3)));
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(
            s.set_target_velocities(WheelCommand::symmetric(1.0)),
            Err(SegwayError::Actuation { code: ReturnCode(3) })
        );
    }

    #[test]
    fn no_value_pause_code_is_tolerated() {
        let mut client = ReplayClient::new(vec![Frame::new(50, upright(0.0, 0.2))]);
        client.pause_code = ReturnCode::NO_VALUE;
        let mut s = Segway::new(client, config());
        let mut state = RunState::new(1.0);

        assert!(matches!(s.step(&mut state, &mut Pid::new(1.0, 0.0, 0.0)), Cycle::Completed { .. }));
        assert!(s.set_target_velocities(WheelCommand::symmetric(1.0)).is_ok());
    }

    #[test]
    fn nan_pitch_yields_nan_score() {
        let mut s = segway(vec![
            Frame::new(50, upright(0.0, 0.1)),
            Frame::new(100, upright(0.0, f64::NAN)),
        ]);
        let result = s.run_default(&mut Pid::new(1.0, 0.0, 0.0));
        assert_eq!(result.cycles, 2);
        assert!(result.cost.is_nan());
        assert!(result.score().is_nan());
    }

    #[test]
    fn one_sided_command_writes_one_wheel() {
        let mut s = segway(vec![]);
        let before = s.client().velocity_writes().len();
        s.set_target_velocities(WheelCommand { left: None, right: Some(0.7) }).unwrap();
        let writes = &s.client().velocity_writes()[before..];
        assert_eq!(writes, &[(Handle(3), 0.7, OpMode::Streaming)]);
    }

    #[test]
    fn run_requests_streaming_first() {
        let mut s = segway(vec![Frame::new(10, upright(0.0, 0.0))]);
        s.run_default(&mut Pid::new(1.0, 0.0, 0.0));
        let streams: Vec<_> = s
            .client()
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Stream(_)))
            .copied()
            .collect();
        assert_eq!(
            streams,
            vec![
                Call::Stream(Signal::Orientation),
                Call::Stream(Signal::Velocity),
                Call::Stream(Signal::Position),
            ]
        );
    }

    #[test]
    fn condition_ends_run_before_frames_run_out() {
        let frames = (1..=10).map(|i| Frame::new(i * 100, upright(0.0, 0.0))).collect();
        let mut s = segway(frames);
        let stop_at_300 = |t: i64, _: &Pose| t < 300;
        let result = s.run(&mut Pid::new(1.0, 0.0, 0.0), &stop_at_300);
        assert_eq!(result.final_time_ms, 300);
        assert_eq!(result.cycles, 3);
        assert_eq!(s.client().frames_served(), 3);
    }

    #[test]
    fn envelope_violation_after_grace_ends_run() {
        let mut s = segway(vec![
            Frame::new(50, Pose::at(0.0, 0.0, 0.01)),
            Frame::new(150, Pose::at(0.0, 0.0, 0.01)),
            Frame::new(250, Pose::at(0.0, 0.0, 0.5)),
        ]);
        let result = s.run_default(&mut Pid::new(1.0, 0.0, 0.0));
        assert_eq!(result.final_time_ms, 150);
        assert_eq!(result.cycles, 2);
    }

    #[test]
    fn cost_uses_reference_and_drive_position() {
        let mut s = segway(vec![Frame::new(10, upright(0.5, 0.3))]);
        let mut pid = Pid::new(1.0, 0.0, 0.0).with_reference(0.1);
        let result = s.run_default(&mut pid);
        let expected = (0.1_f64 - 0.3).powi(2) + (std::f64::consts::FRAC_PI_2 * 0.5).powi(2);
        assert_relative_eq!(result.cost, expected, epsilon = 1e-12);
    }
}
