use serde::Deserialize;

use super::controller::BalanceController;

// ---------------------------------------------------------------------------
// Gains
// ---------------------------------------------------------------------------

/// PID tuning, as read from config.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Setpoint, rad. 0 = upright.
    pub reference: f64,
    /// Symmetric clamp on the accumulated integral. Off unless set.
    pub integral_limit: Option<f64>,
}

impl Default for PidGains {
    fn default() -> Self {
        Self { kp: 1.0, ki: 0.0, kd: 0.0, reference: 0.0, integral_limit: None }
    }
}

// ---------------------------------------------------------------------------
// PID Controller (single axis)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Pid {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub reference: f64,
    pub integral_limit: Option<f64>,
    integral: f64,
    prev_error: f64,
}

impl Pid {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            reference: 0.0,
            integral_limit: None,
            integral: 0.0,
            prev_error: 0.0,
        }
    }

    pub fn from_gains(gains: &PidGains) -> Self {
        Self {
            reference: gains.reference,
            integral_limit: gains.integral_limit,
            ..Self::new(gains.kp, gains.ki, gains.kd)
        }
    }

    pub fn with_reference(mut self, reference: f64) -> Self {
        self.reference = reference;
        self
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn prev_error(&self) -> f64 {
        self.prev_error
    }

    /// One controller step. `dt` is in the simulation clock's unit.
    ///
    /// A non-positive `dt` carries no timing information: the output is the
    /// proportional and integral terms on the existing state, and nothing is
    /// stored.
    pub fn update(&mut self, measurement: f64, dt: f64) -> f64 {
        let error = self.reference - measurement;
        if dt <= 0.0 {
            return self.kp * error + self.ki * self.integral;
        }

        self.integral += error * dt;
        if let Some(limit) = self.integral_limit {
            let limit = limit.abs();
            self.integral = self.integral.clamp(-limit, limit);
        }
        let derivative = (error - self.prev_error) / dt;
        self.prev_error = error;
        self.kp * error + self.ki * self.integral + self.kd * derivative
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }
}

impl BalanceController for Pid {
    fn control(&mut self, measurement: f64, dt: f64) -> f64 {
        self.update(measurement, dt)
    }

    fn reference(&self) -> f64 {
        self.reference
    }

    fn set_reference(&mut self, reference: f64) {
        self.reference = reference;
    }

    fn reset(&mut self) {
        Pid::reset(self);
    }

    fn name(&self) -> &str {
        "Pid"
    }
}
