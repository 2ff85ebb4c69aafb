/// Trait for balance controllers.
///
/// Implement this to plug a custom pitch controller into the control loop.
pub trait BalanceController {
    /// Compute the symmetric wheel velocity from the measured pitch and the
    /// time elapsed since the previous call.
    fn control(&mut self, measurement: f64, dt: f64) -> f64;

    /// Current setpoint. The loop reads it to score pitch error.
    fn reference(&self) -> f64;

    fn set_reference(&mut self, reference: f64);

    /// Reset controller internal state (e.g., PID integrators).
    fn reset(&mut self) {}

    /// Human-readable name for logging/display.
    fn name(&self) -> &str {
        "unnamed"
    }
}
