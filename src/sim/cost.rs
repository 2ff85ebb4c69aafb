use std::f64::consts::FRAC_PI_2;

// ---------------------------------------------------------------------------
// Run cost
// ---------------------------------------------------------------------------

/// Default weight on drive-axis drift in the per-cycle cost.
pub const DEFAULT_POSITION_WEIGHT: f64 = FRAC_PI_2;

/// Sums `e^2 + (k*x)^2` over the completed cycles of a run, where `e` is the
/// pitch error and `x` the drive-axis position.
#[derive(Debug, Clone, PartialEq)]
pub struct CostAccumulator {
    pub position_weight: f64,
    total: f64,
}

impl CostAccumulator {
    pub fn new(position_weight: f64) -> Self {
        Self { position_weight, total: 0.0 }
    }

    /// Add one cycle and return its contribution.
    pub fn add(&mut self, pitch_error: f64, x: f64) -> f64 {
        let drift = self.position_weight * x;
        let cycle = pitch_error.powi(2) + drift.powi(2);
        self.total += cycle;
        cycle
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

impl Default for CostAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_POSITION_WEIGHT)
    }
}

/// Log-scaled, time-normalised run score: `log10(cost / max(t, 1)^2)`.
/// Lower is better.
///
/// A zero cost is raised to `f64::MIN_POSITIVE`, so a perfect run scores
/// very low but finite instead of negative infinity. A NaN cost stays NaN.
pub fn score(cost: f64, final_time_ms: i64) -> f64 {
    let t = final_time_ms.max(1) as f64;
    let cost = if cost == 0.0 { f64::MIN_POSITIVE } else { cost };
    (cost / (t * t)).log10()
}
