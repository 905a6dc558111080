//! Feedback controller sizing backfill windows.
//!
//! The provider enforces an implicit volume-per-request ceiling; fixed
//! windows either waste requests or risk truncation. The regulator
//! integrates (target - observed) so thin windows widen and heavy windows
//! shrink, saturating at the configured bounds on every step.

/// Gains, target and bounds of the window regulator.
#[derive(Debug, Clone, Copy)]
pub struct RegulatorConfig {
    pub gain_proportional: f64,
    pub gain_integral: f64,
    pub gain_derivative: f64,
    /// Records one window should yield.
    pub target: f64,
    /// Window bounds, in days.
    pub min_days: f64,
    pub max_days: f64,
    /// First window before any feedback.
    pub initial_days: f64,
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        Self {
            gain_proportional: 0.0,
            gain_integral: 0.003,
            gain_derivative: 0.0,
            target: 10_000.0,
            min_days: 10.0,
            max_days: 2_000.0,
            initial_days: 15.0,
        }
    }
}

#[derive(Debug)]
pub struct WindowRegulator {
    config: RegulatorConfig,
    integral: f64,
    previous_error: Option<f64>,
}

impl WindowRegulator {
    pub fn new(config: RegulatorConfig) -> Self {
        Self {
            config,
            // Seeding the integral with the initial window keeps the output
            // there while observations sit on target.
            integral: config.initial_days,
            previous_error: None,
        }
    }

    /// Current window size in days, without feeding new feedback.
    pub fn window_days(&self) -> f64 {
        self.clamp(self.integral)
    }

    /// Feed one completed window's record count; returns the next window
    /// size in days.
    pub fn update(&mut self, observed: usize) -> f64 {
        let error = self.config.target - observed as f64;
        self.integral = self.clamp(self.integral + self.config.gain_integral * error);
        let derivative = self
            .previous_error
            .map(|previous| error - previous)
            .unwrap_or(0.0);
        self.previous_error = Some(error);
        let output = self.config.gain_proportional * error
            + self.integral
            + self.config.gain_derivative * derivative;
        self.clamp(output)
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.config.min_days, self.config.max_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_target_counts_leave_the_window_unchanged() {
        let mut regulator = WindowRegulator::new(RegulatorConfig::default());
        assert_eq!(regulator.window_days(), 15.0);
        for _ in 0..50 {
            assert_eq!(regulator.update(10_000), 15.0);
        }
    }

    #[test]
    fn empty_windows_widen_strictly_until_the_upper_bound() {
        let mut regulator = WindowRegulator::new(RegulatorConfig::default());
        let mut previous = regulator.window_days();
        loop {
            let next = regulator.update(0);
            if next == 2_000.0 {
                break;
            }
            assert!(next > previous, "expected strict growth, got {next} after {previous}");
            previous = next;
        }
        // Clamped: further empty windows stay at the bound.
        assert_eq!(regulator.update(0), 2_000.0);
    }

    #[test]
    fn overweight_windows_shrink_until_the_lower_bound() {
        let mut regulator = WindowRegulator::new(RegulatorConfig::default());
        let mut previous = regulator.window_days();
        loop {
            let next = regulator.update(100_000);
            if next == 10.0 {
                break;
            }
            assert!(next < previous, "expected strict shrink, got {next} after {previous}");
            previous = next;
        }
        assert_eq!(regulator.update(100_000), 10.0);
    }

    #[test]
    fn integration_accumulates_across_mixed_feedback() {
        let mut regulator = WindowRegulator::new(RegulatorConfig::default());
        // 5000 below target then 5000 above cancel out.
        regulator.update(5_000);
        let back = regulator.update(15_000);
        assert!((back - 15.0).abs() < 1e-9);
    }
}
