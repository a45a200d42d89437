// src/motion/pid.rs - Single-axis PID controller
use crate::config::PidAxisConfig;

/// Substituted for a non-positive or non-finite `dt`.
pub const DT_EPSILON: f64 = 1e-3;

/// PID loop for one planar axis.
///
/// Only the output is clamped. The integral accumulates without bound, so a
/// sustained error with `ki != 0` winds it up; tune `ki` accordingly.
#[derive(Debug, Clone)]
pub struct AxisPid {
    /// PID parameters
    kp: f64,
    ki: f64,
    kd: f64,
    clamp: Option<(f64, f64)>,

    /// PID state
    integral: f64,
    previous_error: f64,
}

impl AxisPid {
    pub fn new(kp: f64, ki: f64, kd: f64, clamp: Option<(f64, f64)>) -> Self {
        Self {
            kp,
            ki,
            kd,
            clamp,
            integral: 0.0,
            previous_error: 0.0,
        }
    }

    pub fn from_config(config: &PidAxisConfig) -> Self {
        Self::new(config.kp, config.ki, config.kd, Some(config.clamp))
    }

    /// Advance the loop by `dt` seconds with the given error.
    pub fn step(&mut self, error: f64, dt: f64) -> f64 {
        let dt = if dt > 0.0 && dt.is_finite() { dt } else { DT_EPSILON };

        self.integral += error * dt;
        let derivative = (error - self.previous_error) / dt;
        self.previous_error = error;

        let output = self.kp * error + self.ki * self.integral + self.kd * derivative;

        match self.clamp {
            Some((lo, hi)) => output.clamp(lo, hi),
            None => output,
        }
    }

    /// Reset PID controller
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}
