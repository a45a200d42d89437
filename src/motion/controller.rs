// src/motion/controller.rs - Per-tick arbitration between manual and autonomous control
use serde::Serialize;

use crate::config::Config;
use crate::inputs::OperatorInputs;
use crate::motion::kinematics::{MecanumMixer, MotorCommand};
use crate::motion::pid::AxisPid;
use crate::motion::planner::{MotionPlanner, MotionResult, RegressionResult};
use crate::motion::trajectory::TrajectoryPoint;

/// Who owns the motor output for a tick. Derived every tick, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Manual,
    Autonomous,
    Idle,
}

/// Result of one arbitration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbiterOutput {
    pub mode: ControlMode,
    /// `None` means no command this tick.
    pub command: Option<MotorCommand>,
    pub motion: MotionResult,
    pub regression: RegressionResult,
    /// Seconds since the previous tick, guarded.
    pub dt: f64,
}

pub struct ControlArbiter {
    planner: MotionPlanner,
    mixer: MecanumMixer,
    pid_x: AxisPid,
    pid_y: AxisPid,
    manual_timeout: f64,
    nominal_dt: f64,
    last_tick: Option<f64>,
}

impl ControlArbiter {
    pub fn new(
        planner: MotionPlanner,
        pid_x: AxisPid,
        pid_y: AxisPid,
        manual_timeout: f64,
        nominal_dt: f64,
    ) -> Self {
        Self {
            planner,
            mixer: MecanumMixer::new(),
            pid_x,
            pid_y,
            manual_timeout,
            nominal_dt,
            last_tick: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let planner = MotionPlanner::new(
            config.camera.width as f64,
            config.camera.height as f64,
            &config.planner,
        );
        Self::new(
            planner,
            AxisPid::from_config(&config.pid.x),
            AxisPid::from_config(&config.pid.y),
            config.control.manual_timeout,
            config.camera.nominal_frame_period(),
        )
    }

    /// Decide and compute this tick's output.
    ///
    /// A fresh manual command wins outright. Otherwise, with tracking on and
    /// at least two points, the planner drives the PID loops. Anything else
    /// is idle and emits nothing.
    pub fn tick(&mut self, now: f64, inputs: &OperatorInputs, points: &[TrajectoryPoint]) -> ArbiterOutput {
        let dt = match self.last_tick {
            Some(prev) if now > prev => now - prev,
            Some(_) => crate::motion::pid::DT_EPSILON,
            None => self.nominal_dt,
        };
        self.last_tick = Some(now);

        if let Some(manual) = inputs.manual {
            if now - manual.received_at <= self.manual_timeout {
                let command = self.mixer.compute_manual(manual.vx, manual.vy, 0.0);
                return ArbiterOutput {
                    mode: ControlMode::Manual,
                    command: Some(command),
                    motion: MotionResult::NoData,
                    regression: RegressionResult::none(),
                    dt,
                };
            }
        }

        if inputs.tracking_enabled && points.len() >= 2 {
            let (motion, regression) = self.planner.compute(points, now);
            let command = match motion {
                MotionResult::NoData => None,
                MotionResult::Stop => Some(MotorCommand::zero()),
                MotionResult::Desired { ax, ay, .. } => {
                    // Desired acceleration is the setpoint; measured acceleration is taken as zero.
                    let u_x = self.pid_x.step(ax, dt);
                    let u_y = self.pid_y.step(ay, dt);
                    Some(self.mixer.compute_closed_loop(u_x, u_y))
                }
            };
            if let Some(command) = command {
                return ArbiterOutput {
                    mode: ControlMode::Autonomous,
                    command: Some(command),
                    motion,
                    regression,
                    dt,
                };
            }
            return ArbiterOutput {
                mode: ControlMode::Idle,
                command: None,
                motion,
                regression,
                dt,
            };
        }

        ArbiterOutput {
            mode: ControlMode::Idle,
            command: None,
            motion: MotionResult::NoData,
            regression: RegressionResult::none(),
            dt,
        }
    }

    /// Forget tick timing and PID state, e.g. after the trajectory is cleared.
    pub fn reset(&mut self) {
        self.pid_x.reset();
        self.pid_y.reset();
        self.last_tick = None;
    }
}
