//! Informational records published once per control tick.
//!
//! Consumers subscribe through a broadcast channel; slow consumers lose
//! frames rather than slowing the control loop.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::hardware::LinkStats;
use crate::motion::controller::ControlMode;
use crate::motion::kinematics::MotorCommand;
use crate::motion::odometry::Pose;
use crate::motion::planner::{MotionRecord, RegressionResult};

/// Frames between frame-rate updates.
const FPS_WINDOW: u32 = 30;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SystemStats {
    pub detection_count: u64,
    pub fps: f64,
    pub tracking_enabled: bool,
    pub trajectory_length: usize,
    pub current_position: Option<(f64, f64)>,
    pub link_connected: bool,
    /// Counters of the current motor link; zero without one.
    pub link: LinkStats,
    pub resolution: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TelemetryFrame {
    pub timestamp: DateTime<Utc>,
    pub mode: ControlMode,
    pub motion: MotionRecord,
    pub regression: RegressionResult,
    pub motors: Option<MotorCommand>,
    pub pose: Pose,
    pub stats: SystemStats,
}

/// Frame-rate estimate refreshed every 30 frames.
#[derive(Debug, Clone)]
pub struct FrameRate {
    window_start: Option<f64>,
    frames: u32,
    fps: f64,
}

impl FrameRate {
    pub fn new() -> Self {
        Self { window_start: None, frames: 0, fps: 0.0 }
    }

    /// Count a frame observed at monotonic time `now` and return the estimate.
    pub fn record(&mut self, now: f64) -> f64 {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        if self.frames >= FPS_WINDOW {
            let elapsed = now - start;
            if elapsed > 0.0 {
                self.fps = self.frames as f64 / elapsed;
            }
            self.frames = 0;
            self.window_start = Some(now);
        }
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::new()
    }
}
