//! Open-loop odometry from commanded mecanum wheel powers.
//!
//! There is no sensor feedback: the pose is integrated purely from what the
//! robot was told to do, so slip, saturation and latency accumulate as drift
//! that is never corrected.
//!
//! # Coordinate Frame
//!
//! - X forward at `theta = 0`
//! - Y left
//! - Theta counter-clockwise positive, not wrapped

use serde::Serialize;

use crate::motion::kinematics::{MecanumGeometry, MotorCommand};
use crate::motion::pid::DT_EPSILON;

/// Estimated planar pose in the world frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose {
    /// Meters.
    pub x: f64,
    /// Meters.
    pub y: f64,
    /// Radians.
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    pub fn identity() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct Odometry {
    geometry: MecanumGeometry,
    pose: Pose,
}

impl Odometry {
    pub fn new(geometry: MecanumGeometry) -> Self {
        Self {
            geometry,
            pose: Pose::identity(),
        }
    }

    /// Integrate one command held for `dt` seconds and return the new pose.
    ///
    /// Uses the heading at the half-step to rotate the body velocity into
    /// the world frame, then advances the heading by the full step.
    pub fn step(&mut self, command: &MotorCommand, dt: f64) -> Pose {
        let dt = if dt > 0.0 && dt.is_finite() { dt } else { DT_EPSILON };

        let body = self.geometry.body_velocity(command);

        let theta_mid = self.pose.theta + 0.5 * body.omega * dt;
        let (sin_t, cos_t) = theta_mid.sin_cos();
        let dx = body.vx * cos_t - body.vy * sin_t;
        let dy = body.vx * sin_t + body.vy * cos_t;

        self.pose.x += dx * dt;
        self.pose.y += dy * dt;
        self.pose.theta += body.omega * dt;

        self.pose
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Put the robot back at the origin.
    pub fn reset(&mut self) {
        self.pose = Pose::identity();
    }
}

impl Default for Odometry {
    fn default() -> Self {
        Self::new(MecanumGeometry::default())
    }
}
