// src/motion/mod.rs - Perception-to-actuation control core

pub mod controller;
pub mod kinematics;
pub mod odometry;
pub mod pid;
pub mod planner;
pub mod trajectory;

pub use controller::{ArbiterOutput, ControlArbiter, ControlMode};
pub use kinematics::{BodyCommand, MecanumGeometry, MecanumMixer, MotorCommand};
pub use odometry::{Odometry, Pose};
pub use pid::AxisPid;
pub use planner::{MotionPlanner, MotionResult, RegressionResult};
pub use trajectory::{TrajectoryBuffer, TrajectoryPoint};
