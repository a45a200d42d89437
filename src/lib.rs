//! Vision-guided mecanum robot control core.
//!
//! Detector frames feed a trajectory buffer; each frame drives one control
//! tick that arbitrates between manual teleoperation and a trend-following
//! autonomous plan, mixes the result into wheel powers, sends them to the
//! motor controller and integrates odometry.

pub mod config;
pub mod detection;
pub mod hardware;
pub mod inputs;
pub mod motion;
pub mod robot;
pub mod scheduler;
pub mod simulator;
pub mod telemetry;
pub mod web;
