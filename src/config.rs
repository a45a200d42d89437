//! # Robot Configuration
//!
//! All tuning parameters and hardware endpoints for the tracking robot live in
//! one TOML file. Every section is optional; missing keys fall back to the
//! defaults below.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [camera]
//! width = 1280
//! height = 720
//!
//! [planner]
//! k_v = 0.8
//! k_a = 0.5
//!
//! [pid.x]
//! kp = 0.002
//! clamp = [-1.5, 1.5]
//!
//! [serial]
//! port = "/dev/ttyACM0"
//! baud = 115200
//! ```

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the camera, planner, controllers and links.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub trajectory: TrajectoryConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub pid: PidConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub odometry: OdometryConfig,
    #[serde(default)]
    pub web: WebConfig,
}

/// Image geometry of the tracking camera.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraConfig {
    #[serde(default = "default_frame_width")]
    pub width: u32,
    #[serde(default = "default_frame_height")]
    pub height: u32,
    /// Nominal frame rate, used for the very first control tick's dt.
    #[serde(default = "default_fps")]
    pub fps: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_frame_width(),
            height: default_frame_height(),
            fps: default_fps(),
        }
    }
}

impl CameraConfig {
    pub fn nominal_frame_period(&self) -> f64 {
        if self.fps > 0.0 { 1.0 / self.fps } else { 1.0 / default_fps() }
    }
}

/// Retention policy of the trajectory buffer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrajectoryConfig {
    /// Age window in seconds.
    #[serde(default = "default_trajectory_window")]
    pub window: f64,
    #[serde(default = "default_trajectory_capacity")]
    pub capacity: usize,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            window: default_trajectory_window(),
            capacity: default_trajectory_capacity(),
        }
    }
}

/// Image-space motion planner gains and thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    #[serde(default = "default_min_points")]
    pub min_points: usize,
    #[serde(default = "default_k_v")]
    pub k_v: f64,
    #[serde(default = "default_k_a")]
    pub k_a: f64,
    #[serde(default = "default_staleness_timeout")]
    pub staleness_timeout: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_points: default_min_points(),
            k_v: default_k_v(),
            k_a: default_k_a(),
            staleness_timeout: default_staleness_timeout(),
        }
    }
}

/// Gains and output clamp for one PID axis.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PidAxisConfig {
    #[serde(default = "default_pid_kp")]
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
    #[serde(default = "default_pid_clamp")]
    pub clamp: (f64, f64),
}

impl Default for PidAxisConfig {
    fn default() -> Self {
        Self {
            kp: default_pid_kp(),
            ki: 0.0,
            kd: 0.0,
            clamp: default_pid_clamp(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PidConfig {
    #[serde(default)]
    pub x: PidAxisConfig,
    #[serde(default)]
    pub y: PidAxisConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    /// Seconds a manual drive command keeps priority over autonomous control.
    #[serde(default = "default_manual_timeout")]
    pub manual_timeout: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { manual_timeout: default_manual_timeout() }
    }
}

/// Motor-controller serial link.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    /// `false` runs the robot without a motor link.
    #[serde(default = "default_serial_enabled")]
    pub enabled: bool,
    #[serde(default = "default_serial_port")]
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout: f64,
    /// Seconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout: f64,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: default_serial_enabled(),
            port: default_serial_port(),
            baud: default_baud(),
            read_timeout: default_read_timeout(),
            write_timeout: default_write_timeout(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl SerialConfig {
    pub fn read_timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.read_timeout.max(0.001))
    }

    pub fn write_timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.write_timeout.max(0.001))
    }
}

/// Geometry used for open-loop pose integration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct OdometryConfig {
    /// Wheel linear speed at full power (m/s).
    #[serde(default = "default_max_wheel_speed")]
    pub max_wheel_speed: f64,
    /// Half of the front-back wheel distance (m).
    #[serde(default = "default_half_length")]
    pub half_wheelbase: f64,
    /// Half of the left-right wheel distance (m).
    #[serde(default = "default_half_length")]
    pub half_track: f64,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            max_wheel_speed: default_max_wheel_speed(),
            half_wheelbase: default_half_length(),
            half_track: default_half_length(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Config {
    /// Check values the control loop can only guard against, not honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "camera resolution must be positive, got {}x{}",
                self.camera.width, self.camera.height
            )));
        }
        if self.trajectory.window <= 0.0 {
            return Err(ConfigError::Invalid("trajectory.window must be > 0".to_string()));
        }
        if self.trajectory.capacity == 0 {
            return Err(ConfigError::Invalid("trajectory.capacity must be > 0".to_string()));
        }
        if self.planner.min_points < 2 {
            return Err(ConfigError::Invalid("planner.min_points must be at least 2".to_string()));
        }
        if self.planner.staleness_timeout <= 0.0 {
            return Err(ConfigError::Invalid("planner.staleness_timeout must be > 0".to_string()));
        }
        if self.control.manual_timeout <= 0.0 {
            return Err(ConfigError::Invalid("control.manual_timeout must be > 0".to_string()));
        }
        for (axis, pid) in [("x", &self.pid.x), ("y", &self.pid.y)] {
            if pid.clamp.0 > pid.clamp.1 {
                return Err(ConfigError::Invalid(format!(
                    "pid.{} clamp lower bound {} exceeds upper bound {}",
                    axis, pid.clamp.0, pid.clamp.1
                )));
            }
        }
        if self.odometry.half_wheelbase + self.odometry.half_track <= 0.0 {
            return Err(ConfigError::Invalid("odometry geometry must be positive".to_string()));
        }
        Ok(())
    }
}

// Default value functions
fn default_frame_width() -> u32 { 1920 }
fn default_frame_height() -> u32 { 1080 }
fn default_fps() -> f64 { 30.0 }
fn default_trajectory_window() -> f64 { 3.0 }
fn default_trajectory_capacity() -> usize { 500 }
fn default_min_points() -> usize { 4 }
fn default_k_v() -> f64 { 1.0 }
fn default_k_a() -> f64 { 0.5 }
fn default_staleness_timeout() -> f64 { 0.5 }
fn default_pid_kp() -> f64 { 0.002 }
fn default_pid_clamp() -> (f64, f64) { (-1.5, 1.5) }
fn default_manual_timeout() -> f64 { 0.5 }
fn default_serial_enabled() -> bool { true }
fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud() -> u32 { 115200 }
fn default_read_timeout() -> f64 { 0.02 }
fn default_write_timeout() -> f64 { 0.05 }
fn default_queue_depth() -> usize { 8 }
fn default_max_wheel_speed() -> f64 { 1.5 }
fn default_half_length() -> f64 { 0.20 }
fn default_bind() -> String { "0.0.0.0:5000".to_string() }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.camera.width, 1920);
        assert_eq!(config.camera.height, 1080);
        assert_eq!(config.planner.min_points, 4);
        assert_eq!(config.planner.k_v, 1.0);
        assert_eq!(config.planner.k_a, 0.5);
        assert_eq!(config.planner.staleness_timeout, 0.5);
        assert_eq!(config.control.manual_timeout, 0.5);
        assert_eq!(config.pid.x.clamp, (-1.5, 1.5));
        assert_eq!(config.serial.baud, 115200);
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert!(config.serial.enabled);
        assert_eq!(config.trajectory.capacity, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_success() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("robot.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(
            file,
            "[camera]\nwidth = 640\nheight = 480\n\n[pid.y]\nkp = 0.01\nclamp = [-1.0, 1.0]"
        )
        .unwrap();
        file.flush().unwrap();
        let config = load_config(file_path.to_str().unwrap()).unwrap();
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 480);
        assert_eq!(config.pid.y.kp, 0.01);
        assert_eq!(config.pid.y.clamp, (-1.0, 1.0));
        // Defaults for missing fields
        assert_eq!(config.pid.x.kp, 0.002);
        assert_eq!(config.planner.k_a, 0.5);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent_robot.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bad.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "not a valid toml").unwrap();
        file.flush().unwrap();
        let result = load_config(file_path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_serial_port_can_be_disabled() {
        let toml = r#"
        [serial]
        enabled = false
        baud = 9600
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.serial.enabled);
        assert_eq!(config.serial.baud, 9600);
        assert_eq!(config.serial.port, "/dev/ttyACM0");
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let mut config = Config::default();
        config.camera.width = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.pid.x.clamp = (1.0, -1.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.planner.staleness_timeout = 0.0;
        assert!(config.validate().is_err());
    }
}
