// src/hardware/mod.rs - Motor controller link
pub mod serial;

use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;

use crate::motion::kinematics::MotorCommand;

pub use serial::SerialMotorLink;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("failed to open serial port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serial write failed: {0}")]
    Write(#[from] std::io::Error),
    #[error("serial write timed out")]
    Timeout,
    #[error("motor command queue full")]
    QueueFull,
    #[error("motor link disconnected")]
    Disconnected,
}

impl HardwareError {
    /// Whether a later send may succeed without reconnecting.
    pub fn is_transient(&self) -> bool {
        matches!(self, HardwareError::QueueFull | HardwareError::Timeout)
    }
}

/// Encode a command as one wire line: `fl,fr,rl,rr\n`, integer percent in [-100, 100].
pub fn format_motor_command(command: &MotorCommand) -> String {
    let pct = |v: f64| -> i32 {
        if v.is_finite() { (v.clamp(-1.0, 1.0) * 100.0).round() as i32 } else { 0 }
    };
    format!(
        "{},{},{},{}\n",
        pct(command.fl),
        pct(command.fr),
        pct(command.rl),
        pct(command.rr)
    )
}

/// Traffic counters for a motor link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub commands_sent: u64,
    pub commands_dropped: u64,
    pub bytes_written: u64,
    pub lines_received: u64,
}

/// Best-effort, non-blocking sink for motor commands.
pub trait MotorLink: Send {
    /// Queue a command. Must return immediately.
    fn send(&mut self, command: &MotorCommand) -> Result<(), HardwareError>;

    fn is_connected(&self) -> bool;

    fn stats(&self) -> LinkStats;
}

/// In-memory link that records every line it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingLink {
    lines: Arc<Mutex<Vec<String>>>,
    connected: bool,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(Vec::new())),
            connected: true,
        }
    }

    /// A link whose every send fails as disconnected.
    pub fn disconnected() -> Self {
        Self {
            lines: Arc::new(Mutex::new(Vec::new())),
            connected: false,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl MotorLink for RecordingLink {
    fn send(&mut self, command: &MotorCommand) -> Result<(), HardwareError> {
        if !self.connected {
            return Err(HardwareError::Disconnected);
        }
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format_motor_command(command));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> LinkStats {
        let lines = self.lines();
        LinkStats {
            commands_sent: lines.len() as u64,
            bytes_written: lines.iter().map(|l| l.len() as u64).sum(),
            ..LinkStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let cmd = MotorCommand::new(1.0, 1.0, 0.5, 0.0);
        assert_eq!(format_motor_command(&cmd), "100,100,50,0\n");
    }

    #[test]
    fn test_wire_format_clamps_and_rounds() {
        let cmd = MotorCommand::new(2.0, -1.7, -0.333, 0.005);
        assert_eq!(format_motor_command(&cmd), "100,-100,-33,1\n");
        let cmd = MotorCommand::new(f64::NAN, 0.0, 0.0, -0.0);
        assert_eq!(format_motor_command(&cmd), "0,0,0,0\n");
    }

    #[test]
    fn test_error_classification() {
        assert!(HardwareError::QueueFull.is_transient());
        assert!(HardwareError::Timeout.is_transient());
        assert!(!HardwareError::Disconnected.is_transient());
    }

    #[test]
    fn test_recording_link() {
        let mut link = RecordingLink::new();
        let view = link.clone();
        link.send(&MotorCommand::zero()).unwrap();
        assert_eq!(view.lines(), vec!["0,0,0,0\n".to_string()]);
        assert_eq!(view.stats().commands_sent, 1);
        assert_eq!(view.stats().bytes_written, 8);

        let mut dead = RecordingLink::disconnected();
        assert!(matches!(dead.send(&MotorCommand::zero()), Err(HardwareError::Disconnected)));
    }
}
