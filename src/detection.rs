// src/detection.rs - Detector interface
use std::str::FromStr;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::robot::RobotError;

#[derive(Debug, Error, PartialEq)]
pub enum DetectionParseError {
    #[error("expected 4 comma-separated fields, got {0}")]
    FieldCount(usize),
    #[error("invalid number '{0}'")]
    Number(String),
}

/// Bounding box of the tracked object for one frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Detection {
    pub fn new(center_x: f64, center_y: f64, width: f64, height: f64) -> Self {
        Self { center_x, center_y, width, height }
    }
}

impl FromStr for Detection {
    type Err = DetectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(DetectionParseError::FieldCount(fields.len()));
        }
        let mut values = [0.0; 4];
        for (slot, field) in values.iter_mut().zip(fields.iter()) {
            let v: f64 = field
                .parse()
                .map_err(|_| DetectionParseError::Number(field.to_string()))?;
            if !v.is_finite() {
                return Err(DetectionParseError::Number(field.to_string()));
            }
            *slot = v;
        }
        Ok(Detection::new(values[0], values[1], values[2], values[3]))
    }
}

/// Parse one frame line from an external detector: `cx,cy,w,h`, or an empty
/// line / `none` when nothing was detected.
pub fn parse_detection_line(line: &str) -> Result<Option<Detection>, DetectionParseError> {
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    line.parse().map(Some)
}

/// Forward detector lines from `reader` as frames until EOF or the receiver
/// goes away. Malformed lines are logged and skipped.
pub async fn feed_detection_lines<R>(reader: R, tx: mpsc::Sender<Option<Detection>>) -> Result<u64, RobotError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut frames = 0u64;
    while let Some(line) = lines.next_line().await? {
        match parse_detection_line(&line) {
            Ok(frame) => {
                if tx.send(frame).await.is_err() {
                    break;
                }
                frames += 1;
            }
            Err(e) => tracing::warn!("Skipping detector line '{}': {}", line.trim(), e),
        }
    }
    tracing::info!("Detector input ended after {} frames", frames);
    Ok(frames)
}
