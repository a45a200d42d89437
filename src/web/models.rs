//! Contains the data models for API requests and responses.

use serde::{Deserialize, Serialize};

/// Manual drive request. Axes are clamped to [-1, 1] on receipt.
#[derive(Debug, Deserialize)]
pub struct DriveRequest {
    pub vx: f64,
    pub vy: f64,
}

/// The drive values actually stored for the control loop.
#[derive(Debug, Serialize)]
pub struct DriveResponse {
    pub vx: f64,
    pub vy: f64,
}

#[derive(Debug, Deserialize)]
pub struct TrackingRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct TrackingResponse {
    pub tracking_enabled: bool,
}
