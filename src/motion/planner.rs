// src/motion/planner.rs - Trend-fitting image-space motion planner
//!
//! Image conventions: `x` grows to the right, `y` grows downward, timestamps
//! are monotonic seconds. The planner fits a line through the buffered
//! detections, projects the current offset from the frame centre onto that
//! line and asks for a velocity that drives the offset back to zero.

use serde::Serialize;

use crate::config::PlannerConfig;
use crate::motion::trajectory::TrajectoryPoint;

/// Outcome of one planning step.
///
/// `NoData` means there is nothing actionable; `Stop` is the staleness
/// fail-safe and must be turned into an explicit zero command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionResult {
    NoData,
    Stop,
    /// px/s and px/s².
    Desired { vx: f64, vy: f64, ax: f64, ay: f64 },
}

impl MotionResult {
    pub fn has_data(&self) -> bool {
        !matches!(self, MotionResult::NoData)
    }

    pub fn to_record(&self) -> MotionRecord {
        match *self {
            MotionResult::NoData => MotionRecord { has_data: false, ..MotionRecord::default() },
            MotionResult::Stop => MotionRecord { has_data: true, ..MotionRecord::default() },
            MotionResult::Desired { vx, vy, ax, ay } => MotionRecord { has_data: true, vx, vy, ax, ay },
        }
    }
}

/// Flat form of [`MotionResult`] for telemetry consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MotionRecord {
    pub has_data: bool,
    pub vx: f64,
    pub vy: f64,
    pub ax: f64,
    pub ay: f64,
}

/// Visualisation-only segment of the fitted trend line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionLine {
    pub line_x: [f64; 2],
    pub line_y: [f64; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RegressionResult {
    pub has_data: bool,
    #[serde(flatten)]
    pub line: Option<RegressionLine>,
}

impl RegressionResult {
    pub fn none() -> Self {
        Self { has_data: false, line: None }
    }

    fn from_line(line: RegressionLine) -> Self {
        Self { has_data: true, line: Some(line) }
    }
}

/// Ordinary least-squares fit of `y` as a function of `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineFit {
    Sloped { slope: f64, intercept: f64, mean_x: f64, mean_y: f64 },
    /// Zero variance in `x`: the line is `x = mean_x`.
    Vertical { mean_x: f64, mean_y: f64 },
}

impl LineFit {
    /// Unit vector along the line, before sign resolution.
    pub fn unit_direction(&self) -> (f64, f64) {
        match *self {
            LineFit::Vertical { .. } => (0.0, 1.0),
            LineFit::Sloped { slope, .. } => {
                let mag = (1.0 + slope * slope).sqrt();
                if mag > 0.0 { (1.0 / mag, slope / mag) } else { (1.0, 0.0) }
            }
        }
    }

    /// Segment spanning the frame width, or the frame height for a vertical fit.
    pub fn endpoints(&self, width: f64, height: f64) -> RegressionLine {
        match *self {
            LineFit::Vertical { mean_x, .. } => RegressionLine {
                line_x: [mean_x, mean_x],
                line_y: [0.0, height],
            },
            LineFit::Sloped { slope, intercept, .. } => RegressionLine {
                line_x: [0.0, width],
                line_y: [intercept, slope * width + intercept],
            },
        }
    }
}

/// Fit a line through the points. Returns `None` for an empty slice.
pub fn fit_line(points: &[TrajectoryPoint]) -> Option<LineFit> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for p in points {
        let dx = p.x - mean_x;
        let dy = p.y - mean_y;
        num += dx * dy;
        den += dx * dx;
    }

    if den == 0.0 {
        return Some(LineFit::Vertical { mean_x, mean_y });
    }
    let slope = num / den;
    Some(LineFit::Sloped {
        slope,
        intercept: mean_y - slope * mean_x,
        mean_x,
        mean_y,
    })
}

/// Flip `direction` so it agrees with the displacement from the first to the
/// last point. A zero displacement keeps the fitted sign.
pub fn resolve_direction_sign(direction: (f64, f64), points: &[TrajectoryPoint]) -> (f64, f64) {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return direction;
    };
    let dot = (last.x - first.x) * direction.0 + (last.y - first.y) * direction.1;
    if dot >= 0.0 { direction } else { (-direction.0, -direction.1) }
}

/// Finite-difference velocity between the last two points, zero when the
/// timestamps do not advance.
pub fn measured_velocity(points: &[TrajectoryPoint]) -> (f64, f64) {
    if points.len() < 2 {
        return (0.0, 0.0);
    }
    let last = points[points.len() - 1];
    let prev = points[points.len() - 2];
    let dt = last.t - prev.t;
    if dt > 0.0 {
        ((last.x - prev.x) / dt, (last.y - prev.y) / dt)
    } else {
        (0.0, 0.0)
    }
}

pub struct MotionPlanner {
    width: f64,
    height: f64,
    k_v: f64,
    k_a: f64,
    min_points: usize,
    staleness_timeout: f64,
}

impl MotionPlanner {
    pub fn new(width: f64, height: f64, config: &PlannerConfig) -> Self {
        Self {
            width,
            height,
            k_v: config.k_v,
            k_a: config.k_a,
            min_points: config.min_points,
            staleness_timeout: config.staleness_timeout,
        }
    }

    /// Compute the desired motion and the visualisation line at time `now`.
    pub fn compute(&self, points: &[TrajectoryPoint], now: f64) -> (MotionResult, RegressionResult) {
        if points.len() < self.min_points || self.width <= 0.0 || self.height <= 0.0 {
            return (MotionResult::NoData, RegressionResult::none());
        }
        let Some(last) = points.last() else {
            return (MotionResult::NoData, RegressionResult::none());
        };

        // Staleness wins over everything else.
        if now - last.t > self.staleness_timeout {
            tracing::debug!("Last detection is {:.3}s old, commanding stop", now - last.t);
            return (MotionResult::Stop, RegressionResult::none());
        }

        let Some(fit) = fit_line(points) else {
            return (MotionResult::NoData, RegressionResult::none());
        };

        let direction = resolve_direction_sign(fit.unit_direction(), points);

        let error_x = last.x - self.width / 2.0;
        let error_y = last.y - self.height / 2.0;
        let projection = error_x * direction.0 + error_y * direction.1;

        let vx = -self.k_v * projection * direction.0;
        let vy = -self.k_v * projection * direction.1;

        let (vx_meas, vy_meas) = measured_velocity(points);
        let ax = self.k_a * (vx - vx_meas);
        let ay = self.k_a * (vy - vy_meas);

        let regression = RegressionResult::from_line(fit.endpoints(self.width, self.height));
        (MotionResult::Desired { vx, vy, ax, ay }, regression)
    }
}
