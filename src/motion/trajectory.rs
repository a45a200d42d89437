// src/motion/trajectory.rs
//! Bounded, time-ordered history of detected object positions.
//!
//! Points are kept in arrival order. After every append, points older than
//! the age window (measured from the newest point) are evicted from the
//! front, and the buffer is hard-capped in length so memory stays bounded
//! even if timestamps misbehave.

use std::collections::VecDeque;

use crate::config::TrajectoryConfig;

/// One observed object position in image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    /// Pixels, growing to the right.
    pub x: f64,
    /// Pixels, growing downward.
    pub y: f64,
    /// Monotonic seconds.
    pub t: f64,
}

impl TrajectoryPoint {
    pub fn new(x: f64, y: f64, t: f64) -> Self {
        Self { x, y, t }
    }
}

#[derive(Debug, Clone)]
pub struct TrajectoryBuffer {
    points: VecDeque<TrajectoryPoint>,
    window: f64,
    capacity: usize,
}

impl TrajectoryBuffer {
    pub fn new(window: f64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity.min(1024)),
            window,
            capacity,
        }
    }

    pub fn from_config(config: &TrajectoryConfig) -> Self {
        Self::new(config.window, config.capacity)
    }

    /// Insert a point and evict whatever fell out of the age window or capacity.
    pub fn append(&mut self, point: TrajectoryPoint) {
        self.points.push_back(point);

        while self.points.len() > self.capacity {
            self.points.pop_front();
        }

        let newest = point.t;
        while let Some(front) = self.points.front() {
            if newest - front.t > self.window {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }

    /// Ordered copy of the current contents.
    pub fn snapshot(&self) -> Vec<TrajectoryPoint> {
        self.points.iter().copied().collect()
    }

    pub fn last(&self) -> Option<&TrajectoryPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

impl Default for TrajectoryBuffer {
    fn default() -> Self {
        Self::from_config(&TrajectoryConfig::default())
    }
}
