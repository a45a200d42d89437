// src/scheduler/time_interface.rs - Monotonic time source for the control loop
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Source of monotonic timestamps, in seconds since an arbitrary origin.
///
/// Every timestamp the control loop compares (detections, manual input,
/// tick times) must come from the same `TimeInterface`.
pub trait TimeInterface: Send + Sync {
    fn now_monotonic(&self) -> f64;
}

/// Wall-clock backed implementation anchored at construction time.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeInterface for MonotonicClock {
    fn now_monotonic(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for tests and offline replay.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn set(&self, t: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now = t;
        }
    }

    pub fn advance(&self, dt: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now += dt;
        }
    }
}

impl TimeInterface for ManualClock {
    fn now_monotonic(&self) -> f64 {
        self.now.lock().map(|now| *now).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_monotonic();
        let b = clock.now_monotonic();
        assert!(b >= a);
        assert!(a >= 0.0);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(10.0);
        let other = clock.clone();
        clock.advance(0.5);
        assert_eq!(other.now_monotonic(), 10.5);
        other.set(2.0);
        assert_eq!(clock.now_monotonic(), 2.0);
    }
}
