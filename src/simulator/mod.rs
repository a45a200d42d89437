//! Synthetic detector used with `--simulate`.
//!
//! The target bounces along a straight line inside the frame. Each sample
//! gets uniform pixel noise and may be dropped entirely, which exercises the
//! staleness path the same way a flaky real detector does.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{broadcast, mpsc};

use crate::detection::Detection;

const DEFAULT_NOISE_PX: f64 = 3.0;
const DEFAULT_DROPOUT: f64 = 0.1;
const BOX_SIZE_PX: f64 = 40.0;

pub struct SimulatedDetector {
    rng: StdRng,
    width: f64,
    height: f64,
    start: (f64, f64),
    /// Pixels per second.
    velocity: (f64, f64),
    noise: f64,
    dropout: f64,
}

impl SimulatedDetector {
    pub fn new(width: f64, height: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            width,
            height,
            start: (0.2 * width, 0.3 * height),
            velocity: (0.1 * width, 0.05 * height),
            noise: DEFAULT_NOISE_PX,
            dropout: DEFAULT_DROPOUT,
        }
    }

    pub fn with_noise(mut self, pixels: f64) -> Self {
        self.noise = pixels.max(0.0);
        self
    }

    pub fn with_dropout(mut self, probability: f64) -> Self {
        self.dropout = if probability.is_finite() { probability.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    pub fn with_velocity(mut self, vx: f64, vy: f64) -> Self {
        self.velocity = (vx, vy);
        self
    }

    /// Noise-free target position at `t` seconds after start.
    pub fn position_at(&self, t: f64) -> (f64, f64) {
        (
            reflect(self.start.0 + self.velocity.0 * t, self.width),
            reflect(self.start.1 + self.velocity.1 * t, self.height),
        )
    }

    /// One detector frame at `t`, or `None` for a dropped frame.
    pub fn sample(&mut self, t: f64) -> Option<Detection> {
        if self.dropout > 0.0 && self.rng.random_bool(self.dropout) {
            return None;
        }
        let (mut x, mut y) = self.position_at(t);
        if self.noise > 0.0 {
            x += self.rng.random_range(-self.noise..=self.noise);
            y += self.rng.random_range(-self.noise..=self.noise);
        }
        Some(Detection::new(
            x.clamp(0.0, self.width),
            y.clamp(0.0, self.height),
            BOX_SIZE_PX,
            BOX_SIZE_PX,
        ))
    }

    /// Emit one frame per `period` until shutdown or the receiver goes away.
    pub async fn run(
        mut self,
        period: Duration,
        tx: mpsc::Sender<Option<Detection>>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        tracing::info!("Simulated detector running at {:.1} fps", 1.0 / period.as_secs_f64());
        let mut interval = tokio::time::interval(period);
        let started = tokio::time::Instant::now();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {
                    let frame = self.sample(started.elapsed().as_secs_f64());
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Simulated detector stopped");
    }
}

/// Fold `v` back into `[0, max]` as if bouncing off both edges.
fn reflect(v: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    let m = v.rem_euclid(2.0 * max);
    if m > max { 2.0 * max - m } else { m }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SimulatedDetector::new(640.0, 480.0, 7);
        let mut b = SimulatedDetector::new(640.0, 480.0, 7);
        for i in 0..50 {
            let t = i as f64 / 30.0;
            assert_eq!(a.sample(t), b.sample(t));
        }
    }

    #[test]
    fn test_noise_free_sample_matches_path() {
        let mut det = SimulatedDetector::new(640.0, 480.0, 1).with_noise(0.0).with_dropout(0.0);
        let d = det.sample(1.0).unwrap();
        assert_eq!((d.center_x, d.center_y), (128.0 + 64.0, 144.0 + 24.0));
    }

    #[test]
    fn test_full_dropout() {
        let mut det = SimulatedDetector::new(640.0, 480.0, 3).with_dropout(1.0);
        assert!((0..20).all(|i| det.sample(i as f64).is_none()));
    }

    #[test]
    fn test_target_stays_in_frame() {
        let mut det = SimulatedDetector::new(320.0, 240.0, 11)
            .with_velocity(500.0, -300.0)
            .with_dropout(0.0);
        for i in 0..500 {
            let d = det.sample(i as f64 * 0.1).unwrap();
            assert!((0.0..=320.0).contains(&d.center_x));
            assert!((0.0..=240.0).contains(&d.center_y));
        }
    }

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(50.0, 100.0), 50.0);
        assert_eq!(reflect(150.0, 100.0), 50.0);
        assert_eq!(reflect(-30.0, 100.0), 30.0);
        assert_eq!(reflect(5.0, 0.0), 0.0);
    }
}
