// src/inputs.rs - Operator inputs shared between the web handlers and the control tick
//!
//! Network handlers write, the control tick reads. Each write replaces the
//! whole [`OperatorInputs`] value under the channel's lock, and the tick
//! copies it out once per tick, so it never sees a half-updated snapshot.

use tokio::sync::watch;

/// A manual drive request, timestamped on receipt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualDrive {
    pub vx: f64,
    pub vy: f64,
    /// Monotonic seconds.
    pub received_at: f64,
}

impl ManualDrive {
    /// Clamp the axes into [-1, 1]; non-finite values become 0.
    pub fn new(vx: f64, vy: f64, received_at: f64) -> Self {
        fn sanitize(v: f64) -> f64 {
            if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 }
        }
        Self {
            vx: sanitize(vx),
            vy: sanitize(vy),
            received_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatorInputs {
    pub manual: Option<ManualDrive>,
    pub tracking_enabled: bool,
}

impl Default for OperatorInputs {
    fn default() -> Self {
        Self {
            manual: None,
            tracking_enabled: true,
        }
    }
}

/// Writer side, cloned into every network handler.
#[derive(Debug, Clone)]
pub struct InputHandle {
    tx: watch::Sender<OperatorInputs>,
}

impl InputHandle {
    pub fn set_manual(&self, drive: ManualDrive) {
        self.tx.send_modify(|inputs| inputs.manual = Some(drive));
    }

    pub fn set_tracking(&self, enabled: bool) {
        self.tx.send_modify(|inputs| inputs.tracking_enabled = enabled);
    }

    pub fn current(&self) -> OperatorInputs {
        *self.tx.borrow()
    }
}

/// Reader side, owned by the control loop.
#[derive(Debug)]
pub struct InputCell {
    rx: watch::Receiver<OperatorInputs>,
}

impl InputCell {
    pub fn new(initial: OperatorInputs) -> (InputHandle, InputCell) {
        let (tx, rx) = watch::channel(initial);
        (InputHandle { tx }, InputCell { rx })
    }

    /// Copy of the latest published inputs.
    pub fn snapshot(&mut self) -> OperatorInputs {
        *self.rx.borrow_and_update()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_latest_write() {
        let (handle, mut cell) = InputCell::new(OperatorInputs::default());
        assert_eq!(cell.snapshot(), OperatorInputs::default());

        handle.set_manual(ManualDrive::new(0.5, -0.25, 3.0));
        handle.set_tracking(false);
        let inputs = cell.snapshot();
        assert_eq!(inputs.manual, Some(ManualDrive { vx: 0.5, vy: -0.25, received_at: 3.0 }));
        assert!(!inputs.tracking_enabled);
    }

    #[test]
    fn test_manual_drive_is_sanitized() {
        let drive = ManualDrive::new(4.0, f64::NAN, 1.0);
        assert_eq!(drive.vx, 1.0);
        assert_eq!(drive.vy, 0.0);
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let (handle, mut cell) = InputCell::new(OperatorInputs::default());
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let v = if (i + w) % 2 == 0 { 1.0 } else { -1.0 };
                        handle.set_manual(ManualDrive::new(v, v, v));
                    }
                })
            })
            .collect();
        for _ in 0..500 {
            if let Some(m) = cell.snapshot().manual {
                assert_eq!(m.vx, m.vy);
                assert_eq!(m.vy, m.received_at);
            }
        }
        for w in writers {
            w.join().unwrap();
        }
    }
}
