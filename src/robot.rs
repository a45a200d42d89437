// src/robot.rs - Control session: one tick per detection frame
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};

use crate::config::Config;
use crate::detection::Detection;
use crate::hardware::{HardwareError, MotorLink};
use crate::inputs::{InputCell, InputHandle, OperatorInputs};
use crate::motion::controller::{ArbiterOutput, ControlArbiter, ControlMode};
use crate::motion::kinematics::{MecanumGeometry, MotorCommand};
use crate::motion::odometry::{Odometry, Pose};
use crate::motion::trajectory::{TrajectoryBuffer, TrajectoryPoint};
use crate::scheduler::TimeInterface;
use crate::telemetry::{FrameRate, SystemStats, TelemetryFrame};

#[derive(Debug, Error)]
pub enum RobotError {
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operator actions on state owned by the control loop, applied at the
/// start of the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotRequest {
    ClearTrajectory,
    ResetOdometry,
}

/// Everything the outside world needs to talk to a running [`Robot`].
#[derive(Debug, Clone)]
pub struct RobotHandles {
    pub inputs: InputHandle,
    pub requests: mpsc::Sender<RobotRequest>,
    pub telemetry: broadcast::Sender<TelemetryFrame>,
    pub status: watch::Receiver<Option<TelemetryFrame>>,
}

/// What one tick did.
#[derive(Debug)]
pub struct TickReport {
    pub output: ArbiterOutput,
    /// Command handed to the motor link (and integrated into odometry).
    pub sent: Option<MotorCommand>,
    pub pose: Pose,
    pub link_error: Option<HardwareError>,
}

pub struct Robot {
    config: Config,
    buffer: TrajectoryBuffer,
    arbiter: ControlArbiter,
    odometry: Odometry,
    link: Option<Box<dyn MotorLink>>,
    inputs: InputCell,
    requests: mpsc::Receiver<RobotRequest>,
    telemetry_tx: broadcast::Sender<TelemetryFrame>,
    status_tx: watch::Sender<Option<TelemetryFrame>>,
    frame_rate: FrameRate,
    detection_count: u64,
    motors_active: bool,
    last_mode: Option<ControlMode>,
}

impl Robot {
    pub fn new(config: Config, link: Option<Box<dyn MotorLink>>) -> (Self, RobotHandles) {
        let (input_handle, inputs) = InputCell::new(OperatorInputs::default());
        let (request_tx, requests) = mpsc::channel(32);
        let (telemetry_tx, _) = broadcast::channel(64);
        let (status_tx, status_rx) = watch::channel(None);

        if link.is_none() {
            tracing::warn!("No motor link; commands will only be logged and integrated");
        }

        let robot = Self {
            buffer: TrajectoryBuffer::from_config(&config.trajectory),
            arbiter: ControlArbiter::from_config(&config),
            odometry: Odometry::new(MecanumGeometry::from_config(&config.odometry)),
            link,
            inputs,
            requests,
            telemetry_tx: telemetry_tx.clone(),
            status_tx,
            frame_rate: FrameRate::new(),
            detection_count: 0,
            motors_active: false,
            last_mode: None,
            config,
        };
        let handles = RobotHandles {
            inputs: input_handle,
            requests: request_tx,
            telemetry: telemetry_tx,
            status: status_rx,
        };
        (robot, handles)
    }

    /// Run one control tick for a detector frame observed at `now`.
    pub fn tick(&mut self, detection: Option<Detection>, now: f64) -> TickReport {
        self.drain_requests();
        let inputs = self.inputs.snapshot();
        self.frame_rate.record(now);

        if let Some(det) = detection {
            if inputs.tracking_enabled {
                self.buffer.append(TrajectoryPoint::new(det.center_x, det.center_y, now));
                self.detection_count += 1;
            }
        }

        let points = self.buffer.snapshot();
        let output = self.arbiter.tick(now, &inputs, &points);

        if self.last_mode != Some(output.mode) {
            tracing::info!("Control mode: {:?}", output.mode);
            self.last_mode = Some(output.mode);
        }

        // Wheel powers beyond [-1, 1] saturate at the actuator, so odometry and
        // telemetry see the saturated command. Leaving an active mode stops the
        // wheels once instead of holding the last command.
        let sent = match output.command {
            Some(command) => Some(command.clamped()),
            None if self.motors_active => Some(MotorCommand::zero()),
            None => None,
        };

        let mut link_error = None;
        if let Some(command) = sent {
            self.motors_active = !command.is_zero();
            link_error = self.send_to_link(&command);
            self.odometry.step(&command, output.dt);
        }

        let pose = self.odometry.pose();
        self.publish(&inputs, &output, sent, pose, points.last().copied());

        TickReport { output, sent, pose, link_error }
    }

    fn drain_requests(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            match request {
                RobotRequest::ClearTrajectory => {
                    tracing::info!("Clearing trajectory ({} points)", self.buffer.len());
                    self.buffer.clear();
                    self.arbiter.reset();
                }
                RobotRequest::ResetOdometry => {
                    tracing::info!("Resetting odometry");
                    self.odometry.reset();
                }
            }
        }
    }

    fn send_to_link(&mut self, command: &MotorCommand) -> Option<HardwareError> {
        let link = self.link.as_mut()?;
        match link.send(command) {
            Ok(()) => None,
            Err(e) if e.is_transient() => {
                tracing::warn!("Motor command dropped: {}", e);
                Some(e)
            }
            Err(e) => {
                tracing::error!("Motor link unavailable: {}", e);
                self.link = None;
                Some(e)
            }
        }
    }

    fn publish(
        &self,
        inputs: &OperatorInputs,
        output: &ArbiterOutput,
        sent: Option<MotorCommand>,
        pose: Pose,
        last_point: Option<TrajectoryPoint>,
    ) {
        let frame = TelemetryFrame {
            timestamp: Utc::now(),
            mode: output.mode,
            motion: output.motion.to_record(),
            regression: output.regression,
            motors: sent,
            pose,
            stats: SystemStats {
                detection_count: self.detection_count,
                fps: self.frame_rate.fps(),
                tracking_enabled: inputs.tracking_enabled,
                trajectory_length: self.buffer.len(),
                current_position: last_point.map(|p| (p.x, p.y)),
                link_connected: self.link_connected(),
                link: self.link.as_ref().map(|l| l.stats()).unwrap_or_default(),
                resolution: format!("{}x{}", self.config.camera.width, self.config.camera.height),
            },
        };
        // No subscribers is fine.
        let _ = self.telemetry_tx.send(frame.clone());
        self.status_tx.send_replace(Some(frame));
    }

    /// Drive ticks from a detection stream until it closes or shutdown fires.
    pub async fn run(
        mut self,
        mut detections: mpsc::Receiver<Option<Detection>>,
        clock: Arc<dyn TimeInterface>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), RobotError> {
        tracing::info!("Control loop started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Control loop shutting down");
                    break;
                }
                frame = detections.recv() => match frame {
                    Some(detection) => {
                        let report = self.tick(detection, clock.now_monotonic());
                        tracing::debug!(
                            "tick mode={:?} sent={:?} pose=({:.3}, {:.3}, {:.3})",
                            report.output.mode, report.sent, report.pose.x, report.pose.y, report.pose.theta
                        );
                    }
                    None => {
                        tracing::info!("Detection source closed");
                        break;
                    }
                }
            }
        }
        self.shutdown()
    }

    /// Send a final stop to the motor controller.
    pub fn shutdown(&mut self) -> Result<(), RobotError> {
        self.motors_active = false;
        if let Some(link) = self.link.as_mut() {
            link.send(&MotorCommand::zero())?;
        }
        Ok(())
    }

    pub fn link_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|l| l.is_connected())
    }

    pub fn pose(&self) -> Pose {
        self.odometry.pose()
    }

    pub fn trajectory(&self) -> &TrajectoryBuffer {
        &self.buffer
    }
}
