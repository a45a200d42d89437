//! End-to-end control ticks: detections in, wheel commands and pose out.

use balle::config::Config;
use balle::detection::Detection;
use balle::hardware::RecordingLink;
use balle::inputs::ManualDrive;
use balle::motion::{ControlMode, MecanumMixer, MotionResult, MotorCommand};
use balle::robot::{Robot, RobotRequest};
use balle::scheduler::{ManualClock, TimeInterface};
use balle::simulator::SimulatedDetector;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

fn config() -> Config {
    let mut config = Config::default();
    config.camera.width = 640;
    config.camera.height = 480;
    config.serial.enabled = false;
    config
}

/// Target drifting right of centre along a straight line, 30 fps.
fn feed_track(robot: &mut Robot, frames: usize, t0: f64) -> f64 {
    let mut t = t0;
    for i in 0..frames {
        t = t0 + i as f64 / 30.0;
        let det = Detection::new(420.0 + 3.0 * i as f64, 240.0 + 1.0 * i as f64, 30.0, 30.0);
        robot.tick(Some(det), t);
    }
    t
}

#[test]
fn test_tracking_produces_normalized_autonomous_commands() {
    let link = RecordingLink::new();
    let view = link.clone();
    let (mut robot, _handles) = Robot::new(config(), Some(Box::new(link)));

    let t = feed_track(&mut robot, 10, 0.0);
    let report = robot.tick(Some(Detection::new(460.0, 250.0, 30.0, 30.0)), t + 1.0 / 30.0);

    assert_eq!(report.output.mode, ControlMode::Autonomous);
    assert!(matches!(report.output.motion, MotionResult::Desired { .. }));
    assert!(report.output.regression.has_data);
    let cmd = report.sent.unwrap();
    assert!((cmd.max_abs() - 1.0).abs() < 1e-9);
    assert!(!view.lines().is_empty());
    assert!(view.lines().iter().all(|l| l.ends_with('\n') && l.split(',').count() == 4));
}

#[test]
fn test_detector_dropout_triggers_stop_within_timeout() {
    let link = RecordingLink::new();
    let view = link.clone();
    let (mut robot, _handles) = Robot::new(config(), Some(Box::new(link)));

    let t = feed_track(&mut robot, 10, 0.0);
    // Detector goes quiet; frames keep arriving without detections.
    let report = robot.tick(None, t + 0.4);
    assert_eq!(report.output.mode, ControlMode::Autonomous);
    let report = robot.tick(None, t + 0.6);
    assert_eq!(report.output.motion, MotionResult::Stop);
    assert_eq!(report.sent, Some(MotorCommand::zero()));
    assert_eq!(view.lines().last().map(String::as_str), Some("0,0,0,0\n"));
}

#[test]
fn test_manual_override_and_expiry() {
    let (mut robot, handles) = Robot::new(config(), None);
    let t = feed_track(&mut robot, 10, 0.0);

    let x_before = robot.pose().x;
    handles.inputs.set_manual(ManualDrive::new(0.0, -0.5, t));
    let report = robot.tick(Some(Detection::new(460.0, 250.0, 30.0, 30.0)), t + 0.1);
    assert_eq!(report.output.mode, ControlMode::Manual);
    assert_eq!(report.sent, Some(MecanumMixer::new().compute_manual(0.0, -0.5, 0.0)));
    assert!(robot.pose().x > x_before);

    // Manual input lapses; tracking takes over again.
    let report = robot.tick(Some(Detection::new(463.0, 251.0, 30.0, 30.0)), t + 0.7);
    assert_eq!(report.output.mode, ControlMode::Autonomous);
}

#[test]
fn test_tracking_disabled_goes_idle_and_stops_once() {
    let link = RecordingLink::new();
    let view = link.clone();
    let (mut robot, handles) = Robot::new(config(), Some(Box::new(link)));
    let t = feed_track(&mut robot, 10, 0.0);
    let sent_before = view.lines().len();

    handles.inputs.set_tracking(false);
    let report = robot.tick(Some(Detection::new(470.0, 255.0, 30.0, 30.0)), t + 0.03);
    assert_eq!(report.output.mode, ControlMode::Idle);
    robot.tick(Some(Detection::new(473.0, 256.0, 30.0, 30.0)), t + 0.06);

    let lines = view.lines();
    assert_eq!(lines.len(), sent_before + 1);
    assert_eq!(lines.last().map(String::as_str), Some("0,0,0,0\n"));
    assert_eq!(robot.trajectory().len(), 10);
}

#[test]
fn test_clear_request_empties_buffer() {
    let (mut robot, handles) = Robot::new(config(), None);
    let t = feed_track(&mut robot, 10, 0.0);
    handles.requests.try_send(RobotRequest::ClearTrajectory).unwrap();
    let report = robot.tick(Some(Detection::new(300.0, 200.0, 30.0, 30.0)), t + 0.03);
    assert_eq!(robot.trajectory().len(), 1);
    assert_eq!(report.output.mode, ControlMode::Idle);
}

#[tokio::test]
async fn test_run_loop_with_simulated_detector() {
    let clock = Arc::new(ManualClock::new(0.0));
    let (robot, handles) = Robot::new(config(), None);
    let (tx, rx) = mpsc::channel(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut sim = SimulatedDetector::new(640.0, 480.0, 5).with_dropout(0.0);
    for i in 0..30 {
        tx.send(sim.sample(i as f64 / 30.0)).await.unwrap();
    }
    drop(tx);

    // Clock stays at 0 so every frame looks fresh.
    assert_eq!(clock.now_monotonic(), 0.0);
    let shutdown_rx = shutdown_tx.subscribe();
    robot.run(rx, clock, shutdown_rx).await.unwrap();

    let frame = handles.status.borrow().clone().unwrap();
    assert_eq!(frame.stats.detection_count, 30);
    assert_eq!(frame.stats.resolution, "640x480");
}
