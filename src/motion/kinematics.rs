// src/motion/kinematics.rs
//! Mecanum drive mixing and forward kinematics.
//!
//! Frame conventions, used by both the manual and the closed-loop paths:
//! - image `+x` is right, image `+y` is down;
//! - robot `forward` is image up (`-y`), robot `strafe` positive is image
//!   left (`-x`), `rotation` positive is counter-clockwise.
//!
//! Wheel order everywhere is front-left, front-right, rear-left, rear-right.

use serde::Serialize;

use crate::config::OdometryConfig;

/// Floor for the normalisation divisor.
const NORMALIZE_FLOOR: f64 = 1e-6;

/// Normalised power for each wheel, nominally in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MotorCommand {
    pub fl: f64,
    pub fr: f64,
    pub rl: f64,
    pub rr: f64,
}

impl MotorCommand {
    pub fn new(fl: f64, fr: f64, rl: f64, rr: f64) -> Self {
        Self { fl, fr, rl, rr }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.fl, self.fr, self.rl, self.rr]
    }

    pub fn max_abs(&self) -> f64 {
        self.as_array().iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    pub fn is_zero(&self) -> bool {
        self.as_array().iter().all(|v| *v == 0.0)
    }

    /// Divide every wheel by the largest magnitude so the largest becomes 1
    /// and turning ratios are preserved.
    pub fn normalized(&self) -> Self {
        let scale = self.max_abs().max(NORMALIZE_FLOOR);
        Self::new(self.fl / scale, self.fr / scale, self.rl / scale, self.rr / scale)
    }

    /// Saturate each wheel independently to [-1, 1].
    pub fn clamped(&self) -> Self {
        Self::new(
            self.fl.clamp(-1.0, 1.0),
            self.fr.clamp(-1.0, 1.0),
            self.rl.clamp(-1.0, 1.0),
            self.rr.clamp(-1.0, 1.0),
        )
    }
}

/// Body-frame drive request.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyCommand {
    pub forward: f64,
    pub strafe: f64,
    pub rotation: f64,
}

impl BodyCommand {
    /// Map an image-plane vector onto the robot body frame.
    pub fn from_image(x: f64, y: f64, rotation: f64) -> Self {
        Self {
            forward: -y,
            strafe: -x,
            rotation,
        }
    }
}

/// Standard mecanum mixing, unnormalised.
pub fn mix(body: BodyCommand) -> MotorCommand {
    let BodyCommand { forward, strafe, rotation } = body;
    MotorCommand {
        fl: forward - strafe - rotation,
        fr: forward + strafe + rotation,
        rl: forward + strafe - rotation,
        rr: forward - strafe + rotation,
    }
}

/// Maps drive requests to wheel powers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MecanumMixer;

impl MecanumMixer {
    pub fn new() -> Self {
        Self
    }

    /// Joystick-style teleoperation: `vx`, `vy` in [-1, 1] image-plane
    /// directions, `omega` rotation. No normalisation is applied.
    pub fn compute_manual(&self, vx: f64, vy: f64, omega: f64) -> MotorCommand {
        mix(BodyCommand::from_image(vx, vy, omega))
    }

    /// Closed-loop mapping of the per-axis PID outputs. Motion is commanded
    /// against the measured error and the result is normalised so the
    /// strongest wheel runs at full power.
    pub fn compute_closed_loop(&self, u_x: f64, u_y: f64) -> MotorCommand {
        mix(BodyCommand::from_image(u_x, u_y, 0.0)).normalized()
    }
}

/// Body-frame velocity recovered from wheel speeds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyVelocity {
    /// Forward (m/s).
    pub vx: f64,
    /// Left (m/s).
    pub vy: f64,
    /// Counter-clockwise (rad/s).
    pub omega: f64,
}

/// Physical geometry of the drivetrain.
#[derive(Debug, Clone, Copy)]
pub struct MecanumGeometry {
    /// Wheel linear speed at full power (m/s).
    pub max_wheel_speed: f64,
    pub half_wheelbase: f64,
    pub half_track: f64,
}

impl MecanumGeometry {
    pub fn new(max_wheel_speed: f64, half_wheelbase: f64, half_track: f64) -> Self {
        Self {
            max_wheel_speed,
            half_wheelbase,
            half_track,
        }
    }

    pub fn from_config(config: &OdometryConfig) -> Self {
        Self::new(config.max_wheel_speed, config.half_wheelbase, config.half_track)
    }

    fn lever_arm(&self) -> f64 {
        (self.half_wheelbase + self.half_track).max(NORMALIZE_FLOOR)
    }

    /// Forward kinematics from normalised wheel powers.
    pub fn body_velocity(&self, command: &MotorCommand) -> BodyVelocity {
        let fl = command.fl * self.max_wheel_speed;
        let fr = command.fr * self.max_wheel_speed;
        let rl = command.rl * self.max_wheel_speed;
        let rr = command.rr * self.max_wheel_speed;

        BodyVelocity {
            vx: (fl + fr + rl + rr) / 4.0,
            vy: (-fl + fr + rl - rr) / 4.0,
            omega: (-fl + fr - rl + rr) / (4.0 * self.lever_arm()),
        }
    }
}

impl Default for MecanumGeometry {
    fn default() -> Self {
        Self::from_config(&OdometryConfig::default())
    }
}
