// Mecanum inverse kinematics for the four-wheel base
// Converts a (direction, velocity, rotation) drive intent into wheel powers.

use std::f64::consts::{FRAC_PI_4, TAU};

/// Normalized power for each of the four wheels, each in [-1.0, 1.0]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelPowers {
    pub lf: f64,
    pub rf: f64,
    pub lr: f64,
    pub rr: f64,
}

impl WheelPowers {
    pub fn new(lf: f64, rf: f64, lr: f64, rr: f64) -> Self {
        Self { lf, rf, lr, rr }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns powers as array [lf, rf, lr, rr]
    pub fn as_array(&self) -> [f64; 4] {
        [self.lf, self.rf, self.lr, self.rr]
    }
}

/// Desired motion of the base
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveIntent {
    /// Translation direction in radians
    pub direction: f64,
    /// Translation speed in [-1.0, 1.0]
    pub velocity: f64,
    /// Rotation speed in [-1.0, 1.0] (positive = counter-clockwise)
    pub rotation: f64,
}

impl DriveIntent {
    pub fn new(direction: f64, velocity: f64, rotation: f64) -> Self {
        Self {
            direction,
            velocity,
            rotation,
        }
    }

    pub fn wheel_powers(&self) -> WheelPowers {
        compute_wheel_powers(self.direction, self.velocity, self.rotation)
    }
}

/// Wrap a direction into [0, 2π)
pub fn normalize_direction(direction: f64) -> f64 {
    direction.rem_euclid(TAU)
}

/// Convert a drive intent to wheel powers
///
/// # Arguments
/// * `direction` - Translation direction in radians
/// * `velocity` - Translation speed in [-1.0, 1.0]
/// * `rotation` - Rotation speed in [-1.0, 1.0]
///
/// # Returns
/// Wheel powers, scaled down only if some wheel would exceed 1.0
pub fn compute_wheel_powers(direction: f64, velocity: f64, rotation: f64) -> WheelPowers {
    // Rollers sit at 45°, so steer in the rotated frame
    let mut s = (direction + FRAC_PI_4).sin();
    let mut c = (direction + FRAC_PI_4).cos();

    // Stretch the steering vector so its larger component is unit length
    let m = s.abs().max(c.abs());
    s /= m;
    c /= m;

    let lf = velocity * s + rotation;
    let rf = velocity * c - rotation;
    let lr = velocity * c + rotation;
    let rr = velocity * s - rotation;

    // Never amplify: scale stays 1.0 when every wheel already fits
    let scale = [lf, rf, lr, rr]
        .iter()
        .map(|v| v.abs())
        .fold(1.0f64, f64::max);

    WheelPowers {
        lf: lf / scale,
        rf: rf / scale,
        lr: lr / scale,
        rr: rr / scale,
    }
}
