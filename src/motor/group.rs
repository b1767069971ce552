// The four drive motors as one unit
//
// Open-loop driving goes straight through kinematics to wheel power. Encoder
// driving turns a distance and direction into per-wheel position targets and
// runs the group as a single long-running action.

use tracing::debug;

use super::kinematics::{WheelPowers, compute_wheel_powers, normalize_direction};
use crate::action::Trackable;
use crate::hardware::{Motor, Result};

/// Drive motors in [lf, rf, lr, rr] order
pub struct DriveMotors<M> {
    pub lf: M,
    pub rf: M,
    pub lr: M,
    pub rr: M,
}

impl<M: Motor> DriveMotors<M> {
    pub fn new(lf: M, rf: M, lr: M, rr: M) -> Self {
        Self { lf, rf, lr, rr }
    }

    fn each(&mut self) -> [&mut M; 4] {
        [&mut self.lf, &mut self.rf, &mut self.lr, &mut self.rr]
    }

    /// Send wheel powers
    pub fn set_powers(&mut self, powers: WheelPowers) -> Result<()> {
        debug!(
            "Setting wheel powers: lf={:.3}, rf={:.3}, lr={:.3}, rr={:.3}",
            powers.lf, powers.rf, powers.lr, powers.rr
        );
        for (motor, power) in self.each().into_iter().zip(powers.as_array()) {
            motor.set_power(power)?;
        }
        Ok(())
    }

    /// Cut power to all four wheels
    pub fn stop(&mut self) -> Result<()> {
        self.set_powers(WheelPowers::zero())
    }

    pub fn set_free_power_mode(&mut self) -> Result<()> {
        for motor in self.each() {
            motor.set_free_power_mode()?;
        }
        Ok(())
    }

    pub fn reset_position_reference(&mut self) -> Result<()> {
        for motor in self.each() {
            motor.reset_position_reference()?;
        }
        Ok(())
    }

    /// Encoder positions in [lf, rf, lr, rr] order
    pub fn positions(&mut self) -> Result<[i32; 4]> {
        Ok([
            self.lf.current_position()?,
            self.rf.current_position()?,
            self.lr.current_position()?,
            self.rr.current_position()?,
        ])
    }

    /// Busy only while every wheel is still progressing
    ///
    /// This is a logical AND: the group counts as finished as soon as any one
    /// wheel reaches its target, so a single stuck wheel cannot hold the
    /// group forever.
    pub fn all_progressing(&mut self) -> Result<bool> {
        for motor in self.each() {
            if !motor.is_progressing_toward_target()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Per-wheel encoder targets for driving `ticks` in `direction`
///
/// The kinematic factors are evaluated at full velocity with no rotation, so
/// direction only shapes the ratio between wheels. Targets round to the
/// nearest tick; the normalized factors land a hair under 1.0.
pub fn encoder_targets(direction: f64, ticks: i32) -> [i32; 4] {
    let factors = compute_wheel_powers(normalize_direction(direction), 1.0, 0.0);
    factors.as_array().map(|f| (ticks as f64 * f).round() as i32)
}

impl<M: Motor> Trackable for DriveMotors<M> {
    type Target = [i32; 4];

    fn start(&mut self, targets: [i32; 4], power: f64) -> Result<()> {
        self.stop()?;
        self.reset_position_reference()?;
        for (motor, target) in self.each().into_iter().zip(targets) {
            motor.set_position_target(target)?;
        }
        for motor in self.each() {
            motor.set_power(power)?;
        }
        Ok(())
    }

    fn within_tolerance(&mut self, targets: [i32; 4], tolerance: i32) -> Result<bool> {
        let positions = self.positions()?;
        Ok(positions
            .iter()
            .zip(targets)
            .all(|(position, target)| (target - position).abs() <= tolerance))
    }

    fn is_progressing(&mut self) -> Result<bool> {
        self.all_progressing()
    }

    fn release(&mut self) -> Result<()> {
        self.set_free_power_mode()
    }

    /// Same power on every wheel
    fn apply_power(&mut self, power: f64) -> Result<()> {
        for motor in self.each() {
            motor.set_power(power)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionStatus, LongRunningAction};
    use crate::hardware::sim::{MotorMode, SimMotor};
    use std::f64::consts::FRAC_PI_2;

    fn group() -> (DriveMotors<SimMotor>, [SimMotor; 4]) {
        let handles = [
            SimMotor::new("lf"),
            SimMotor::new("rf"),
            SimMotor::new("lr"),
            SimMotor::new("rr"),
        ];
        let [lf, rf, lr, rr] = handles.clone();
        (DriveMotors::new(lf, rf, lr, rr), handles)
    }

    #[test]
    fn test_set_powers_order() {
        let (mut motors, h) = group();
        motors
            .set_powers(WheelPowers::new(0.1, 0.2, 0.3, 0.4))
            .unwrap();
        assert_eq!(h.each_ref().map(|m| m.power()), [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_encoder_targets_forward() {
        assert_eq!(encoder_targets(0.0, 1000), [1000; 4]);
    }

    #[test]
    fn test_encoder_targets_strafe() {
        assert_eq!(encoder_targets(FRAC_PI_2, 500), [500, -500, -500, 500]);
    }

    #[test]
    fn test_encoder_targets_wraps_direction() {
        assert_eq!(
            encoder_targets(FRAC_PI_2 - 4.0 * std::f64::consts::PI, 500),
            encoder_targets(FRAC_PI_2, 500)
        );
    }

    #[test]
    fn test_start_commands_all_wheels() {
        let (mut motors, h) = group();
        h[0].set_position(77);
        motors.start([10, -20, 30, -40], 0.35).unwrap();
        assert_eq!(h[0].position(), 0);
        assert_eq!(h[1].mode(), MotorMode::PositionTarget(-20));
        assert_eq!(h[3].mode(), MotorMode::PositionTarget(-40));
        assert!(h.iter().all(|m| m.power() == 0.35));
    }

    #[test]
    fn test_busy_requires_every_wheel() {
        let (mut motors, h) = group();
        motors.start([1000, 1000, 1000, 1000], 1.0).unwrap();
        assert!(motors.all_progressing().unwrap());

        // One wheel arrives, the rest are still moving
        h[2].set_position(1000);
        assert!(!motors.all_progressing().unwrap());
    }

    #[test]
    fn test_group_finishes_when_first_wheel_finishes() {
        let (mut motors, h) = group();
        h[3].set_stalled(true);
        let mut action = LongRunningAction::new("encoder drive", 2, 1.0);
        action.activate(&mut motors, [80, 400, 400, 400]).unwrap();

        let mut status = ActionStatus::Running;
        for _ in 0..3 {
            h.iter().for_each(SimMotor::step);
            status = action.poll(&mut motors).unwrap();
            if status != ActionStatus::Running {
                break;
            }
        }
        // lf reached 80 on the second step; the stuck rr did not hold the group
        assert_eq!(status, ActionStatus::Completed);
        assert_eq!(h[0].position(), 80);
        assert_eq!(h[3].position(), 0);
    }

    #[test]
    fn test_within_tolerance_needs_all_wheels() {
        let (mut motors, h) = group();
        motors.start([100, 100, 100, 100], 1.0).unwrap();
        for m in &h[..3] {
            m.set_position(99);
        }
        assert!(!motors.within_tolerance([100; 4], 2).unwrap());
        h[3].set_position(101);
        assert!(motors.within_tolerance([100; 4], 2).unwrap());
    }
}
