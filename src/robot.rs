// Robot facade: everything the host loop and op-modes talk to
//
// The host calls `MecanumRobot::new` once, `on_start` when the match begins,
// then `tick` every control cycle. Commands may be issued at any point in a
// tick; long-running actions are retired by `tick`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action::{ActionStatus, LongRunningAction};
use crate::config::{INCHES_PER_TILE, RobotConfig};
use crate::hardware::{
    ColorSensor, Hardware, HeadingSensor, Motor, ReflectanceSensor, Result, RobotDevices,
};
use crate::motor::{DriveIntent, DriveMotors, encoder_targets};
use crate::sensors::{AllianceColor, ColorReading};
use crate::toggle::ToggleServo;

/// Operator display snapshot. Observational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub flipping: bool,
    /// Raw integrated gyro value, not wrapped
    pub heading: i32,
    /// Reflectance reading, two decimals
    pub line: String,
    pub color: String,
    /// Encoder positions [lf, lr, rf, rr, flipper]
    pub encoders: [i32; 5],
}

impl Telemetry {
    /// Key/value pairs for a text display
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let encoders = self
            .encoders
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\t");
        vec![
            ("Flipping", if self.flipping { "Yes" } else { "No" }.to_string()),
            ("Gyro", self.heading.to_string()),
            ("Line", self.line.clone()),
            ("Color", self.color.clone()),
            ("Encoders", encoders),
        ]
    }
}

/// What the long-running actions did during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub flip: ActionStatus,
    pub encoder_drive: ActionStatus,
}

/// Heading-hold correction: `ln(|angle|)` carrying the angle's sign
///
/// Grows slowly with deflection, so large errors do not saturate the wheels
/// with rotation alone. Zero heading gives zero correction.
pub fn heading_correction(angle: i32) -> f64 {
    if angle == 0 {
        return 0.0;
    }
    (angle.unsigned_abs() as f64).ln() * f64::from(angle.signum())
}

pub struct MecanumRobot<H: Hardware> {
    config: RobotConfig,
    drive: DriveMotors<H::Motor>,
    flipper: H::Motor,
    harvester: H::Motor,
    front_panel: ToggleServo<H::Servo>,
    rear_panel: ToggleServo<H::Servo>,
    dispenser: ToggleServo<H::Servo>,
    gyro: H::Gyro,
    line: H::Line,
    color: H::Color,
    flip: LongRunningAction<i32>,
    encoder_drive: LongRunningAction<[i32; 4]>,
}

impl<H: Hardware> MecanumRobot<H> {
    /// Take ownership of the devices and put them in their initial modes
    ///
    /// Starts gyro calibration; poll `is_calibrating` before relying on the
    /// heading.
    pub fn new(devices: RobotDevices<H>, config: RobotConfig) -> Result<Self> {
        let RobotDevices {
            lf,
            rf,
            lr,
            rr,
            flipper,
            harvester,
            front_panel,
            rear_panel,
            dispenser,
            mut gyro,
            line,
            mut color,
        } = devices;

        let mut drive = DriveMotors::new(lf, rf, lr, rr);
        let mut flipper = flipper;

        // Right side is mirrored
        drive.rr.set_direction_inverted(true)?;
        drive.rf.set_direction_inverted(true)?;
        color.enable_led(false)?;
        gyro.calibrate()?;

        drive.set_free_power_mode()?;
        flipper.set_free_power_mode()?;

        let flip = LongRunningAction::new("flip", config.flipper_close_enough, config.flipper_power)
            .with_timeout(config.action_timeout_ticks);
        let encoder_drive = LongRunningAction::new(
            "encoder drive",
            config.encoder_drive_close_enough,
            config.encoder_drive_power,
        )
        .with_timeout(config.action_timeout_ticks);

        info!("Robot initialized");
        Ok(Self {
            drive,
            flipper,
            harvester,
            front_panel: ToggleServo::with_positions(front_panel, config.panel_positions),
            rear_panel: ToggleServo::with_positions(rear_panel, config.panel_positions),
            dispenser: ToggleServo::with_positions(dispenser, config.dispenser_positions),
            gyro,
            line,
            color,
            flip,
            encoder_drive,
            config,
        })
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    /// Bring every servo to its first endpoint
    pub fn on_start(&mut self) -> Result<()> {
        self.front_panel.on_startup()?;
        self.rear_panel.on_startup()?;
        self.dispenser.on_startup()
    }

    /// Cut power to everything; cancels actions in flight
    pub fn on_stop(&mut self) -> Result<()> {
        info!("Stopping all motors");
        self.stop_drive_motors()?;
        self.set_flipper_power(0.0)?;
        self.harvester.set_power(0.0)
    }

    /// Once per control cycle: retire finished long-running actions
    pub fn tick(&mut self) -> Result<TickReport> {
        let flip = self.flip.poll(&mut self.flipper)?;
        if flip.just_finished() {
            self.flipper.set_free_power_mode()?;
            self.flipper.set_power(0.0)?;
        }

        let encoder_drive = self.encoder_drive.poll(&mut self.drive)?;
        if encoder_drive.just_finished() {
            self.drive.stop()?;
            self.drive.set_free_power_mode()?;
        }

        Ok(TickReport {
            flip,
            encoder_drive,
        })
    }

    pub fn telemetry(&mut self) -> Result<Telemetry> {
        let reading = self.color_reading()?;
        Ok(Telemetry {
            flipping: self.is_flipping(),
            heading: self.gyro.integrated_heading()?,
            line: format!("{:.2}", self.line.raw_reading()?),
            color: format!("r: {}\tb: {}", reading.red, reading.blue),
            encoders: [
                self.drive.lf.current_position()?,
                self.drive.lr.current_position()?,
                self.drive.rf.current_position()?,
                self.drive.rr.current_position()?,
                self.flipper.current_position()?,
            ],
        })
    }

    // The flipper

    /// Start one full flipper revolution; ignored while one is running
    pub fn fire(&mut self) -> Result<bool> {
        let target = self.config.flipper_revolution_ticks;
        self.flip.activate(&mut self.flipper, target)
    }

    pub fn is_flipping(&self) -> bool {
        self.flip.is_active()
    }

    /// Manual flipper power; aborts a revolution in progress
    pub fn set_flipper_power(&mut self, power: f64) -> Result<()> {
        self.flip.override_power(&mut self.flipper, power)
    }

    pub fn stop_flipper_if_not_flipping(&mut self) -> Result<()> {
        if !self.is_flipping() {
            self.flipper.set_power(0.0)?;
        }
        Ok(())
    }

    // Harvesting

    pub fn set_harvester_power(&mut self, power: f64) -> Result<()> {
        self.harvester.set_power(power)
    }

    // Servo control

    pub fn toggle_front_panel(&mut self) -> Result<()> {
        self.front_panel.toggle()
    }

    pub fn toggle_rear_panel(&mut self) -> Result<()> {
        self.rear_panel.toggle()
    }

    pub fn toggle_dispenser(&mut self) -> Result<()> {
        self.dispenser.toggle()
    }

    pub fn set_dispenser(&mut self, first: bool) -> Result<()> {
        self.dispenser.set(first)
    }

    // Sensors

    pub fn line_reading(&mut self) -> Result<f64> {
        self.line.raw_reading()
    }

    pub fn is_calibrating(&mut self) -> Result<bool> {
        self.gyro.is_calibrating()
    }

    pub fn reset_gyro(&mut self) -> Result<()> {
        self.gyro.reset_integrator()
    }

    /// Integrated heading wrapped to (-360, 360), keeping its sign
    pub fn heading(&mut self) -> Result<i32> {
        Ok(self.gyro.integrated_heading()? % 360)
    }

    pub fn color_reading(&mut self) -> Result<ColorReading> {
        Ok(ColorReading::new(self.color.red()?, self.color.blue()?))
    }

    pub fn color_is_red(&mut self) -> Result<bool> {
        Ok(self.color_reading()?.is_red(self.config.color_threshold))
    }

    pub fn color_is_blue(&mut self) -> Result<bool> {
        Ok(self.color_reading()?.is_blue(self.config.color_threshold))
    }

    pub fn alliance_color(&mut self) -> Result<Option<AllianceColor>> {
        Ok(self.color_reading()?.classify(self.config.color_threshold))
    }

    pub fn color_alpha(&mut self) -> Result<i32> {
        self.color.alpha()
    }

    // Driving

    /// Open-loop drive; aborts an encoder drive in progress
    pub fn drive(&mut self, direction: f64, velocity: f64, rotation: f64) -> Result<()> {
        self.encoder_drive.cancel(&mut self.drive)?;
        let intent = DriveIntent::new(direction, velocity, rotation);
        self.drive.set_powers(intent.wheel_powers())
    }

    /// Translate while steering back toward the zero heading
    pub fn drive_preserving_direction(&mut self, direction: f64, velocity: f64) -> Result<()> {
        let angle = self.gyro.integrated_heading()?;
        let rotation = heading_correction(angle);
        debug!("Heading {} -> correction {:.3}", angle, rotation);
        self.drive(direction, velocity, rotation)
    }

    /// Shut down the drive; aborts an encoder drive in progress
    pub fn stop_drive_motors(&mut self) -> Result<()> {
        self.encoder_drive.cancel(&mut self.drive)?;
        self.drive.stop()
    }

    // Encoder driving

    /// True only while every drive wheel is still moving toward its target
    pub fn drive_motors_busy(&mut self) -> Result<bool> {
        self.drive.all_progressing()
    }

    pub fn is_encoder_driving(&self) -> bool {
        self.encoder_drive.is_active()
    }

    /// Distance in tiles, truncated to whole inches
    pub fn encoder_drive_tiles(&mut self, direction: f64, tiles: f64) -> Result<bool> {
        self.encoder_drive_inches(direction, (INCHES_PER_TILE * tiles).trunc())
    }

    pub fn encoder_drive_inches(&mut self, direction: f64, inches: f64) -> Result<bool> {
        let ticks = (inches * self.config.ticks_per_inch) as i32;
        self.encoder_drive_ticks(direction, ticks)
    }

    pub fn encoder_drive_cm(&mut self, direction: f64, cm: f64) -> Result<bool> {
        let ticks = (cm * self.config.ticks_per_cm()) as i32;
        self.encoder_drive_ticks(direction, ticks)
    }

    /// Returns `false` if an encoder drive is already running
    fn encoder_drive_ticks(&mut self, direction: f64, ticks: i32) -> Result<bool> {
        let targets = encoder_targets(direction, ticks);
        debug!("Encoder drive {} ticks -> {:?}", ticks, targets);
        self.encoder_drive.activate(&mut self.drive, targets)
    }

    /// Zero the drive encoders and return to open-loop driving
    pub fn reset_drive_motor_modes(&mut self) -> Result<()> {
        self.encoder_drive.cancel(&mut self.drive)?;
        self.drive.reset_position_reference()?;
        self.drive.set_free_power_mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FLIPPER_REVOLUTION_TICKS;
    use crate::hardware::sim::{MotorMode, SimHardware, SimRig};
    use std::f64::consts::FRAC_PI_2;

    fn robot() -> (MecanumRobot<SimHardware>, SimRig) {
        robot_with(RobotConfig::default())
    }

    fn robot_with(config: RobotConfig) -> (MecanumRobot<SimHardware>, SimRig) {
        let rig = SimRig::new();
        let robot = MecanumRobot::new(rig.devices(), config).unwrap();
        (robot, rig)
    }

    #[test]
    fn test_setup_configures_devices() {
        let (mut robot, rig) = robot();
        assert!(rig.rf.is_inverted());
        assert!(rig.rr.is_inverted());
        assert!(!rig.lf.is_inverted());
        assert!(!rig.lr.is_inverted());
        assert!(!rig.color.led_enabled());
        assert!(robot.is_calibrating().unwrap());
        // Servos are untouched until start
        assert_eq!(rig.dispenser.position(), None);
    }

    #[test]
    fn test_on_start_homes_servos() {
        let (mut robot, rig) = robot();
        robot.toggle_front_panel().unwrap();
        robot.set_dispenser(false).unwrap();
        robot.on_start().unwrap();
        assert_eq!(rig.front_panel.position(), Some(0.0));
        assert_eq!(rig.rear_panel.position(), Some(0.0));
        assert_eq!(rig.dispenser.position(), Some(0.0));

        robot.toggle_dispenser().unwrap();
        assert_eq!(rig.dispenser.position(), Some(0.3));
        robot.toggle_rear_panel().unwrap();
        assert_eq!(rig.rear_panel.position(), Some(1.0));
    }

    #[test]
    fn test_fire_runs_one_revolution() {
        let (mut robot, rig) = robot();
        assert!(robot.fire().unwrap());
        assert!(robot.is_flipping());
        assert_eq!(
            rig.flipper.mode(),
            MotorMode::PositionTarget(FLIPPER_REVOLUTION_TICKS)
        );

        let mut ticks = 0;
        while robot.is_flipping() {
            rig.step();
            robot.tick().unwrap();
            ticks += 1;
            assert!(ticks < 100, "flip never finished");
        }
        assert_eq!(rig.flipper.position(), FLIPPER_REVOLUTION_TICKS);
        assert_eq!(rig.flipper.power(), 0.0);
        assert_eq!(rig.flipper.mode(), MotorMode::FreePower);
    }

    #[test]
    fn test_fire_while_flipping_is_ignored() {
        let (mut robot, rig) = robot();
        robot.fire().unwrap();
        rig.step();
        let position = rig.flipper.position();
        assert!(!robot.fire().unwrap());
        assert_eq!(rig.flipper.position(), position);
    }

    #[test]
    fn test_manual_flipper_power_overrides_fire() {
        let (mut robot, rig) = robot();
        robot.fire().unwrap();
        rig.step();
        robot.set_flipper_power(-0.5).unwrap();
        assert!(!robot.is_flipping());
        assert_eq!(rig.flipper.mode(), MotorMode::FreePower);
        assert_eq!(rig.flipper.power(), -0.5);

        // Idle tick leaves manual power alone
        rig.step();
        let report = robot.tick().unwrap();
        assert_eq!(report.flip, ActionStatus::Idle);
        assert_eq!(rig.flipper.power(), -0.5);
    }

    #[test]
    fn test_stop_flipper_if_not_flipping() {
        let (mut robot, rig) = robot();
        robot.fire().unwrap();
        robot.stop_flipper_if_not_flipping().unwrap();
        assert_eq!(rig.flipper.power(), 1.0);

        robot.set_flipper_power(0.4).unwrap();
        robot.stop_flipper_if_not_flipping().unwrap();
        assert_eq!(rig.flipper.power(), 0.0);
    }

    #[test]
    fn test_drive_forward() {
        let (mut robot, rig) = robot();
        robot.drive(0.0, 0.5, 0.0).unwrap();
        for m in rig.wheels() {
            assert!((m.power() - 0.5).abs() < 1e-9);
        }
        robot.stop_drive_motors().unwrap();
        assert!(rig.wheels().iter().all(|m| m.power() == 0.0));
    }

    #[test]
    fn test_heading_correction_shape() {
        assert_eq!(heading_correction(0), 0.0);
        assert_eq!(heading_correction(1), 0.0);
        assert!((heading_correction(10) - 10f64.ln()).abs() < 1e-12);
        assert!((heading_correction(-10) + 10f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_drive_preserving_direction() {
        let (mut robot, rig) = robot();
        rig.gyro.set_heading(0);
        robot.drive_preserving_direction(0.0, 0.5).unwrap();
        for m in rig.wheels() {
            assert!((m.power() - 0.5).abs() < 1e-9);
        }

        // ln(3) > 1, so pure correction saturates; the sign follows the heading
        rig.gyro.set_heading(-3);
        robot.drive_preserving_direction(0.0, 0.0).unwrap();
        assert!((rig.lf.power() + 1.0).abs() < 1e-9);
        assert!((rig.rf.power() - 1.0).abs() < 1e-9);
        assert!((rig.lr.power() + 1.0).abs() < 1e-9);
        assert!((rig.rr.power() - 1.0).abs() < 1e-9);

        // Correction shifts the translation without swamping it
        rig.gyro.set_heading(2);
        robot.drive_preserving_direction(0.0, 0.5).unwrap();
        let r = 2f64.ln();
        assert!((rig.lf.power() - (0.5 + r) / (0.5 + r)).abs() < 1e-9);
        assert!((rig.rf.power() - (0.5 - r) / (0.5 + r)).abs() < 1e-9);
    }

    #[test]
    fn test_heading_wraps() {
        let (mut robot, rig) = robot();
        rig.gyro.set_heading(725);
        assert_eq!(robot.heading().unwrap(), 5);
        rig.gyro.set_heading(-370);
        assert_eq!(robot.heading().unwrap(), -10);
        robot.reset_gyro().unwrap();
        assert_eq!(robot.heading().unwrap(), 0);
    }

    #[test]
    fn test_color_sensor() {
        let (mut robot, rig) = robot();
        rig.color.set_channels(3, 1, 7);
        assert!(robot.color_is_red().unwrap());
        assert!(!robot.color_is_blue().unwrap());
        assert_eq!(robot.alliance_color().unwrap(), Some(AllianceColor::Red));
        assert_eq!(robot.color_alpha().unwrap(), 7);

        rig.color.set_channels(2, 5, 0);
        assert_eq!(robot.alliance_color().unwrap(), Some(AllianceColor::Blue));

        rig.color.set_channels(1, 1, 0);
        assert_eq!(robot.alliance_color().unwrap(), None);
    }

    #[test]
    fn test_encoder_drive_completes() {
        let (mut robot, rig) = robot();
        assert!(robot.encoder_drive_inches(0.0, 12.0).unwrap());
        assert!(robot.is_encoder_driving());
        assert!(robot.drive_motors_busy().unwrap());
        let ticks = (12.0 * RobotConfig::default().ticks_per_inch) as i32;
        assert_eq!(rig.lf.mode(), MotorMode::PositionTarget(ticks));
        assert_eq!(rig.rr.power(), 0.35);

        // Second request while running is ignored
        assert!(!robot.encoder_drive_inches(FRAC_PI_2, 50.0).unwrap());
        assert_eq!(rig.lf.mode(), MotorMode::PositionTarget(ticks));

        let mut report = robot.tick().unwrap();
        let mut n = 0;
        while !report.encoder_drive.just_finished() {
            rig.step();
            report = robot.tick().unwrap();
            n += 1;
            assert!(n < 1000, "encoder drive never finished");
        }
        assert_eq!(report.encoder_drive, ActionStatus::Completed);
        assert!(!robot.is_encoder_driving());
        assert!(!robot.drive_motors_busy().unwrap());
        for m in rig.wheels() {
            assert_eq!(m.power(), 0.0);
            assert_eq!(m.mode(), MotorMode::FreePower);
        }
    }

    #[test]
    fn test_encoder_drive_units() {
        let (mut robot, rig) = robot();
        let cfg = RobotConfig::default();

        robot.encoder_drive_cm(0.0, 30.0).unwrap();
        let ticks = (30.0 * cfg.ticks_per_cm()) as i32;
        assert_eq!(rig.rf.mode(), MotorMode::PositionTarget(ticks));
        robot.reset_drive_motor_modes().unwrap();

        // 1.3 tiles is 31.2 inches, truncated to 31
        robot.encoder_drive_tiles(0.0, 1.3).unwrap();
        let ticks = (31.0 * cfg.ticks_per_inch) as i32;
        assert_eq!(rig.lr.mode(), MotorMode::PositionTarget(ticks));
    }

    #[test]
    fn test_manual_drive_overrides_encoder_drive() {
        let (mut robot, rig) = robot();
        robot.encoder_drive_inches(0.0, 24.0).unwrap();
        rig.step();
        robot.drive(0.0, 0.2, 0.0).unwrap();
        assert!(!robot.is_encoder_driving());
        for m in rig.wheels() {
            assert_eq!(m.mode(), MotorMode::FreePower);
            assert!((m.power() - 0.2).abs() < 1e-9);
        }
        assert_eq!(robot.tick().unwrap().encoder_drive, ActionStatus::Idle);
    }

    #[test]
    fn test_stalled_flip_times_out_when_configured() {
        let config = RobotConfig {
            action_timeout_ticks: Some(10),
            ..RobotConfig::default()
        };
        let (mut robot, rig) = robot_with(config);
        assert_eq!(robot.config().action_timeout_ticks, Some(10));
        rig.flipper.set_stalled(true);
        robot.fire().unwrap();

        let mut last = ActionStatus::Running;
        for _ in 0..10 {
            rig.step();
            last = robot.tick().unwrap().flip;
        }
        assert_eq!(last, ActionStatus::TimedOut);
        assert_eq!(rig.flipper.power(), 0.0);
    }

    #[test]
    fn test_on_stop_cuts_everything() {
        let (mut robot, rig) = robot();
        robot.fire().unwrap();
        robot.set_harvester_power(0.8).unwrap();
        robot.drive(0.0, 1.0, 0.0).unwrap();
        robot.on_stop().unwrap();
        assert!(!robot.is_flipping());
        assert_eq!(rig.flipper.power(), 0.0);
        assert_eq!(rig.harvester.power(), 0.0);
        assert!(rig.wheels().iter().all(|m| m.power() == 0.0));
    }

    #[test]
    fn test_telemetry() {
        let (mut robot, rig) = robot();
        rig.gyro.set_heading(412);
        rig.line.set_reading(0.4567);
        rig.color.set_channels(4, 1, 0);
        rig.lf.set_position(1);
        rig.lr.set_position(2);
        rig.rf.set_position(3);
        rig.rr.set_position(4);
        rig.flipper.set_position(5);

        let t = robot.telemetry().unwrap();
        assert!(!t.flipping);
        assert_eq!(t.heading, 412);
        assert_eq!(t.line, "0.46");
        assert_eq!(t.color, "r: 4\tb: 1");
        assert_eq!(t.encoders, [1, 2, 3, 4, 5]);

        let entries = t.entries();
        assert_eq!(entries[0], ("Flipping", "No".to_string()));
        assert_eq!(entries[4], ("Encoders", "1\t2\t3\t4\t5".to_string()));
    }

    #[test]
    fn test_hardware_error_propagates() {
        let (mut robot, rig) = robot();
        rig.flipper.set_connected(false);
        assert!(robot.fire().is_err());
        assert!(!robot.is_flipping());
        assert!(robot.telemetry().is_err());
    }
}
