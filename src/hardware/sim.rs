// Simulated devices
//
// Each handle is a cheap clone over shared state, so the host loop (or a test)
// can keep a copy to advance the physics and inspect what was commanded after
// the originals have been moved into the robot. Single-threaded only.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::{
    ColorSensor, Hardware, HardwareError, HeadingSensor, Motor, ReflectanceSensor, Result,
    RobotDevices, Servo,
};

/// Encoder ticks a simulated motor covers per step at full power
pub const DEFAULT_TICKS_PER_STEP: f64 = 40.0;

/// Steps a simulated gyro spends calibrating
pub const GYRO_CALIBRATION_STEPS: u32 = 3;

fn disconnected(device: &str) -> HardwareError {
    HardwareError::Disconnected {
        device: device.to_string(),
    }
}

/// Motor control mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorMode {
    FreePower,
    PositionTarget(i32),
}

#[derive(Debug)]
struct MotorState {
    name: String,
    power: f64,
    mode: MotorMode,
    position: f64,
    inverted: bool,
    stalled: bool,
    connected: bool,
    ticks_per_step: f64,
}

/// Simulated encoder motor
#[derive(Debug, Clone)]
pub struct SimMotor {
    state: Rc<RefCell<MotorState>>,
}

impl SimMotor {
    pub fn new(name: &str) -> Self {
        Self::with_ticks_per_step(name, DEFAULT_TICKS_PER_STEP)
    }

    pub fn with_ticks_per_step(name: &str, ticks_per_step: f64) -> Self {
        Self {
            state: Rc::new(RefCell::new(MotorState {
                name: name.to_string(),
                power: 0.0,
                mode: MotorMode::FreePower,
                position: 0.0,
                inverted: false,
                stalled: false,
                connected: true,
                ticks_per_step,
            })),
        }
    }

    /// Advance the motor by one control tick
    pub fn step(&self) {
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;
        if s.stalled || !s.connected {
            return;
        }
        let reach = s.power.abs() * s.ticks_per_step;
        match s.mode {
            MotorMode::FreePower => s.position += s.power * s.ticks_per_step,
            MotorMode::PositionTarget(target) => {
                let remaining = target as f64 - s.position;
                if remaining.abs() <= reach {
                    s.position = target as f64;
                } else {
                    s.position += reach * remaining.signum();
                }
            }
        }
    }

    pub fn power(&self) -> f64 {
        self.state.borrow().power
    }

    pub fn mode(&self) -> MotorMode {
        self.state.borrow().mode
    }

    pub fn position(&self) -> i32 {
        self.state.borrow().position.round() as i32
    }

    /// Place the shaft at an arbitrary encoder position
    pub fn set_position(&self, position: i32) {
        self.state.borrow_mut().position = position as f64;
    }

    pub fn is_inverted(&self) -> bool {
        self.state.borrow().inverted
    }

    /// A stalled motor stops moving but keeps reporting progress
    pub fn set_stalled(&self, stalled: bool) {
        self.state.borrow_mut().stalled = stalled;
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.borrow_mut().connected = connected;
    }

    fn check(&self) -> Result<()> {
        let s = self.state.borrow();
        if s.connected {
            Ok(())
        } else {
            Err(disconnected(&s.name))
        }
    }
}

impl Motor for SimMotor {
    fn set_power(&mut self, power: f64) -> Result<()> {
        self.check()?;
        let mut s = self.state.borrow_mut();
        if !(-1.0..=1.0).contains(&power) {
            return Err(HardwareError::Rejected {
                device: s.name.clone(),
                reason: format!("power {} outside [-1, 1]", power),
            });
        }
        s.power = power;
        Ok(())
    }

    fn set_position_target(&mut self, target: i32) -> Result<()> {
        self.check()?;
        let mut s = self.state.borrow_mut();
        debug!("{}: position target {}", s.name, target);
        s.mode = MotorMode::PositionTarget(target);
        Ok(())
    }

    fn set_free_power_mode(&mut self) -> Result<()> {
        self.check()?;
        self.state.borrow_mut().mode = MotorMode::FreePower;
        Ok(())
    }

    fn reset_position_reference(&mut self) -> Result<()> {
        self.check()?;
        self.state.borrow_mut().position = 0.0;
        Ok(())
    }

    fn current_position(&mut self) -> Result<i32> {
        self.check()?;
        Ok(self.position())
    }

    fn is_progressing_toward_target(&mut self) -> Result<bool> {
        self.check()?;
        let s = self.state.borrow();
        Ok(match s.mode {
            MotorMode::PositionTarget(target) => {
                s.power != 0.0 && s.position.round() as i32 != target
            }
            MotorMode::FreePower => false,
        })
    }

    fn set_direction_inverted(&mut self, inverted: bool) -> Result<()> {
        self.check()?;
        self.state.borrow_mut().inverted = inverted;
        Ok(())
    }
}

/// Simulated position servo; remembers every commanded position
#[derive(Debug, Clone, Default)]
pub struct SimServo {
    history: Rc<RefCell<Vec<f64>>>,
}

impl SimServo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last commanded position, if any
    pub fn position(&self) -> Option<f64> {
        self.history.borrow().last().copied()
    }

    pub fn history(&self) -> Vec<f64> {
        self.history.borrow().clone()
    }
}

impl Servo for SimServo {
    fn move_to(&mut self, position: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&position) {
            return Err(HardwareError::Rejected {
                device: "servo".to_string(),
                reason: format!("position {} outside [0, 1]", position),
            });
        }
        self.history.borrow_mut().push(position);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct GyroState {
    heading: i32,
    calibration_steps: u32,
}

/// Simulated integrating gyro
#[derive(Debug, Clone, Default)]
pub struct SimGyro {
    state: Rc<RefCell<GyroState>>,
}

impl SimGyro {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_heading(&self, degrees: i32) {
        self.state.borrow_mut().heading = degrees;
    }

    pub fn step(&self) {
        let mut s = self.state.borrow_mut();
        s.calibration_steps = s.calibration_steps.saturating_sub(1);
    }
}

impl HeadingSensor for SimGyro {
    fn integrated_heading(&mut self) -> Result<i32> {
        Ok(self.state.borrow().heading)
    }

    fn is_calibrating(&mut self) -> Result<bool> {
        Ok(self.state.borrow().calibration_steps > 0)
    }

    fn reset_integrator(&mut self) -> Result<()> {
        self.state.borrow_mut().heading = 0;
        Ok(())
    }

    fn calibrate(&mut self) -> Result<()> {
        self.state.borrow_mut().calibration_steps = GYRO_CALIBRATION_STEPS;
        Ok(())
    }
}

/// Simulated reflectance sensor
#[derive(Debug, Clone, Default)]
pub struct SimLineSensor {
    reading: Rc<RefCell<f64>>,
}

impl SimLineSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reading(&self, reading: f64) {
        *self.reading.borrow_mut() = reading;
    }
}

impl ReflectanceSensor for SimLineSensor {
    fn raw_reading(&mut self) -> Result<f64> {
        Ok(*self.reading.borrow())
    }
}

#[derive(Debug, Default)]
struct ColorState {
    red: i32,
    blue: i32,
    alpha: i32,
    led: bool,
}

/// Simulated RGB sensor
#[derive(Debug, Clone, Default)]
pub struct SimColorSensor {
    state: Rc<RefCell<ColorState>>,
}

impl SimColorSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_channels(&self, red: i32, blue: i32, alpha: i32) {
        let mut s = self.state.borrow_mut();
        s.red = red;
        s.blue = blue;
        s.alpha = alpha;
    }

    pub fn led_enabled(&self) -> bool {
        self.state.borrow().led
    }
}

impl ColorSensor for SimColorSensor {
    fn red(&mut self) -> Result<i32> {
        Ok(self.state.borrow().red)
    }

    fn blue(&mut self) -> Result<i32> {
        Ok(self.state.borrow().blue)
    }

    fn alpha(&mut self) -> Result<i32> {
        Ok(self.state.borrow().alpha)
    }

    fn enable_led(&mut self, enabled: bool) -> Result<()> {
        self.state.borrow_mut().led = enabled;
        Ok(())
    }
}

/// Device types of the simulated robot
#[derive(Debug)]
pub struct SimHardware;

impl Hardware for SimHardware {
    type Motor = SimMotor;
    type Servo = SimServo;
    type Gyro = SimGyro;
    type Line = SimLineSensor;
    type Color = SimColorSensor;
}

/// A complete simulated robot: the host keeps the rig and hands
/// `devices()` to the robot
#[derive(Debug, Clone)]
pub struct SimRig {
    pub lf: SimMotor,
    pub rf: SimMotor,
    pub lr: SimMotor,
    pub rr: SimMotor,
    pub flipper: SimMotor,
    pub harvester: SimMotor,
    pub front_panel: SimServo,
    pub rear_panel: SimServo,
    pub dispenser: SimServo,
    pub gyro: SimGyro,
    pub line: SimLineSensor,
    pub color: SimColorSensor,
}

impl SimRig {
    pub fn new() -> Self {
        Self {
            lf: SimMotor::new("lf"),
            rf: SimMotor::new("rf"),
            lr: SimMotor::new("lr"),
            rr: SimMotor::new("rr"),
            flipper: SimMotor::new("flipper"),
            harvester: SimMotor::new("harvester"),
            front_panel: SimServo::new(),
            rear_panel: SimServo::new(),
            dispenser: SimServo::new(),
            gyro: SimGyro::new(),
            line: SimLineSensor::new(),
            color: SimColorSensor::new(),
        }
    }

    pub fn devices(&self) -> RobotDevices<SimHardware> {
        RobotDevices {
            lf: self.lf.clone(),
            rf: self.rf.clone(),
            lr: self.lr.clone(),
            rr: self.rr.clone(),
            flipper: self.flipper.clone(),
            harvester: self.harvester.clone(),
            front_panel: self.front_panel.clone(),
            rear_panel: self.rear_panel.clone(),
            dispenser: self.dispenser.clone(),
            gyro: self.gyro.clone(),
            line: self.line.clone(),
            color: self.color.clone(),
        }
    }

    /// Wheel motors in [lf, rf, lr, rr] order
    pub fn wheels(&self) -> [&SimMotor; 4] {
        [&self.lf, &self.rf, &self.lr, &self.rr]
    }

    /// Advance every device by one control tick
    pub fn step(&self) {
        for motor in [
            &self.lf,
            &self.rf,
            &self.lr,
            &self.rr,
            &self.flipper,
            &self.harvester,
        ] {
            motor.step();
        }
        self.gyro.step();
    }
}

impl Default for SimRig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_power_moves_encoder() {
        let mut motor = SimMotor::with_ticks_per_step("m", 10.0);
        motor.set_power(0.5).unwrap();
        motor.step();
        motor.step();
        assert_eq!(motor.current_position().unwrap(), 10);
        assert!(!motor.is_progressing_toward_target().unwrap());
    }

    #[test]
    fn test_position_target_arrives_and_stops() {
        let mut motor = SimMotor::with_ticks_per_step("m", 10.0);
        motor.set_position_target(25).unwrap();
        motor.set_power(1.0).unwrap();
        assert!(motor.is_progressing_toward_target().unwrap());

        motor.step();
        motor.step();
        assert_eq!(motor.position(), 20);
        motor.step();
        assert_eq!(motor.position(), 25);
        assert!(!motor.is_progressing_toward_target().unwrap());

        // Holds the target
        motor.step();
        assert_eq!(motor.position(), 25);
    }

    #[test]
    fn test_stalled_motor_stays_busy() {
        let mut motor = SimMotor::new("m");
        motor.set_position_target(500).unwrap();
        motor.set_power(1.0).unwrap();
        motor.set_stalled(true);
        for _ in 0..100 {
            motor.step();
        }
        assert_eq!(motor.position(), 0);
        assert!(motor.is_progressing_toward_target().unwrap());
    }

    #[test]
    fn test_disconnected_motor_errors() {
        let mut motor = SimMotor::new("flipper");
        motor.set_connected(false);
        assert_eq!(
            motor.set_power(0.1),
            Err(HardwareError::Disconnected {
                device: "flipper".to_string()
            })
        );
        assert!(motor.current_position().is_err());
    }

    #[test]
    fn test_power_out_of_range_rejected() {
        let mut motor = SimMotor::new("m");
        assert!(matches!(
            motor.set_power(1.5),
            Err(HardwareError::Rejected { .. })
        ));
        assert_eq!(motor.power(), 0.0);
    }

    #[test]
    fn test_gyro_calibration_finishes() {
        let mut gyro = SimGyro::new();
        gyro.calibrate().unwrap();
        assert!(gyro.is_calibrating().unwrap());
        for _ in 0..GYRO_CALIBRATION_STEPS {
            gyro.step();
        }
        assert!(!gyro.is_calibrating().unwrap());
    }

    #[test]
    fn test_rig_handles_share_state() {
        let rig = SimRig::new();
        let mut devices = rig.devices();
        devices.lf.set_power(0.25).unwrap();
        devices.dispenser.move_to(0.3).unwrap();
        assert_eq!(rig.lf.power(), 0.25);
        assert_eq!(rig.dispenser.position(), Some(0.3));
    }
}
