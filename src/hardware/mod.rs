// Hardware collaborator interfaces
//
// The control layer never talks to a device directly. Every motor, servo and
// sensor is reached through one of the traits below, and the concrete handles
// are handed to the robot by the host (no lookup by name).

pub mod sim;

pub use sim::{SimColorSensor, SimGyro, SimHardware, SimLineSensor, SimMotor, SimRig, SimServo};

/// Errors reported by a hardware collaborator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HardwareError {
    #[error("Device {device} is disconnected")]
    Disconnected { device: String },

    #[error("Device {device} rejected command: {reason}")]
    Rejected { device: String, reason: String },
}

pub type Result<T> = std::result::Result<T, HardwareError>;

/// DC motor with an encoder
///
/// Power is normalized to [-1.0, 1.0]. Positions are encoder ticks relative to
/// the last call to `reset_position_reference`.
pub trait Motor {
    /// Apply power. In position-target mode this is the speed limit used to
    /// reach the target.
    fn set_power(&mut self, power: f64) -> Result<()>;

    /// Enter position-target mode and seek `target`
    fn set_position_target(&mut self, target: i32) -> Result<()>;

    /// Leave position-target mode; power is applied directly
    fn set_free_power_mode(&mut self) -> Result<()>;

    /// Zero the encoder at the current shaft position
    fn reset_position_reference(&mut self) -> Result<()>;

    fn current_position(&mut self) -> Result<i32>;

    /// True while in position-target mode and still moving toward the target
    fn is_progressing_toward_target(&mut self) -> Result<bool>;

    fn set_direction_inverted(&mut self, inverted: bool) -> Result<()>;
}

/// Position servo, commanded in [0.0, 1.0]
pub trait Servo {
    fn move_to(&mut self, position: f64) -> Result<()>;
}

/// Integrating gyro
pub trait HeadingSensor {
    /// Integrated heading in degrees. Not wrapped.
    fn integrated_heading(&mut self) -> Result<i32>;

    fn is_calibrating(&mut self) -> Result<bool>;

    fn reset_integrator(&mut self) -> Result<()>;

    /// Start calibration. Completion is observed through `is_calibrating`.
    fn calibrate(&mut self) -> Result<()>;
}

/// Optical reflectance sensor used for line detection
pub trait ReflectanceSensor {
    fn raw_reading(&mut self) -> Result<f64>;
}

/// RGB color sensor
pub trait ColorSensor {
    fn red(&mut self) -> Result<i32>;
    fn blue(&mut self) -> Result<i32>;
    fn alpha(&mut self) -> Result<i32>;
    fn enable_led(&mut self, enabled: bool) -> Result<()>;
}

/// A concrete set of device types the robot can be built from
pub trait Hardware {
    type Motor: Motor;
    type Servo: Servo;
    type Gyro: HeadingSensor;
    type Line: ReflectanceSensor;
    type Color: ColorSensor;
}

/// Every device the robot needs, resolved by the host
pub struct RobotDevices<H: Hardware> {
    pub lf: H::Motor,
    pub rf: H::Motor,
    pub lr: H::Motor,
    pub rr: H::Motor,
    pub flipper: H::Motor,
    pub harvester: H::Motor,
    pub front_panel: H::Servo,
    pub rear_panel: H::Servo,
    pub dispenser: H::Servo,
    pub gyro: H::Gyro,
    pub line: H::Line,
    pub color: H::Color,
}
