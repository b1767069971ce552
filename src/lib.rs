// Motion and actuator control for a four-wheel mecanum robot
//
// - motor: mecanum kinematics and the four-wheel drive group
// - action: non-blocking long-running actions (flipper, encoder driving)
// - toggle: two-position servos
// - robot: the facade the host loop drives once per tick
// - runtime: zenoh-fed control loop over the simulated rig

pub mod action;
pub mod config;
pub mod hardware;
pub mod messages;
pub mod motor;
pub mod robot;
pub mod runtime;
pub mod sensors;
pub mod toggle;

pub use robot::{MecanumRobot, Telemetry, TickReport};
