// Motor control module for the mecanum base
//
// Provides:
// - Mecanum inverse kinematics (drive intent -> wheel powers)
// - The four-wheel drive group and encoder-distance targets

mod group;
pub mod kinematics;

pub use group::{DriveMotors, encoder_targets};
pub use kinematics::{DriveIntent, WheelPowers, compute_wheel_powers, normalize_direction};
