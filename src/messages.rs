// Define message types for the runtime

use serde::{Deserialize, Serialize};

/// Which toggle servo a command refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServoId {
    FrontPanel,
    RearPanel,
    Dispenser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    Inches,
    Cm,
    Tiles,
}

// Command from teleop/scripts -> runtime
// Tagged by "type", e.g. {"type": "drive", "direction": 0.0, "velocity": 0.5, "rotation": 0.0}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RobotCommand {
    /// Open-loop drive; refreshes the watchdog
    Drive {
        direction: f64,
        velocity: f64,
        rotation: f64,
    },
    /// Translate with gyro heading hold; refreshes the watchdog
    HoldHeading { direction: f64, velocity: f64 },
    Stop,
    EncoderDrive {
        direction: f64,
        distance: f64,
        #[serde(default)]
        unit: DistanceUnit,
    },
    Fire,
    FlipperPower { power: f64 },
    HarvesterPower { power: f64 },
    Toggle { servo: ServoId },
    SetDispenser { first: bool },
    ResetGyro,
}

impl RobotCommand {
    /// Continuous commands go stale if the sender stops repeating them
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            RobotCommand::Drive { .. } | RobotCommand::HoldHeading { .. }
        )
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    HardwareFault,
}
