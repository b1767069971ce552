// Timeouts, topics, mechanism calibration
use std::f64::consts::PI;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD: &str = "mecanum/cmd"; // commands
pub const TOPIC_TELEMETRY: &str = "mecanum/telemetry"; // operator display
pub const TOPIC_HEALTH: &str = "mecanum/state/health"; // health status

// Flipper: one output revolution through the 22:16 gearing on a 1120 tick motor
pub const FLIPPER_REVOLUTION_TICKS: i32 = (1120 * 22) / 16;
pub const FLIPPER_CLOSE_ENOUGH: i32 = 2;
pub const FLIPPER_POWER: f64 = 1.0;

// Encoder driving, assuming 4" wheels
pub const TICKS_PER_INCH: f64 = 1140.0 / (PI * 4.0);
pub const TICKS_PER_CM: f64 = TICKS_PER_INCH / 2.54;
pub const INCHES_PER_TILE: f64 = 24.0;
pub const ENCODER_DRIVE_POWER: f64 = 0.35;
pub const ENCODER_DRIVE_CLOSE_ENOUGH: i32 = 2;

// Below this a color channel is noise
pub const COLOR_THRESHOLD: i32 = 2;

// Servo endpoints (first, second)
pub const PANEL_POSITIONS: (f64, f64) = (0.0, 1.0);
pub const DISPENSER_POSITIONS: (f64, f64) = (0.0, 0.3);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Robot tunables. Every field falls back to the constants above.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub flipper_revolution_ticks: i32,
    pub flipper_close_enough: i32,
    pub flipper_power: f64,
    pub ticks_per_inch: f64,
    pub encoder_drive_power: f64,
    pub encoder_drive_close_enough: i32,
    pub color_threshold: i32,
    pub panel_positions: (f64, f64),
    pub dispenser_positions: (f64, f64),
    /// Retire a long-running action after this many polls. `None` waits forever.
    pub action_timeout_ticks: Option<u32>,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            flipper_revolution_ticks: FLIPPER_REVOLUTION_TICKS,
            flipper_close_enough: FLIPPER_CLOSE_ENOUGH,
            flipper_power: FLIPPER_POWER,
            ticks_per_inch: TICKS_PER_INCH,
            encoder_drive_power: ENCODER_DRIVE_POWER,
            encoder_drive_close_enough: ENCODER_DRIVE_CLOSE_ENOUGH,
            color_threshold: COLOR_THRESHOLD,
            panel_positions: PANEL_POSITIONS,
            dispenser_positions: DISPENSER_POSITIONS,
            action_timeout_ticks: None,
        }
    }
}

impl RobotConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn ticks_per_cm(&self) -> f64 {
        self.ticks_per_inch / 2.54
    }
}
