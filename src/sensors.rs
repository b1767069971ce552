// Color classification for beacon / alliance detection

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllianceColor {
    Red,
    Blue,
}

/// One read of the color channels we care about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorReading {
    pub red: i32,
    pub blue: i32,
}

impl ColorReading {
    pub fn new(red: i32, blue: i32) -> Self {
        Self { red, blue }
    }

    /// Red is above the noise threshold and beats blue
    pub fn is_red(&self, threshold: i32) -> bool {
        self.red > threshold && self.red > self.blue
    }

    pub fn is_blue(&self, threshold: i32) -> bool {
        self.blue > threshold && self.blue > self.red
    }

    /// The dominant color, or `None` if neither clears the threshold
    pub fn classify(&self, threshold: i32) -> Option<AllianceColor> {
        if self.is_red(threshold) {
            Some(AllianceColor::Red)
        } else if self.is_blue(threshold) {
            Some(AllianceColor::Blue)
        } else {
            None
        }
    }
}
