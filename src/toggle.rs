// Two-position servo actuator (panels, dispenser)

use tracing::debug;

use crate::hardware::{Result, Servo};

/// A servo that only ever sits at one of two calibrated endpoints
pub struct ToggleServo<S> {
    servo: S,
    first_position: f64,
    second_position: f64,
    first: bool,
}

impl<S: Servo> ToggleServo<S> {
    /// Nothing is commanded until `on_startup`, `set` or `toggle`
    pub fn new(servo: S, first_position: f64, second_position: f64) -> Self {
        Self {
            servo,
            first_position,
            second_position,
            first: true,
        }
    }

    pub fn with_positions(servo: S, (first, second): (f64, f64)) -> Self {
        Self::new(servo, first, second)
    }

    /// Force the physical servo to the first endpoint
    ///
    /// The servo may hold a stale position across a power cycle, so the
    /// in-memory flag is not trusted here.
    pub fn on_startup(&mut self) -> Result<()> {
        self.set(true)
    }

    /// The flag only changes once the servo accepts the move
    pub fn set(&mut self, first: bool) -> Result<()> {
        let position = self.endpoint(first);
        debug!("Toggle servo to {} ({})", position, if first { "first" } else { "second" });
        self.servo.move_to(position)?;
        self.first = first;
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<()> {
        self.set(!self.first)
    }

    pub fn is_first(&self) -> bool {
        self.first
    }

    /// The endpoint matching the current flag
    pub fn position(&self) -> f64 {
        self.endpoint(self.first)
    }

    fn endpoint(&self, first: bool) -> f64 {
        if first {
            self.first_position
        } else {
            self.second_position
        }
    }
}
