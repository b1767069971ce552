// Long-running actuator actions
//
// An action commands an actuator to a position target and is then polled once
// per control tick until it arrives. Nothing here blocks: the actuator's own
// firmware does the motion, this side only issues the target and watches.

use std::fmt::Debug;

use tracing::{debug, info, warn};

use crate::hardware::{Motor, Result};

/// Something that can be driven to a position target and watched
pub trait Trackable {
    type Target: Copy + Debug + PartialEq;

    /// Zero the position reference, then seek `target` at `power`
    fn start(&mut self, target: Self::Target, power: f64) -> Result<()>;

    fn within_tolerance(&mut self, target: Self::Target, tolerance: i32) -> Result<bool>;

    /// True while still moving toward the target
    fn is_progressing(&mut self) -> Result<bool>;

    /// Return to free-power mode
    fn release(&mut self) -> Result<()>;

    fn apply_power(&mut self, power: f64) -> Result<()>;
}

impl<M: Motor> Trackable for M {
    type Target = i32;

    fn start(&mut self, target: i32, power: f64) -> Result<()> {
        self.reset_position_reference()?;
        self.set_position_target(target)?;
        self.set_power(power)
    }

    fn within_tolerance(&mut self, target: i32, tolerance: i32) -> Result<bool> {
        let position = self.current_position()?;
        Ok((target - position).abs() <= tolerance)
    }

    fn is_progressing(&mut self) -> Result<bool> {
        self.is_progressing_toward_target()
    }

    fn release(&mut self) -> Result<()> {
        self.set_free_power_mode()
    }

    fn apply_power(&mut self, power: f64) -> Result<()> {
        self.set_power(power)
    }
}

/// Where an action is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionState<T> {
    Idle,
    Running {
        target: T,
        tolerance: i32,
        elapsed_ticks: u32,
    },
}

/// Outcome of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// Nothing in flight
    Idle,
    /// Still moving
    Running,
    /// Arrived, or the actuator stopped on its own. Reported once.
    Completed,
    /// Gave up after the configured number of polls. Reported once.
    TimedOut,
}

impl ActionStatus {
    /// True on the poll that retired the action
    pub fn just_finished(self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::TimedOut)
    }
}

/// Tracks one long-running action on an actuator the caller owns
#[derive(Debug, Clone)]
pub struct LongRunningAction<T> {
    name: &'static str,
    state: ActionState<T>,
    tolerance: i32,
    power: f64,
    timeout_ticks: Option<u32>,
}

impl<T: Copy + Debug + PartialEq> LongRunningAction<T> {
    pub fn new(name: &'static str, tolerance: i32, power: f64) -> Self {
        Self {
            name,
            state: ActionState::Idle,
            tolerance,
            power,
            timeout_ticks: None,
        }
    }

    /// Retire the action after `ticks` polls even if the actuator never
    /// settles
    pub fn with_timeout(mut self, ticks: Option<u32>) -> Self {
        self.timeout_ticks = ticks;
        self
    }

    pub fn state(&self) -> ActionState<T> {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ActionState::Running { .. })
    }

    pub fn target(&self) -> Option<T> {
        match self.state {
            ActionState::Running { target, .. } => Some(target),
            ActionState::Idle => None,
        }
    }

    /// Start moving toward `target`
    ///
    /// Returns `false` without touching the actuator if an action is already
    /// in flight. If the actuator rejects the command the action stays idle.
    pub fn activate<A>(&mut self, actuator: &mut A, target: T) -> Result<bool>
    where
        A: Trackable<Target = T>,
    {
        if self.is_active() {
            debug!("{}: already running, ignoring new target {:?}", self.name, target);
            return Ok(false);
        }

        actuator.start(target, self.power)?;
        self.state = ActionState::Running {
            target,
            tolerance: self.tolerance,
            elapsed_ticks: 0,
        };
        info!("{}: started toward {:?}", self.name, target);
        Ok(true)
    }

    /// Check progress; call once per control tick
    pub fn poll<A>(&mut self, actuator: &mut A) -> Result<ActionStatus>
    where
        A: Trackable<Target = T>,
    {
        let ActionState::Running {
            target,
            tolerance,
            elapsed_ticks,
        } = self.state
        else {
            return Ok(ActionStatus::Idle);
        };

        let elapsed_ticks = elapsed_ticks.saturating_add(1);

        if actuator.within_tolerance(target, tolerance)? || !actuator.is_progressing()? {
            info!("{}: done after {} ticks", self.name, elapsed_ticks);
            self.state = ActionState::Idle;
            return Ok(ActionStatus::Completed);
        }

        if self.timeout_ticks.is_some_and(|limit| elapsed_ticks >= limit) {
            warn!(
                "{}: no arrival at {:?} after {} ticks, giving up",
                self.name, target, elapsed_ticks
            );
            self.state = ActionState::Idle;
            return Ok(ActionStatus::TimedOut);
        }

        self.state = ActionState::Running {
            target,
            tolerance,
            elapsed_ticks,
        };
        Ok(ActionStatus::Running)
    }

    /// Drop an action in flight and hand the actuator back to free-power mode
    ///
    /// Returns whether anything was cancelled. Power is left as it was. If the
    /// actuator refuses the release the action stays active.
    pub fn cancel<A>(&mut self, actuator: &mut A) -> Result<bool>
    where
        A: Trackable<Target = T>,
    {
        if !self.is_active() {
            return Ok(false);
        }
        actuator.release()?;
        self.state = ActionState::Idle;
        Ok(true)
    }

    /// Manual power command; pre-empts an action in flight
    pub fn override_power<A>(&mut self, actuator: &mut A, power: f64) -> Result<()>
    where
        A: Trackable<Target = T>,
    {
        if self.cancel(actuator)? {
            info!("{}: overridden by manual power {}", self.name, power);
        }
        actuator.apply_power(power)
    }
}
