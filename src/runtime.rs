// Fixed-rate control loop with watchdog
// Note: continuous drive commands must keep arriving; if the sender goes quiet
// for longer than CMD_TIMEOUT the base is stopped. Long-running actions (flip,
// encoder drive) are not affected by the watchdog.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::config::{CMD_TIMEOUT, RobotConfig, TOPIC_CMD, TOPIC_HEALTH, TOPIC_TELEMETRY};
use crate::hardware::{Hardware, HardwareError, Result, SimRig};
use crate::messages::{DistanceUnit, RobotCommand, RuntimeHealth, ServoId};
use crate::robot::{MecanumRobot, TickReport};

pub struct Runtime<H: Hardware> {
    robot: MecanumRobot<H>,
    drive_cmd: Option<RobotCommand>,
    // Last refresh of drive_cmd; only continuous commands move this
    drive_cmd_at: Instant,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl<H: Hardware> Runtime<H> {
    pub fn new(robot: MecanumRobot<H>) -> Self {
        let now = Instant::now();
        Self {
            robot,
            drive_cmd: None,
            drive_cmd_at: now,
            cmd_received_at: now,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn robot(&mut self) -> &mut MecanumRobot<H> {
        &mut self.robot
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn on_command(&mut self, cmd: RobotCommand) -> Result<()> {
        self.on_command_at(cmd, Instant::now())
    }

    /// Process incoming command
    pub fn on_command_at(&mut self, cmd: RobotCommand, now: Instant) -> Result<()> {
        info!("Received command: {:?}", &cmd);
        self.cmd_received_at = now;

        if cmd.is_continuous() {
            self.drive_cmd = Some(cmd.clone());
            self.drive_cmd_at = now;
        }

        match cmd {
            RobotCommand::Drive {
                direction,
                velocity,
                rotation,
            } => self.robot.drive(direction, velocity, rotation),
            RobotCommand::HoldHeading {
                direction,
                velocity,
            } => self.robot.drive_preserving_direction(direction, velocity),
            RobotCommand::Stop => {
                self.drive_cmd = None;
                self.robot.stop_drive_motors()
            }
            RobotCommand::EncoderDrive {
                direction,
                distance,
                unit,
            } => {
                self.drive_cmd = None;
                let started = match unit {
                    DistanceUnit::Inches => self.robot.encoder_drive_inches(direction, distance)?,
                    DistanceUnit::Cm => self.robot.encoder_drive_cm(direction, distance)?,
                    DistanceUnit::Tiles => self.robot.encoder_drive_tiles(direction, distance)?,
                };
                if !started {
                    debug!("Encoder drive already running, command dropped");
                }
                Ok(())
            }
            RobotCommand::Fire => self.robot.fire().map(|_| ()),
            RobotCommand::FlipperPower { power } => self.robot.set_flipper_power(power),
            RobotCommand::HarvesterPower { power } => self.robot.set_harvester_power(power),
            RobotCommand::Toggle { servo } => match servo {
                ServoId::FrontPanel => self.robot.toggle_front_panel(),
                ServoId::RearPanel => self.robot.toggle_rear_panel(),
                ServoId::Dispenser => self.robot.toggle_dispenser(),
            },
            RobotCommand::SetDispenser { first } => self.robot.set_dispenser(first),
            RobotCommand::ResetGyro => self.robot.reset_gyro(),
        }
    }

    pub fn tick(&mut self) -> Result<TickReport> {
        self.tick_at(Instant::now())
    }

    /// One control cycle: watchdog, held drive command, then the robot's tick
    pub fn tick_at(&mut self, now: Instant) -> Result<TickReport> {
        let cmd_age = now.saturating_duration_since(self.cmd_received_at);
        let drive_age = now.saturating_duration_since(self.drive_cmd_at);

        // Watchdog: a held drive command must be refreshed by another drive
        // command; mechanism commands keep the link alive but not the wheels
        if self.drive_cmd.is_some() && drive_age > CMD_TIMEOUT {
            warn!("Drive command stale ({:?} old), stopping base", drive_age);
            self.drive_cmd = None;
            self.robot.stop_drive_motors()?;
        }

        if cmd_age > CMD_TIMEOUT {
            if self.health != RuntimeHealth::CmdStale {
                warn!("No command for {:?}", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
        } else {
            self.health = RuntimeHealth::Ok;
        }

        // Heading hold has to re-read the gyro every cycle
        if let Some(RobotCommand::HoldHeading {
            direction,
            velocity,
        }) = self.drive_cmd
        {
            self.robot.drive_preserving_direction(direction, velocity)?;
        }

        self.robot.tick()
    }

    /// A hardware call failed this cycle: stop everything and report it
    pub fn on_fault(&mut self, err: &HardwareError) {
        error!("Hardware fault: {}", err);
        self.health = RuntimeHealth::HardwareFault;
        self.drive_cmd = None;
        if let Err(e) = self.robot.on_stop() {
            warn!("Failed to stop robot after fault: {}", e);
        }
    }
}

/// Tick period for a loop rate; rates above 1 kHz still get a nonzero period
pub fn loop_period(loop_hz: u64) -> Duration {
    Duration::from_secs_f64(1.0 / loop_hz.max(1) as f64)
}

/// Run the control loop against the simulated rig
pub async fn run(
    config: RobotConfig,
    loop_hz: u64,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let rig = SimRig::new();
    let mut robot = MecanumRobot::new(rig.devices(), config)?;
    robot.on_start()?;
    let mut runtime = Runtime::new(robot);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_TELEMETRY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut tick = interval(loop_period(loop_hz));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        loop_hz,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD);
    info!("Publishing to: {}, {}", TOPIC_TELEMETRY, TOPIC_HEALTH);

    loop {
        tick.tick().await;
        rig.step();

        // 1. Drain all pending commands (non-blocking)
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<RobotCommand>(&payload) {
                Ok(cmd) => {
                    if let Err(e) = runtime.on_command(cmd) {
                        runtime.on_fault(&e);
                    }
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Watchdog and long-running actions
        if let Err(e) = runtime.tick() {
            runtime.on_fault(&e);
        }

        // 3. Publish telemetry
        match runtime.robot().telemetry() {
            Ok(telemetry) => {
                let telemetry_json = serde_json::to_string(&telemetry)?;
                pub_telemetry.put(telemetry_json).await?;
            }
            Err(e) => warn!("Telemetry read failed: {}", e),
        }

        // 4. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }
}
