// Scripted autonomous run against the simulated rig
//
// Usage: cargo run --example autonomous -- [timeout-ticks]
//
// Walks through the same calls an autonomous op-mode makes: wait for the gyro,
// encoder-drive a square, fire the flipper twice, read the beacon color. Each
// step runs the control loop until the long-running action retires.

use std::f64::consts::FRAC_PI_2;

use mecanum_zenoh_runtime::action::ActionStatus;
use mecanum_zenoh_runtime::config::RobotConfig;
use mecanum_zenoh_runtime::hardware::{SimHardware, SimRig};
use mecanum_zenoh_runtime::{MecanumRobot, TickReport};

const MAX_TICKS_PER_STEP: u32 = 2000;

type Robot = MecanumRobot<SimHardware>;

/// Step the rig and the robot until `done` reports a finished action
fn run_until(
    robot: &mut Robot,
    rig: &SimRig,
    done: impl Fn(&TickReport) -> Option<ActionStatus>,
) -> Result<(u32, ActionStatus), Box<dyn std::error::Error>> {
    for tick in 1..=MAX_TICKS_PER_STEP {
        rig.step();
        let report = robot.tick()?;
        if let Some(status) = done(&report) {
            return Ok((tick, status));
        }
    }
    Err("step did not finish".into())
}

fn print_telemetry(robot: &mut Robot) -> Result<(), Box<dyn std::error::Error>> {
    for (key, value) in robot.telemetry()?.entries() {
        println!("    {:<9} {}", key, value.replace('\t', "  "));
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let timeout = std::env::args().nth(1).map(|s| s.parse::<u32>()).transpose()?;
    let config = RobotConfig {
        action_timeout_ticks: timeout,
        ..RobotConfig::default()
    };

    let rig = SimRig::new();
    let mut robot = MecanumRobot::new(rig.devices(), config)?;
    robot.on_start()?;
    println!("Simulated robot ready (action timeout: {:?} ticks)", timeout);
    println!();

    // ========== STEP 1: Gyro calibration ==========
    println!("Step 1: Waiting for gyro calibration...");
    let mut ticks = 0;
    while robot.is_calibrating()? {
        rig.step();
        robot.tick()?;
        ticks += 1;
    }
    robot.reset_gyro()?;
    println!("  ✓ Calibrated after {} ticks", ticks);
    println!();

    // ========== STEP 2: Drive a one-tile square ==========
    println!("Step 2: Encoder-driving a one-tile square...");
    for (i, direction) in [0.0, FRAC_PI_2, 2.0 * FRAC_PI_2, 3.0 * FRAC_PI_2]
        .into_iter()
        .enumerate()
    {
        robot.encoder_drive_tiles(direction, 1.0)?;
        let (ticks, status) = run_until(&mut robot, &rig, |r| {
            r.encoder_drive.just_finished().then_some(r.encoder_drive)
        })?;
        println!("  Leg {}: {:?} after {} ticks", i + 1, status, ticks);
        robot.reset_drive_motor_modes()?;
    }
    println!();

    // ========== STEP 3: Fire twice ==========
    println!("Step 3: Firing the flipper twice...");
    for shot in 1..=2 {
        robot.fire()?;
        // A second fire while flipping is ignored
        assert!(!robot.fire()?);
        let (ticks, status) =
            run_until(&mut robot, &rig, |r| r.flip.just_finished().then_some(r.flip))?;
        println!("  Shot {}: {:?} after {} ticks", shot, status, ticks);
    }
    println!();

    // ========== STEP 4: Beacon ==========
    println!("Step 4: Reading the beacon...");
    rig.color.set_channels(6, 1, 9);
    match robot.alliance_color()? {
        Some(color) => println!("  ✓ Beacon is {:?}", color),
        None => println!("  ✗ No dominant color"),
    }
    println!();

    print_telemetry(&mut robot)?;
    robot.on_stop()?;
    println!();
    println!("Done.");
    Ok(())
}
