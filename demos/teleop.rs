// Keyboard teleop: WASD translate, Z/X rotate, H heading hold, R/F speed,
// Space fire, 1/2/3 toggle servos, E/C harvester, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::f64::consts::{FRAC_PI_2, PI};
use std::time::{Duration, Instant};
use tracing::info;

use mecanum_zenoh_runtime::config::TOPIC_CMD;
use mecanum_zenoh_runtime::messages::{RobotCommand, ServoId};

const SPEEDS: [f64; 3] = [0.25, 0.5, 1.0]; // fraction of full power
const ROTATION_SPEEDS: [f64; 3] = [0.2, 0.4, 0.8];
const INPUT_TIMEOUT_MS: u64 = 100; // Reset velocities after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD).await?;

    info!("Controls: WASD=move, Z/X=rotate, H=heading hold, R/F=speed, Space=fire, 1/2/3=servos, E/C=harvester, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn send(
    publisher: &zenoh::pubsub::Publisher<'_>,
    cmd: &RobotCommand,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    publisher.put(serde_json::to_string(cmd)?).await?;
    Ok(())
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    let mut hold_heading = false;
    let mut harvester = 0.0;

    // Persistent drive state
    let mut direction = 0.0;
    let mut velocity = 0.0;
    let mut rotation = 0.0;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // Translation - direction in radians, 0 = forward
                    KeyCode::Char(c @ ('w' | 'd' | 's' | 'a')) if pressed => {
                        direction = match c {
                            'w' => 0.0,
                            'd' => FRAC_PI_2,
                            's' => PI,
                            _ => 3.0 * FRAC_PI_2,
                        };
                        velocity = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }

                    // Rotation
                    KeyCode::Char('z') if pressed => {
                        rotation = ROTATION_SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('x') if pressed => {
                        rotation = -ROTATION_SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('h') if pressed => {
                        hold_heading = !hold_heading;
                        info!("Heading hold: {}", if hold_heading { "ON" } else { "OFF" });
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Mechanisms, sent once per key press
                    KeyCode::Char(' ') if kind == KeyEventKind::Press => {
                        send(publisher, &RobotCommand::Fire).await?;
                    }
                    KeyCode::Char(c @ '1'..='3') if kind == KeyEventKind::Press => {
                        let servo = match c {
                            '1' => ServoId::FrontPanel,
                            '2' => ServoId::RearPanel,
                            _ => ServoId::Dispenser,
                        };
                        send(publisher, &RobotCommand::Toggle { servo }).await?;
                    }
                    KeyCode::Char('e') if kind == KeyEventKind::Press => {
                        harvester = if harvester > 0.0 { 0.0 } else { 1.0 };
                        let cmd = RobotCommand::HarvesterPower { power: harvester };
                        send(publisher, &cmd).await?;
                    }
                    KeyCode::Char('c') if kind == KeyEventKind::Press => {
                        harvester = if harvester < 0.0 { 0.0 } else { -1.0 };
                        let cmd = RobotCommand::HarvesterPower { power: harvester };
                        send(publisher, &cmd).await?;
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Reset velocities if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            velocity = 0.0;
            rotation = 0.0;
        }

        // Always publish at ~50Hz
        let cmd = if hold_heading {
            RobotCommand::HoldHeading {
                direction,
                velocity,
            }
        } else {
            RobotCommand::Drive {
                direction,
                velocity,
                rotation,
            }
        };
        send(publisher, &cmd).await?;
    }

    send(publisher, &RobotCommand::Stop).await
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
