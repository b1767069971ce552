use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mecanum_zenoh_runtime::config::{LOOP_HZ, RobotConfig};

#[derive(Debug, Parser)]
#[command(about = "Mecanum base control loop (simulated hardware, zenoh command bus)")]
struct Args {
    /// JSON file with robot tunables; missing fields use built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control loop rate in Hz (1 to 1000)
    #[arg(long, default_value_t = LOOP_HZ, value_parser = clap::value_parser!(u64).range(1..=1000))]
    loop_hz: u64,

    /// Give up on a flip or encoder drive after this many ticks
    #[arg(long)]
    action_timeout_ticks: Option<u32>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match RobotConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => RobotConfig::default(),
    };
    if args.action_timeout_ticks.is_some() {
        config.action_timeout_ticks = args.action_timeout_ticks;
    }

    if let Err(e) = mecanum_zenoh_runtime::runtime::run(config, args.loop_hz).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_hz_bounds() {
        let args = Args::try_parse_from(["mecanum"]).unwrap();
        assert_eq!(args.loop_hz, LOOP_HZ);
        assert_eq!(Args::try_parse_from(["mecanum", "--loop-hz", "1000"]).unwrap().loop_hz, 1000);
        assert!(Args::try_parse_from(["mecanum", "--loop-hz", "0"]).is_err());
        assert!(Args::try_parse_from(["mecanum", "--loop-hz", "2000"]).is_err());
    }
}
