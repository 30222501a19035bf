//! teleop-server - Robot-side teleoperation daemon
//!
//! Binds the command and observation channel endpoints, brings up the
//! configured robot driver and runs the control loop until a shutdown
//! signal arrives or the robot faults.

use go2_teleop::config::AppConfig;
use go2_teleop::error::Result;
use go2_teleop::robot::create_robot;
use go2_teleop::server::TeleoperationServer;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `teleop-server <path>` (positional)
/// - `teleop-server --config <path>` (flag-based)
/// - `teleop-server -c <path>` (short flag)
///
/// Defaults to `/etc/teleop.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/teleop.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = AppConfig::from_file(&config_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    log::info!("teleop-server starting (config: {config_path})");
    log::info!(
        "robot: {} @ {} Hz, liveness window {} ms",
        config.robot.robot_type,
        config.robot.control_rate_hz,
        config.robot.liveness_timeout_ms
    );

    let robot = create_robot(&config.robot)?;
    let mut server = TeleoperationServer::new(&config, robot)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        log::info!("received shutdown signal");
        flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| go2_teleop::Error::Other(format!("error setting Ctrl-C handler: {e}")))?;

    server.run(&shutdown)?;

    log::info!("teleop-server stopped");
    Ok(())
}
