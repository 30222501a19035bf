//! teleop-client - Minimal operator-side harness
//!
//! Drives a `TeleoperationClient` from stdin and prints the newest
//! observation once a second. Each input line is a velocity target
//! `vx vy vyaw`, or one of `stop` / `quit`. Real deployments replace this
//! with keyboard capture and visualization collaborators.

use go2_teleop::client::{ClientOptions, TeleoperationClient};
use go2_teleop::config::AppConfig;
use go2_teleop::error::Result;
use go2_teleop::messages::{ControlMode, MotionTarget};
use go2_teleop::session::LinkStatus;
use std::env;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

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

/// Parse one input line into a target, if it is one
fn parse_line(line: &str) -> Option<MotionTarget> {
    let fields: Vec<f64> = line
        .split_whitespace()
        .filter_map(|f| f.parse().ok())
        .collect();
    match fields.as_slice() {
        [vx, vy, vyaw] => Some(MotionTarget {
            vx: *vx,
            vy: *vy,
            vyaw: *vyaw,
        }),
        _ => None,
    }
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = AppConfig::from_file(&config_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    log::info!("teleop-client starting (config: {config_path})");

    let client = TeleoperationClient::connect(
        &config.link.command_target,
        &config.link.observation_bind,
        ClientOptions::from_config(&config),
    )?;
    let client = Arc::new(client);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::Relaxed))
            .map_err(|e| go2_teleop::Error::Other(format!("error setting Ctrl-C handler: {e}")))?;
    }

    // Input collaborator: velocity lines from stdin
    {
        let client = Arc::clone(&client);
        let running = Arc::clone(&running);
        std::thread::Builder::new()
            .name("stdin-input".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    let line = line.trim().to_lowercase();
                    match line.as_str() {
                        "quit" | "exit" => {
                            running.store(false, Ordering::Relaxed);
                            break;
                        }
                        "stop" => client.set_target(MotionTarget::ZERO, ControlMode::Stand),
                        _ => match parse_line(&line) {
                            Some(target) => client.set_target(target, ControlMode::Walk),
                            None => log::warn!("unparseable input: {line:?}"),
                        },
                    }
                }
            })?;
    }

    println!("commands -> {}", config.link.command_target);
    println!("enter `vx vy vyaw` to walk, `stop` to stand, `quit` to exit");

    // Presentation collaborator: print the newest observation once a second
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_secs(1));
        match client.link_status() {
            LinkStatus::LinkLost => log::warn!("LINK LOST - no observations from robot"),
            LinkStatus::Connected => {
                if let Some(obs) = client.latest_observation() {
                    log::info!(
                        "seq={} pose=({:.2}, {:.2}, {:.2}) health={:?}",
                        obs.sequence_id,
                        obs.pose.x,
                        obs.pose.y,
                        obs.pose.yaw,
                        obs.health
                    );
                }
            }
        }
    }

    log::info!("teleop-client stopped");
    Ok(())
}
