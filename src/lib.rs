//! go2-teleop - Teleoperation link for the Unitree Go2
//!
//! A remote operator drives a legged robot over an unreliable network:
//! the operator-side [`client::TeleoperationClient`] publishes motion
//! commands, the robot-side [`server::TeleoperationServer`] executes them
//! through a pluggable [`robot::RobotInterface`] driver and streams state
//! observations back.
//!
//! Both directions ride best-effort, conflating UDP channels: under loss
//! or backlog the newest message wins, because stale commands are unsafe
//! and stale observations are misleading. Staleness stays observable
//! through sequence ids and timestamps, and each side falls back safely
//! when the other goes quiet (the server holds position, the client
//! flags the link as lost).

pub mod channel;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod messages;
pub mod robot;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
