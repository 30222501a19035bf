//! Configuration for the teleoperation endpoints.
//!
//! Loaded from a TOML file. The same file can serve both endpoints; each
//! side reads the `[link]` keys relevant to its direction.

use crate::channel::DEFAULT_QUEUE_CAPACITY;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub robot: RobotConfig,
    pub link: LinkConfig,
    pub logging: LoggingConfig,
}

/// Robot variant selection and control-loop tuning (server side)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Robot variant ("go2", or "mock" for hardware-free runs)
    pub robot_type: String,
    /// Control loop frequency (Hz)
    pub control_rate_hz: f64,
    /// Command liveness window before the server enters its safe state (ms)
    pub liveness_timeout_ms: u64,
    /// Maximum |vx| (m/s)
    pub max_linear_velocity: f64,
    /// Maximum |vy| (m/s)
    pub max_lateral_velocity: f64,
    /// Maximum |vyaw| (rad/s)
    pub max_angular_velocity: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            robot_type: "go2".to_string(),
            control_rate_hz: 50.0,
            liveness_timeout_ms: 500,
            // Conservative defaults for the Go2 sport-mode envelope
            max_linear_velocity: 1.5,
            max_lateral_velocity: 1.0,
            max_angular_velocity: 2.0,
        }
    }
}

impl RobotConfig {
    /// Control loop period derived from `control_rate_hz`
    pub fn control_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.control_rate_hz)
    }

    /// Liveness window as a duration
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }
}

/// Channel endpoint addresses.
///
/// The command channel flows operator → robot on port 5555, the
/// observation channel robot → operator on port 5556.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Server: local bind for inbound commands
    pub command_bind: String,
    /// Server: operator endpoint for outbound observations
    pub observation_target: String,
    /// Client: robot endpoint for outbound commands
    pub command_target: String,
    /// Client: local bind for inbound observations
    pub observation_bind: String,
    /// Receive queue depth per channel (drop-oldest on overflow)
    pub queue_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            command_bind: "0.0.0.0:5555".to_string(),
            observation_target: "127.0.0.1:5556".to_string(),
            command_target: "127.0.0.1:5555".to_string(),
            observation_bind: "0.0.0.0:5556".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("{}: {e}", path.as_ref().display()))
        })?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.robot.control_rate_hz > 0.0) {
            return Err(Error::Config(format!(
                "control_rate_hz must be positive, got {}",
                self.robot.control_rate_hz
            )));
        }
        if self.robot.liveness_timeout_ms == 0 {
            return Err(Error::Config(
                "liveness_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.link.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.robot.robot_type, "go2");
        assert_eq!(config.link.command_bind, "0.0.0.0:5555");
        assert_eq!(config.link.observation_bind, "0.0.0.0:5556");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [robot]
            robot_type = "mock"
            liveness_timeout_ms = 250

            [link]
            observation_target = "192.168.31.158:5556"
            "#,
        )
        .unwrap();
        assert_eq!(config.robot.robot_type, "mock");
        assert_eq!(config.robot.liveness_timeout_ms, 250);
        assert_eq!(config.robot.control_rate_hz, 50.0);
        assert_eq!(config.link.observation_target, "192.168.31.158:5556");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn zero_rate_is_rejected() {
        let mut config = AppConfig::default();
        config.robot.control_rate_hz = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn control_period_matches_rate() {
        let mut config = AppConfig::default();
        config.robot.control_rate_hz = 20.0;
        assert_eq!(config.robot.control_period(), Duration::from_millis(50));
    }
}
