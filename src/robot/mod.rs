//! Robot hardware abstraction.
//!
//! [`RobotInterface`] is the capability contract every concrete robot
//! driver implements. The server is written once against this contract and
//! stays robot-agnostic; variants are selected at startup via
//! configuration.

pub mod go2;
pub mod mock;

use crate::config::RobotConfig;
use crate::error::{ActuationError, Error};
use crate::messages::{CommandMessage, MotionTarget, ObservationMessage};

pub use go2::Go2Robot;
pub use mock::MockRobot;

/// Control and state contract for a concrete robot driver.
///
/// Implementations own no network state; the server owns the instance for
/// its process lifetime and drives it from the control loop.
pub trait RobotInterface: Send {
    /// Bring up the hardware connection. Called once before the control
    /// loop starts.
    fn initialize(&mut self) -> Result<(), ActuationError>;

    /// Execute one control intent sample.
    ///
    /// Must be safe to call at the control-loop rate. Out-of-range targets
    /// are rejected with [`ActuationError::OutOfRange`] and the last
    /// known-safe command stays in effect; unsafe values are never
    /// forwarded to the actuators.
    fn apply_command(&mut self, cmd: &CommandMessage) -> Result<(), ActuationError>;

    /// Read the current state/sensor sample from the local cache.
    ///
    /// Never blocks on network I/O. The returned observation's
    /// `sequence_id` and `timestamp_us` are stamped by the caller.
    fn read_state(&mut self) -> ObservationMessage;

    /// Release the hardware connection. Must leave the robot in a safe
    /// state; called on every shutdown path.
    fn shutdown(&mut self);
}

/// Per-variant safe velocity envelope
#[derive(Debug, Clone, Copy)]
pub struct MotionLimits {
    /// Maximum |vx| (m/s)
    pub max_linear: f64,
    /// Maximum |vy| (m/s)
    pub max_lateral: f64,
    /// Maximum |vyaw| (rad/s)
    pub max_angular: f64,
}

impl MotionLimits {
    pub fn from_config(config: &RobotConfig) -> Self {
        Self {
            max_linear: config.max_linear_velocity,
            max_lateral: config.max_lateral_velocity,
            max_angular: config.max_angular_velocity,
        }
    }

    /// Validate a target against the envelope. Non-finite components and
    /// components beyond the variant maximum are rejected.
    pub fn validate(&self, target: &MotionTarget) -> Result<(), ActuationError> {
        if !target.is_finite() {
            return Err(ActuationError::OutOfRange(format!(
                "non-finite velocity target {target:?}"
            )));
        }
        if target.vx.abs() > self.max_linear {
            return Err(ActuationError::OutOfRange(format!(
                "vx {:.3} exceeds limit {:.3}",
                target.vx, self.max_linear
            )));
        }
        if target.vy.abs() > self.max_lateral {
            return Err(ActuationError::OutOfRange(format!(
                "vy {:.3} exceeds limit {:.3}",
                target.vy, self.max_lateral
            )));
        }
        if target.vyaw.abs() > self.max_angular {
            return Err(ActuationError::OutOfRange(format!(
                "vyaw {:.3} exceeds limit {:.3}",
                target.vyaw, self.max_angular
            )));
        }
        Ok(())
    }
}

/// Create a robot driver based on configuration
pub fn create_robot(config: &RobotConfig) -> Result<Box<dyn RobotInterface>, Error> {
    let limits = MotionLimits::from_config(config);
    match config.robot_type.as_str() {
        "go2" => Ok(Box::new(Go2Robot::new(limits))),
        "mock" => Ok(Box::new(MockRobot::new(limits))),
        other => Err(Error::UnknownRobot(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> MotionLimits {
        MotionLimits {
            max_linear: 1.5,
            max_lateral: 1.0,
            max_angular: 2.0,
        }
    }

    #[test]
    fn targets_within_envelope_pass() {
        let target = MotionTarget {
            vx: 1.5,
            vy: -1.0,
            vyaw: 2.0,
        };
        assert!(limits().validate(&target).is_ok());
    }

    #[test]
    fn targets_beyond_envelope_fail() {
        let target = MotionTarget {
            vx: 1.6,
            vy: 0.0,
            vyaw: 0.0,
        };
        assert!(matches!(
            limits().validate(&target),
            Err(ActuationError::OutOfRange(_))
        ));
    }

    #[test]
    fn nan_targets_fail() {
        let target = MotionTarget {
            vx: f64::NAN,
            vy: 0.0,
            vyaw: 0.0,
        };
        assert!(matches!(
            limits().validate(&target),
            Err(ActuationError::OutOfRange(_))
        ));
    }

    #[test]
    fn unknown_robot_type_is_rejected() {
        let config = RobotConfig {
            robot_type: "hexapod".to_string(),
            ..RobotConfig::default()
        };
        assert!(matches!(
            create_robot(&config),
            Err(Error::UnknownRobot(_))
        ));
    }
}
