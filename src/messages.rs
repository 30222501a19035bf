//! Message types exchanged over the teleoperation link.
//!
//! Two message kinds cross the wire:
//! - [`CommandMessage`] (operator → robot): one control intent sample
//! - [`ObservationMessage`] (robot → operator): one state/sensor sample
//!
//! Both carry a monotonic `sequence_id` and a producer timestamp. Receivers
//! use sequence gaps and timestamps to observe loss and staleness; they
//! never block waiting for a missing message.

use serde::{Deserialize, Serialize};

/// Timestamp in microseconds since the Unix epoch
pub fn now_us() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Body-frame velocity target: forward, lateral, yaw rate.
///
/// Units are m/s, m/s, rad/s. Interpretation of the safe envelope is up to
/// the robot variant executing the command.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionTarget {
    /// Forward velocity (m/s, positive = forward)
    pub vx: f64,
    /// Lateral velocity (m/s, positive = left)
    pub vy: f64,
    /// Yaw rate (rad/s, positive = counter-clockwise)
    pub vyaw: f64,
}

impl MotionTarget {
    /// Zero velocity in all axes
    pub const ZERO: MotionTarget = MotionTarget {
        vx: 0.0,
        vy: 0.0,
        vyaw: 0.0,
    };

    /// All components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.vx.is_finite() && self.vy.is_finite() && self.vyaw.is_finite()
    }
}

/// Control mode requested by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlMode {
    /// Motors relaxed, no motion
    #[default]
    Idle,
    /// Standing balance, velocity targets ignored
    Stand,
    /// Locomotion, velocity targets executed
    Walk,
    /// Safe hold: freeze in place, discard velocity targets
    Hold,
}

/// One control intent sample from the operator.
///
/// `sequence_id` is strictly increasing per client session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub sequence_id: u64,
    /// Producer clock, microseconds since epoch
    pub timestamp_us: u64,
    pub target: MotionTarget,
    #[serde(default)]
    pub mode: ControlMode,
}

impl CommandMessage {
    /// Create a command stamped with the current time
    pub fn new(sequence_id: u64, target: MotionTarget, mode: ControlMode) -> Self {
        Self {
            sequence_id,
            timestamp_us: now_us(),
            target,
            mode,
        }
    }

    /// Explicit safe/hold command: zero velocity, hold mode.
    ///
    /// Issued locally when the command stream goes stale, never replayed
    /// from a cached operator command.
    pub fn hold(sequence_id: u64) -> Self {
        Self::new(sequence_id, MotionTarget::ZERO, ControlMode::Hold)
    }
}

/// Robot health as reported in every observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Health {
    #[default]
    Nominal,
    /// Operating on a safe fallback (e.g. command stream lost)
    Degraded,
    /// Hardware fault, command execution halted
    Fault,
}

/// Planar body pose estimate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// X position (m)
    pub x: f64,
    /// Y position (m)
    pub y: f64,
    /// Heading (rad, counter-clockwise)
    pub yaw: f64,
}

/// Optional sensor attachment carried inside an observation,
/// e.g. a compressed camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    /// Source identifier (e.g. "front")
    pub camera: String,
    /// Payload encoding (e.g. "jpeg")
    pub encoding: String,
    /// Raw frame bytes
    pub data: Vec<u8>,
}

/// One robot state/sensor sample.
///
/// `sequence_id` is strictly increasing per server session, independent of
/// the command sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationMessage {
    pub sequence_id: u64,
    /// Producer clock, microseconds since epoch
    pub timestamp_us: u64,
    pub pose: Pose,
    /// Joint positions in actuator order (rad), empty when unavailable
    #[serde(default)]
    pub joint_positions: Vec<f64>,
    /// Optional sensor attachment, absent in the common case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_payload: Option<SensorFrame>,
    #[serde(default)]
    pub health: Health,
}

impl ObservationMessage {
    /// Create an observation stamped with the current time
    pub fn new(sequence_id: u64, pose: Pose, health: Health) -> Self {
        Self {
            sequence_id,
            timestamp_us: now_us(),
            pose,
            joint_positions: Vec::new(),
            sensor_payload: None,
            health,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_command_is_zero_velocity() {
        let cmd = CommandMessage::hold(7);
        assert_eq!(cmd.target, MotionTarget::ZERO);
        assert_eq!(cmd.mode, ControlMode::Hold);
        assert_eq!(cmd.sequence_id, 7);
    }

    #[test]
    fn non_finite_targets_detected() {
        let mut target = MotionTarget::ZERO;
        assert!(target.is_finite());
        target.vy = f64::NAN;
        assert!(!target.is_finite());
        target.vy = f64::INFINITY;
        assert!(!target.is_finite());
    }
}
