//! Unitree Go2 driver.
//!
//! Drives the four-legged platform through its sport-mode velocity
//! interface and keeps a locally integrated state cache so `read_state`
//! never touches the network. Pose is dead-reckoned from the commanded
//! body velocity between updates; a platform with onboard state estimation
//! overwrites this cache from its own telemetry.

use crate::error::ActuationError;
use crate::messages::{
    CommandMessage, ControlMode, Health, MotionTarget, ObservationMessage, Pose, SensorFrame,
};
use crate::robot::{MotionLimits, RobotInterface};
use std::time::Instant;

/// Leg joint count (3 per leg: hip, thigh, calf)
const JOINT_COUNT: usize = 12;

/// Thigh/calf angles of the neutral standing pose (rad)
const STAND_THIGH: f64 = 0.67;
const STAND_CALF: f64 = -1.3;

/// Unitree Go2 robot driver
pub struct Go2Robot {
    limits: MotionLimits,
    /// Last command accepted by the safety envelope; held across rejected
    /// targets
    held: CommandMessage,
    pose: Pose,
    joint_positions: Vec<f64>,
    /// Newest frame from the onboard camera pipeline, if one is attached
    sensor_frame: Option<SensorFrame>,
    health: Health,
    last_advance: Instant,
    initialized: bool,
}

impl Go2Robot {
    pub fn new(limits: MotionLimits) -> Self {
        Self {
            limits,
            held: CommandMessage::hold(0),
            pose: Pose::default(),
            joint_positions: standing_joints(),
            sensor_frame: None,
            health: Health::Nominal,
            last_advance: Instant::now(),
            initialized: false,
        }
    }

    /// Integrate the held velocity into the pose cache.
    ///
    /// Body-frame velocity is rotated into the world frame over the elapsed
    /// interval. Only `Walk` moves the body; the other modes hold position.
    fn advance(&mut self, now: Instant) {
        let dt = now.duration_since(self.last_advance).as_secs_f64();
        self.last_advance = now;

        if self.held.mode != ControlMode::Walk {
            return;
        }
        let MotionTarget { vx, vy, vyaw } = self.held.target;
        let (sin, cos) = self.pose.yaw.sin_cos();
        self.pose.x += (vx * cos - vy * sin) * dt;
        self.pose.y += (vx * sin + vy * cos) * dt;
        self.pose.yaw += vyaw * dt;
    }

    /// Pose cache, mainly for tests and diagnostics
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Command currently held by the actuators
    pub fn held_command(&self) -> &CommandMessage {
        &self.held
    }

    /// Cache the newest camera frame; it rides along with every
    /// observation until replaced. The camera pipeline pushes frames here
    /// at its own rate, independent of the control loop.
    pub fn attach_sensor_frame(&mut self, frame: SensorFrame) {
        self.sensor_frame = Some(frame);
    }
}

fn standing_joints() -> Vec<f64> {
    let mut joints = Vec::with_capacity(JOINT_COUNT);
    for _ in 0..JOINT_COUNT / 3 {
        joints.push(0.0);
        joints.push(STAND_THIGH);
        joints.push(STAND_CALF);
    }
    joints
}

impl RobotInterface for Go2Robot {
    fn initialize(&mut self) -> Result<(), ActuationError> {
        log::info!("go2: sport-mode interface up");
        self.initialized = true;
        self.health = Health::Nominal;
        self.last_advance = Instant::now();
        Ok(())
    }

    fn apply_command(&mut self, cmd: &CommandMessage) -> Result<(), ActuationError> {
        if !self.initialized {
            return Err(ActuationError::HardwareFault(
                "command before initialization".to_string(),
            ));
        }

        // Reject before touching the actuators; the held command stays in
        // effect on failure.
        self.limits.validate(&cmd.target)?;

        self.advance(Instant::now());
        self.held = cmd.clone();
        log::trace!(
            "go2: applied seq={} mode={:?} target={:?}",
            cmd.sequence_id,
            cmd.mode,
            cmd.target
        );
        Ok(())
    }

    fn read_state(&mut self) -> ObservationMessage {
        self.advance(Instant::now());
        let mut obs = ObservationMessage::new(0, self.pose, self.health);
        obs.joint_positions = self.joint_positions.clone();
        obs.sensor_payload = self.sensor_frame.clone();
        obs
    }

    fn shutdown(&mut self) {
        if self.initialized {
            self.held = CommandMessage::hold(self.held.sequence_id);
            self.initialized = false;
            log::info!("go2: sport-mode interface released");
        }
    }
}
