//! Mock robot driver for hardware-free testing.
//!
//! Records every applied command and supports fault injection. Handles are
//! cheap clones over shared state, so a test can keep one handle while the
//! server owns another.

use crate::error::ActuationError;
use crate::messages::{CommandMessage, Health, ObservationMessage, Pose};
use crate::robot::{MotionLimits, RobotInterface};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct MockState {
    applied: Vec<CommandMessage>,
    initialized: bool,
    shutdown_called: bool,
    fault: Option<String>,
}

/// Mock robot driver
#[derive(Clone)]
pub struct MockRobot {
    limits: MotionLimits,
    state: Arc<Mutex<MockState>>,
}

impl MockRobot {
    pub fn new(limits: MotionLimits) -> Self {
        Self {
            limits,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Make every subsequent `apply_command` fail with a hardware fault
    pub fn inject_fault(&self, reason: &str) {
        self.state.lock().fault = Some(reason.to_string());
    }

    /// All commands accepted so far, in application order
    pub fn applied(&self) -> Vec<CommandMessage> {
        self.state.lock().applied.clone()
    }

    /// Most recently accepted command
    pub fn last_applied(&self) -> Option<CommandMessage> {
        self.state.lock().applied.last().cloned()
    }

    pub fn was_shutdown(&self) -> bool {
        self.state.lock().shutdown_called
    }
}

impl RobotInterface for MockRobot {
    fn initialize(&mut self) -> Result<(), ActuationError> {
        self.state.lock().initialized = true;
        Ok(())
    }

    fn apply_command(&mut self, cmd: &CommandMessage) -> Result<(), ActuationError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.fault {
            return Err(ActuationError::HardwareFault(reason.clone()));
        }
        self.limits.validate(&cmd.target)?;
        state.applied.push(cmd.clone());
        Ok(())
    }

    fn read_state(&mut self) -> ObservationMessage {
        let state = self.state.lock();
        let health = if state.fault.is_some() {
            Health::Fault
        } else {
            Health::Nominal
        };
        ObservationMessage::new(0, Pose::default(), health)
    }

    fn shutdown(&mut self) {
        let mut state = self.state.lock();
        state.initialized = false;
        state.shutdown_called = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ControlMode, MotionTarget};

    fn limits() -> MotionLimits {
        MotionLimits {
            max_linear: 1.0,
            max_lateral: 1.0,
            max_angular: 1.0,
        }
    }

    #[test]
    fn records_applied_commands_across_handles() {
        let handle = MockRobot::new(limits());
        let mut owned = handle.clone();
        owned.initialize().unwrap();
        owned
            .apply_command(&CommandMessage::new(
                1,
                MotionTarget::ZERO,
                ControlMode::Stand,
            ))
            .unwrap();
        assert_eq!(handle.applied().len(), 1);
        assert_eq!(handle.last_applied().unwrap().sequence_id, 1);
    }

    #[test]
    fn injected_fault_fails_commands_and_degrades_health() {
        let handle = MockRobot::new(limits());
        let mut owned = handle.clone();
        owned.initialize().unwrap();
        handle.inject_fault("motor over-temperature");
        let result = owned.apply_command(&CommandMessage::hold(1));
        assert!(matches!(result, Err(ActuationError::HardwareFault(_))));
        assert_eq!(owned.read_state().health, Health::Fault);
    }
}
