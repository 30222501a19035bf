//! Robot-side teleoperation server.
//!
//! Owns the robot driver, the inbound command endpoint and the outbound
//! observation endpoint for its process lifetime. The control loop runs at
//! a fixed rate: drain the newest command (intermediate commands since the
//! last tick are conflated away), apply it, then read and publish the
//! current state regardless of whether a command arrived, so the operator
//! stays informed even when idle.
//!
//! # State machine
//!
//! ```text
//! Starting ──> Listening ──> Active <──> Degraded
//!     │            │            │            │
//!     └────────────┴────────────┴────────────┴──> Stopped
//! ```
//!
//! - `Starting`: bind both endpoints and initialize the robot; failure
//!   here is fatal.
//! - `Listening → Active` on the first successfully decoded command.
//! - `Active → Degraded` when no command arrives within the liveness
//!   window. While degraded the server keeps publishing observations but
//!   commands an explicit hold instead of replaying anything stale.
//! - `Stopped` is terminal: explicit shutdown or a hardware fault.
//!
//! Transport and codec errors never leave the loop iteration they occur
//! in; a malformed message is logged and skipped.

use crate::channel::{UdpReceiver, UdpSender};
use crate::codec;
use crate::config::AppConfig;
use crate::error::{ActuationError, Result};
use crate::messages::{now_us, CommandMessage, Health, ObservationMessage};
use crate::robot::RobotInterface;
use crate::session::{SequenceCheck, SequenceTracker, Session};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Server lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Binding endpoints and initializing the robot
    Starting,
    /// Endpoints up, no command decoded yet
    Listening,
    /// Executing operator commands
    Active,
    /// Command stream stale; holding position, still publishing
    Degraded,
    /// Terminal
    Stopped,
}

/// Robot-side endpoint of the teleoperation link
pub struct TeleoperationServer {
    robot: Box<dyn RobotInterface>,
    cmd_rx: UdpReceiver,
    obs_tx: UdpSender,
    state: ServerState,
    session: Option<Session>,
    cmd_seq: SequenceTracker,
    obs_seq: u64,
    control_period: Duration,
    liveness_timeout: Duration,
}

impl TeleoperationServer {
    /// Bind endpoints from configuration and bring up the robot.
    ///
    /// Failure to bind either endpoint or to initialize the robot is
    /// fatal: the server never leaves `Starting`.
    pub fn new(config: &AppConfig, robot: Box<dyn RobotInterface>) -> Result<Self> {
        let cmd_rx = UdpReceiver::bind(&config.link.command_bind, config.link.queue_capacity)?;
        let obs_tx = UdpSender::connect(&config.link.observation_target)?;
        log::info!(
            "command endpoint on {}, observations -> {}",
            config.link.command_bind,
            config.link.observation_target
        );
        Self::with_endpoints(
            robot,
            cmd_rx,
            obs_tx,
            config.robot.control_period(),
            config.robot.liveness_timeout(),
        )
    }

    /// Build a server over pre-bound endpoints
    pub fn with_endpoints(
        mut robot: Box<dyn RobotInterface>,
        cmd_rx: UdpReceiver,
        obs_tx: UdpSender,
        control_period: Duration,
        liveness_timeout: Duration,
    ) -> Result<Self> {
        robot.initialize()?;
        log::info!(
            "server listening (control period {:?}, liveness window {:?})",
            control_period,
            liveness_timeout
        );
        Ok(Self {
            robot,
            cmd_rx,
            obs_tx,
            state: ServerState::Listening,
            session: None,
            cmd_seq: SequenceTracker::new(),
            obs_seq: 0,
            control_period,
            liveness_timeout,
        })
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Actual command endpoint address, useful when bound to port 0
    pub fn command_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.cmd_rx.local_addr()?)
    }

    /// Drain the command channel and return the newest decodable command.
    ///
    /// Undecodable frames are dropped with a warning; stale sequence
    /// numbers are skipped since a newer sample has already been seen.
    fn drain_newest_command(&mut self) -> Option<CommandMessage> {
        let mut newest = None;
        while let Some(frame) = self.cmd_rx.try_receive() {
            match codec::decode_command(&frame) {
                Ok(cmd) => match self.cmd_seq.observe(cmd.sequence_id) {
                    SequenceCheck::InOrder => newest = Some(cmd),
                    SequenceCheck::Gap(n) => {
                        log::debug!("command stream skipped {n} messages");
                        newest = Some(cmd);
                    }
                    SequenceCheck::Stale => {
                        log::debug!("ignoring stale command seq={}", cmd.sequence_id);
                    }
                },
                Err(e) => log::warn!("dropping undecodable command: {e}"),
            }
        }
        newest
    }

    /// One control loop iteration at time `now`
    pub fn tick(&mut self, now: Instant) {
        if self.state == ServerState::Stopped {
            return;
        }

        if let Some(cmd) = self.drain_newest_command() {
            match &mut self.session {
                Some(session) => session.saw_command(now),
                None => {
                    let mut session = Session::new("operator", now);
                    session.saw_command(now);
                    log::info!("session established (client: {})", session.client_id);
                    self.session = Some(session);
                }
            }
            if matches!(self.state, ServerState::Listening | ServerState::Degraded) {
                log::info!("{:?} -> Active (command seq={})", self.state, cmd.sequence_id);
                self.state = ServerState::Active;
            }

            match self.robot.apply_command(&cmd) {
                Ok(()) => {}
                Err(ActuationError::OutOfRange(reason)) => {
                    // Last known-safe command stays in effect
                    log::warn!("rejected command seq={}: {reason}", cmd.sequence_id);
                }
                Err(ActuationError::HardwareFault(reason)) => {
                    self.fail_stop(&reason);
                    return;
                }
            }
        }

        // Liveness: a stale command stream means the operator is gone or
        // the link dropped. Never keep executing the last stale command.
        if self.state == ServerState::Active
            && let Some(session) = &self.session
            && session.command_stale(self.liveness_timeout, now)
        {
            log::warn!(
                "no command within {:?}, holding position",
                self.liveness_timeout
            );
            self.state = ServerState::Degraded;
            // Tear down the session: a reconnecting client starts its
            // sequence ids fresh, so the old high-water mark must not
            // classify its commands as stale.
            self.session = None;
            self.cmd_seq.reset();
            let hold = CommandMessage::hold(0);
            if let Err(ActuationError::HardwareFault(reason)) = self.robot.apply_command(&hold) {
                self.fail_stop(&reason);
                return;
            }
        }

        // Observation publication is independent of command arrival
        self.publish_observation();
    }

    fn publish_observation(&mut self) {
        let mut obs = self.robot.read_state();
        self.obs_seq += 1;
        obs.sequence_id = self.obs_seq;
        obs.timestamp_us = now_us();
        if self.state == ServerState::Degraded && obs.health == Health::Nominal {
            obs.health = Health::Degraded;
        }
        self.send_observation(&obs);
    }

    fn send_observation(&self, obs: &ObservationMessage) {
        match codec::encode_observation(obs) {
            Ok(frame) => {
                if let Err(e) = self.obs_tx.send(&frame) {
                    // Best-effort: the operator side detects the gap
                    log::debug!("failed to publish observation: {e}");
                }
            }
            Err(e) => log::warn!("failed to encode observation: {e}"),
        }
    }

    /// Unrecoverable robot failure: report it while the channel still
    /// works, then stop.
    fn fail_stop(&mut self, reason: &str) {
        log::error!("hardware fault, stopping: {reason}");
        let mut obs = self.robot.read_state();
        self.obs_seq += 1;
        obs.sequence_id = self.obs_seq;
        obs.timestamp_us = now_us();
        obs.health = Health::Fault;
        self.send_observation(&obs);
        self.robot.shutdown();
        self.state = ServerState::Stopped;
    }

    /// Run the control loop until `shutdown` is raised or the server stops
    /// on its own.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        while !shutdown.load(Ordering::Relaxed) && self.state != ServerState::Stopped {
            let started = Instant::now();
            self.tick(started);
            if let Some(remaining) = self.control_period.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
        self.stop();
        Ok(())
    }

    /// Command the safe state and release the robot. Idempotent; runs on
    /// every exit path.
    pub fn stop(&mut self) {
        if self.state == ServerState::Stopped {
            return;
        }
        log::info!("server stopping");
        let _ = self.robot.apply_command(&CommandMessage::hold(0));
        self.robot.shutdown();
        self.state = ServerState::Stopped;
    }
}

impl Drop for TeleoperationServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ControlMode, MotionTarget};
    use crate::robot::{MockRobot, MotionLimits};

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn test_limits() -> MotionLimits {
        MotionLimits {
            max_linear: 1.5,
            max_lateral: 1.0,
            max_angular: 2.0,
        }
    }

    /// Server over loopback endpoints plus a command injector and an
    /// observation capture socket standing in for the operator.
    fn test_server(robot: MockRobot) -> (TeleoperationServer, UdpSender, UdpReceiver) {
        let cmd_rx = UdpReceiver::bind("127.0.0.1:0", 8).unwrap();
        let cmd_addr = cmd_rx.local_addr().unwrap();
        let obs_capture = UdpReceiver::bind("127.0.0.1:0", 8).unwrap();
        let obs_tx = UdpSender::connect(&obs_capture.local_addr().unwrap().to_string()).unwrap();
        let server = TeleoperationServer::with_endpoints(
            Box::new(robot),
            cmd_rx,
            obs_tx,
            Duration::from_millis(20),
            TIMEOUT,
        )
        .unwrap();
        let injector = UdpSender::connect(&cmd_addr.to_string()).unwrap();
        (server, injector, obs_capture)
    }

    fn walk(seq: u64, vx: f64) -> CommandMessage {
        CommandMessage::new(
            seq,
            MotionTarget {
                vx,
                vy: 0.0,
                vyaw: 0.0,
            },
            ControlMode::Walk,
        )
    }

    fn inject(injector: &UdpSender, cmd: &CommandMessage) {
        injector.send(&codec::encode_command(cmd).unwrap()).unwrap();
        // Let the datagram land before the next tick drains the socket
        std::thread::sleep(Duration::from_millis(50));
    }

    fn next_observation(capture: &mut UdpReceiver) -> ObservationMessage {
        let frame = capture.receive(Duration::from_millis(500)).unwrap();
        codec::decode_observation(&frame).unwrap()
    }

    #[test]
    fn first_command_activates_and_is_acknowledged() {
        let robot = MockRobot::new(test_limits());
        let (mut server, injector, mut obs_capture) = test_server(robot.clone());
        assert_eq!(server.state(), ServerState::Listening);

        inject(&injector, &walk(1, 0.5));
        server.tick(Instant::now());

        assert_eq!(server.state(), ServerState::Active);
        assert!(server.session().is_some());
        assert_eq!(robot.last_applied().unwrap().sequence_id, 1);

        // Acknowledged through the next observation
        let obs = next_observation(&mut obs_capture);
        assert_eq!(obs.health, Health::Nominal);
    }

    #[test]
    fn observations_flow_before_any_command() {
        let robot = MockRobot::new(test_limits());
        let (mut server, _injector, mut obs_capture) = test_server(robot);

        server.tick(Instant::now());
        assert_eq!(server.state(), ServerState::Listening);
        let obs = next_observation(&mut obs_capture);
        assert_eq!(obs.sequence_id, 1);
    }

    #[test]
    fn stale_command_stream_enters_degraded_with_hold() {
        let robot = MockRobot::new(test_limits());
        let (mut server, injector, mut obs_capture) = test_server(robot.clone());

        let now = Instant::now();
        inject(&injector, &walk(1, 0.5));
        server.tick(now);
        assert_eq!(server.state(), ServerState::Active);

        // Two liveness windows with no commands
        server.tick(now + TIMEOUT * 2);
        assert_eq!(server.state(), ServerState::Degraded);

        // The hold was commanded; the stale walk command was not replayed
        let applied = robot.applied();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[1].mode, ControlMode::Hold);
        assert_eq!(applied[1].target, MotionTarget::ZERO);

        // Still publishing, now flagged degraded
        let obs = loop {
            let obs = next_observation(&mut obs_capture);
            if obs.health != Health::Nominal {
                break obs;
            }
        };
        assert_eq!(obs.health, Health::Degraded);
    }

    #[test]
    fn fresh_command_recovers_from_degraded() {
        let robot = MockRobot::new(test_limits());
        let (mut server, injector, _obs) = test_server(robot);

        let now = Instant::now();
        inject(&injector, &walk(1, 0.5));
        server.tick(now);
        server.tick(now + TIMEOUT * 2);
        assert_eq!(server.state(), ServerState::Degraded);

        inject(&injector, &walk(2, 0.2));
        server.tick(now + TIMEOUT * 2 + Duration::from_millis(60));
        assert_eq!(server.state(), ServerState::Active);
    }

    #[test]
    fn restarted_client_reestablishes_session_after_degraded() {
        let robot = MockRobot::new(test_limits());
        let (mut server, injector, _obs) = test_server(robot.clone());

        // First session ends deep into its sequence space
        let now = Instant::now();
        inject(&injector, &walk(500, 0.5));
        server.tick(now);
        assert_eq!(server.state(), ServerState::Active);

        server.tick(now + TIMEOUT * 2);
        assert_eq!(server.state(), ServerState::Degraded);
        assert!(server.session().is_none());

        // A restarted client begins a fresh session at seq 1; its commands
        // must not be discarded against the old high-water mark
        let mut later = now + TIMEOUT * 2;
        for seq in 1..=3 {
            inject(&injector, &walk(seq, 0.3));
            later += Duration::from_millis(60);
            server.tick(later);
        }
        assert_eq!(server.state(), ServerState::Active);
        assert_eq!(robot.last_applied().unwrap().sequence_id, 3);
    }

    #[test]
    fn malformed_payload_is_skipped_and_loop_survives() {
        let robot = MockRobot::new(test_limits());
        let (mut server, injector, _obs) = test_server(robot.clone());

        injector.send(b"\x00\x00\x00\x02{}").unwrap();
        injector.send(b"complete garbage").unwrap();
        std::thread::sleep(Duration::from_millis(50));
        server.tick(Instant::now());
        assert_eq!(server.state(), ServerState::Listening);
        assert!(robot.applied().is_empty());

        // The next well-formed message is processed normally
        inject(&injector, &walk(1, 0.1));
        server.tick(Instant::now());
        assert_eq!(server.state(), ServerState::Active);
        assert_eq!(robot.applied().len(), 1);
    }

    #[test]
    fn conflation_applies_only_the_newest_command() {
        let robot = MockRobot::new(test_limits());
        let (mut server, injector, _obs) = test_server(robot.clone());

        for seq in 1..=3 {
            injector
                .send(&codec::encode_command(&walk(seq, 0.1 * seq as f64)).unwrap())
                .unwrap();
        }
        std::thread::sleep(Duration::from_millis(50));
        server.tick(Instant::now());

        let applied = robot.applied();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].sequence_id, 3);
    }

    #[test]
    fn out_of_range_command_is_rejected_without_stopping() {
        let robot = MockRobot::new(test_limits());
        let (mut server, injector, _obs) = test_server(robot.clone());

        inject(&injector, &walk(1, 0.5));
        server.tick(Instant::now());
        inject(&injector, &walk(2, 99.0));
        server.tick(Instant::now());

        assert_eq!(server.state(), ServerState::Active);
        assert_eq!(robot.last_applied().unwrap().sequence_id, 1);
    }

    #[test]
    fn hardware_fault_reports_then_stops() {
        let robot = MockRobot::new(test_limits());
        let (mut server, injector, mut obs_capture) = test_server(robot.clone());

        inject(&injector, &walk(1, 0.5));
        server.tick(Instant::now());

        robot.inject_fault("motor over-temperature");
        inject(&injector, &walk(2, 0.5));
        server.tick(Instant::now());

        assert_eq!(server.state(), ServerState::Stopped);
        assert!(robot.was_shutdown());

        // The fault was reported before the server went down
        let mut last = None;
        while let Ok(frame) = obs_capture.receive(Duration::from_millis(200)) {
            if let Ok(obs) = codec::decode_observation(&frame) {
                last = Some(obs);
            }
        }
        assert_eq!(last.unwrap().health, Health::Fault);
    }

    #[test]
    fn stop_commands_hold_and_releases_robot() {
        let robot = MockRobot::new(test_limits());
        let (mut server, injector, _obs) = test_server(robot.clone());

        inject(&injector, &walk(1, 0.5));
        server.tick(Instant::now());
        server.stop();

        assert_eq!(server.state(), ServerState::Stopped);
        assert!(robot.was_shutdown());
        assert_eq!(robot.last_applied().unwrap().mode, ControlMode::Hold);
    }
}
