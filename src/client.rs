//! Operator-side teleoperation client.
//!
//! Publishes command samples at a fixed control rate and keeps only the
//! most recent observation for the presentation layer. Input capture and
//! visualization are external collaborators: they call [`set_target`] and
//! read [`latest_observation`] / [`link_status`].
//!
//! Two background loops run on independent timers and never block each
//! other: the command publisher samples the conflated target slot every
//! control period, and the observation receiver drains its channel,
//! discarding everything but the newest sample. Link loss is a visible
//! status, not a crash: command publishing continues while the link is
//! down, because the server owns safe-state entry.
//!
//! [`set_target`]: TeleoperationClient::set_target
//! [`latest_observation`]: TeleoperationClient::latest_observation
//! [`link_status`]: TeleoperationClient::link_status

use crate::channel::{UdpReceiver, UdpSender, DEFAULT_QUEUE_CAPACITY};
use crate::codec;
use crate::config::AppConfig;
use crate::error::{ChannelError, Result};
use crate::messages::{CommandMessage, ControlMode, MotionTarget, ObservationMessage};
use crate::session::{LinkStatus, SequenceCheck, SequenceTracker, Session};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Receive poll window for the observation loop; bounds shutdown latency
const OBS_POLL_WINDOW: Duration = Duration::from_millis(50);

/// Client loop tuning
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Command publish period
    pub control_period: Duration,
    /// Observation liveness window before the link counts as lost
    pub liveness_timeout: Duration,
    /// Observation receive queue depth
    pub queue_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            control_period: Duration::from_millis(20),
            liveness_timeout: Duration::from_millis(500),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ClientOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            control_period: config.robot.control_period(),
            liveness_timeout: config.robot.liveness_timeout(),
            queue_capacity: config.link.queue_capacity,
        }
    }
}

struct ClientShared {
    /// Conflated target slot: the publisher always samples the newest
    /// intent, never a queue of old ones
    target: Mutex<(MotionTarget, ControlMode)>,
    latest_observation: Mutex<Option<ObservationMessage>>,
    session: Mutex<Session>,
}

/// Operator-side endpoint of the teleoperation link
pub struct TeleoperationClient {
    shared: Arc<ClientShared>,
    running: Arc<AtomicBool>,
    cmd_thread: Option<JoinHandle<()>>,
    obs_thread: Option<JoinHandle<()>>,
    observation_addr: SocketAddr,
    liveness_timeout: Duration,
}

impl TeleoperationClient {
    /// Connect the command endpoint towards the robot and bind the local
    /// observation endpoint, then start both loops.
    pub fn connect(
        command_target: &str,
        observation_bind: &str,
        options: ClientOptions,
    ) -> Result<Self> {
        let sender = UdpSender::connect(command_target)?;
        let mut receiver = UdpReceiver::bind(observation_bind, options.queue_capacity)?;
        let observation_addr = receiver.local_addr()?;

        let shared = Arc::new(ClientShared {
            target: Mutex::new((MotionTarget::ZERO, ControlMode::Idle)),
            latest_observation: Mutex::new(None),
            session: Mutex::new(Session::new(command_target, Instant::now())),
        });
        let running = Arc::new(AtomicBool::new(true));

        let cmd_thread = {
            let shared = Arc::clone(&shared);
            let running = Arc::clone(&running);
            let period = options.control_period;
            thread::Builder::new()
                .name("cmd-publisher".to_string())
                .spawn(move || command_loop(sender, shared, running, period))?
        };

        let obs_thread = {
            let shared = Arc::clone(&shared);
            let running = Arc::clone(&running);
            let liveness_timeout = options.liveness_timeout;
            thread::Builder::new()
                .name("obs-receiver".to_string())
                .spawn(move || observation_loop(&mut receiver, &shared, &running, liveness_timeout))?
        };

        log::info!(
            "client connected: commands -> {command_target}, observations on {observation_addr}"
        );

        Ok(Self {
            shared,
            running,
            cmd_thread: Some(cmd_thread),
            obs_thread: Some(obs_thread),
            observation_addr,
            liveness_timeout: options.liveness_timeout,
        })
    }

    /// Command submission entry point for the input-capture collaborator.
    ///
    /// The target is sampled by the publisher loop on its next tick;
    /// setting it twice between ticks keeps only the newer intent.
    pub fn set_target(&self, target: MotionTarget, mode: ControlMode) {
        *self.shared.target.lock() = (target, mode);
    }

    /// Most recent observation, if any has arrived yet
    pub fn latest_observation(&self) -> Option<ObservationMessage> {
        self.shared.latest_observation.lock().clone()
    }

    /// Link liveness as seen from the observation stream
    pub fn link_status(&self) -> LinkStatus {
        let session = self.shared.session.lock();
        if session.observation_stale(self.liveness_timeout, Instant::now()) {
            LinkStatus::LinkLost
        } else {
            LinkStatus::Connected
        }
    }

    /// Local observation endpoint address, useful when bound to port 0
    pub fn observation_addr(&self) -> SocketAddr {
        self.observation_addr
    }

    /// Stop both loops and release the endpoints
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.cmd_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.obs_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TeleoperationClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Publish the current target at the control rate with a per-session
/// monotonic sequence number. Keeps publishing on link loss.
fn command_loop(
    sender: UdpSender,
    shared: Arc<ClientShared>,
    running: Arc<AtomicBool>,
    period: Duration,
) {
    let mut sequence_id = 0u64;
    while running.load(Ordering::Relaxed) {
        let (target, mode) = *shared.target.lock();
        sequence_id += 1;
        let cmd = CommandMessage::new(sequence_id, target, mode);
        match codec::encode_command(&cmd) {
            Ok(frame) => {
                if let Err(e) = sender.send(&frame) {
                    // Best-effort: the server holds position on its own
                    log::debug!("command publish failed: {e}");
                }
            }
            Err(e) => log::warn!("command encode failed: {e}"),
        }
        thread::sleep(period);
    }
    log::debug!("command publisher stopped after {sequence_id} samples");
}

/// Drain observations, keep only the newest decodable one
fn observation_loop(
    receiver: &mut UdpReceiver,
    shared: &ClientShared,
    running: &AtomicBool,
    liveness_timeout: Duration,
) {
    let mut tracker = SequenceTracker::new();
    while running.load(Ordering::Relaxed) {
        let frame = match receiver.receive(OBS_POLL_WINDOW) {
            Ok(frame) => frame,
            Err(ChannelError::Timeout) => continue,
            Err(e) => {
                log::debug!("observation receive failed: {e}");
                thread::sleep(OBS_POLL_WINDOW);
                continue;
            }
        };

        // Traffic resuming after a liveness gap may come from a restarted
        // server with fresh sequence ids; the old high-water mark must not
        // classify the new stream as stale.
        if shared
            .session
            .lock()
            .observation_stale(liveness_timeout, Instant::now())
        {
            log::info!("observation stream resumed after silence");
            tracker.reset();
        }

        // Anything still buffered is older than what comes next; decode
        // every frame but surface only the newest good one.
        let mut newest = None;
        let mut frames = vec![frame];
        while let Some(extra) = receiver.try_receive() {
            frames.push(extra);
        }
        for frame in frames {
            match codec::decode_observation(&frame) {
                Ok(obs) => match tracker.observe(obs.sequence_id) {
                    SequenceCheck::InOrder => newest = Some(obs),
                    SequenceCheck::Gap(n) => {
                        log::debug!("observation stream skipped {n} messages");
                        newest = Some(obs);
                    }
                    SequenceCheck::Stale => {
                        log::debug!("ignoring stale observation seq={}", obs.sequence_id);
                    }
                },
                Err(e) => log::warn!("dropping undecodable observation: {e}"),
            }
        }

        if let Some(obs) = newest {
            *shared.latest_observation.lock() = Some(obs);
            shared.session.lock().saw_observation(Instant::now());
        }
    }
    log::debug!("observation receiver stopped");
}
