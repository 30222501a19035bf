//! Transport channels for the teleoperation link.
//!
//! Each channel is a one-directional, best-effort message pipe between two
//! fixed endpoints: the Command Channel (operator → robot) and the
//! Observation Channel (robot → operator). Delivery is at-most-once and
//! unordered-safe; there are no acknowledgements and no backpressure beyond
//! local buffering.
//!
//! # Freshness over completeness
//!
//! Every receive endpoint buffers into a bounded [`ConflatingQueue`]: when
//! the queue is full, the newest message replaces the oldest. Stale
//! commands are unsafe and stale observations are misleading, so a slow
//! consumer always sees the most recent data rather than a backlog.
//!
//! # Wire
//!
//! One UDP datagram per encoded message. Send and receive never block the
//! caller's control loop: sends are fire-and-forget, receives are
//! non-blocking or time-bounded.

mod conflate;
mod udp;

pub use conflate::ConflatingQueue;
pub use udp::{UdpReceiver, UdpSender};

/// Default receive queue capacity when not configured
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;
