//! Error types for the teleoperation link.
//!
//! Three narrow taxonomies cover the recoverable failure surfaces
//! ([`ChannelError`], [`CodecError`], [`ActuationError`]); the crate-level
//! [`Error`] wraps them for the binaries and configuration loading.
//!
//! Propagation policy: transport and codec errors are handled inside the
//! owning loop iteration and never escalate past it. Actuation faults
//! propagate to the server state machine, which decides between holding
//! position and stopping.

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Transport channel failures. Both variants are recoverable: the caller
/// retries, or marks the session stale and carries on.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Endpoint could not be bound, or the peer address could not be
    /// resolved or reached
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// A timed receive exceeded its deadline
    #[error("channel receive timed out")]
    Timeout,
}

/// Wire format failures. A single bad message is dropped with a warning;
/// the channel keeps operating.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Truncated frame, bad length prefix, or invalid payload syntax
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Payload parsed but a required field is absent or has the wrong type
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}

/// Robot actuation failures.
#[derive(Debug, thiserror::Error)]
pub enum ActuationError {
    /// Target outside the variant's safe envelope. The last known-safe
    /// command stays in effect.
    #[error("target out of range: {0}")]
    OutOfRange(String),

    /// Unrecoverable hardware failure. Halts command execution.
    #[error("hardware fault: {0}")]
    HardwareFault(String),
}

/// Crate-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration load or validation error
    #[error("config error: {0}")]
    Config(String),

    /// Transport channel error
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Wire codec error
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Robot actuation error
    #[error(transparent)]
    Actuation(#[from] ActuationError),

    /// Unknown robot variant in configuration
    #[error("unknown robot type: {0}")]
    UnknownRobot(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
