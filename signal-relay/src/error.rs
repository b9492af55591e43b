//! Error types for signal-relay.

/// Main error type for relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-channel protocol errors.
///
/// None of these tear the relay down; they end (at worst) the offending
/// channel and are counted in the metrics.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame could not be decoded.
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] signal_types::SignalError),

    /// A frame exceeded the configured size limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Actual size of the frame.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// A non-Register frame arrived before registration.
    #[error("channel not registered: Register required first")]
    NotRegistered,

    /// A frame that is invalid in the current channel state.
    #[error("unexpected frame in state {state}: {frame}")]
    UnexpectedFrame {
        /// The channel state.
        state: String,
        /// The offending frame type.
        frame: String,
    },

    /// The envelope sender does not match the registered identity.
    #[error("sender mismatch: registered as {registered}, claimed {claimed}")]
    SenderMismatch {
        /// The identity this channel registered.
        registered: String,
        /// The identity the frame claimed.
        claimed: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited: {reason}")]
    RateLimited {
        /// Which limit was hit.
        reason: String,
    },
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for per-channel protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
