//! Signaling Channel abstraction.
//!
//! The Signaling Channel is the always-on, ordered, reliable connection to
//! the relay, used only for registration, negotiation messages, presence,
//! and relay-fallback delivery. The trait abstracts the underlying
//! connection mechanism (WebSocket, mock for testing).

mod mock;
mod ws;

pub use mock::MockSignaling;
pub use ws::WsSignaling;

use async_trait::async_trait;
use signal_types::{ClientFrame, ServerFrame};
use thiserror::Error;

/// Signaling channel errors.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] signal_types::SignalError),
}

/// Transport trait for the client↔relay Signaling Channel.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Connect to the relay at the given address.
    async fn connect(&self, address: &str) -> Result<(), SignalingError>;

    /// Send a frame to the relay.
    async fn send(&self, frame: &ClientFrame) -> Result<(), SignalingError>;

    /// Receive the next frame from the relay.
    ///
    /// Blocks until a frame is available or the connection closes.
    async fn recv(&self) -> Result<ServerFrame, SignalingError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), SignalingError>;
}
