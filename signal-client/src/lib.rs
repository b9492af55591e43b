//! # signal-client
//!
//! Client library for the Peerlink peer session establishment protocol.
//!
//! This is the library applications embed to reach peers: it negotiates
//! direct transports through a relay-backed Signaling Channel and falls back
//! to relay-forwarded delivery when no direct path exists.
//!
//! ## Architecture
//!
//! ```text
//! Application → LinkClient → PeerSession → PeerConnector → WebRTC engine
//!                   ↓             ↓
//!          SignalingChannel   signal-core (pure state machine)
//! ```
//!
//! Each [`PeerSession`] owns one negotiation toward one remote identity and
//! interprets the actions produced by the pure session machine. The
//! [`PeerConnector`] and [`SignalingChannel`] seams are pluggable; mock
//! implementations ship for testing.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod connector;
pub mod peers;
pub mod session;
pub mod signaling;

pub use client::{ClientEvent, ClientError, DeliveryPath, LinkClient};
pub use connector::{
    ConnectorError, ConnectorEvent, ConnectorFactory, MockConnector, MockConnectorFactory,
    PeerConnector,
};
pub use peers::PeerTable;
pub use session::{PeerSession, SessionNotice};
pub use signaling::{MockSignaling, SignalingChannel, SignalingError, WsSignaling};
