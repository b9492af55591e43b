//! # signal-relay
//!
//! Signaling relay and session directory for Peerlink.
//!
//! This crate implements a relay server that:
//! - Accepts WebSocket Signaling Channels from many clients
//! - Maps each registered identity to its current channel endpoint
//! - Forwards session negotiation messages by target identity
//! - Forwards application messages as a fallback when no direct path exists
//! - Publishes the full online-identity set on every membership change
//!
//! ## Architecture
//!
//! ```text
//! Client A ──┐                    ┌── Client B
//!            │    WebSocket      │
//!            ├──────────────────►│
//!            │                   │
//!        ┌───┴───────────────────┴───┐
//!        │       signal-relay        │
//!        │  ┌─────────────────────┐  │
//!        │  │ Directory (memory)  │  │
//!        │  └─────────────────────┘  │
//!        └───────────────────────────┘
//! ```
//!
//! The Directory is the relay's only state and is never persisted: entries
//! exist exactly as long as the registering channel (or until displaced by a
//! newer registration for the same identity).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod limits;
pub mod server;
pub mod session;
