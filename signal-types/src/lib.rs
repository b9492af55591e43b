//! # signal-types
//!
//! Wire format types for the Peerlink signaling protocol.
//!
//! This crate provides the foundational types used across all Peerlink crates:
//! - [`Identity`] - Opaque party identifier (a wallet address in practice)
//! - [`SignalMessage`] - Session negotiation messages (offer, answer, candidate, call-offer)
//! - [`ClientFrame`] / [`ServerFrame`] - The envelopes exchanged over a Signaling Channel
//! - [`SignalError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frames;
mod ids;
mod messages;

pub use error::SignalError;
pub use frames::{ClientFrame, ServerFrame};
pub use ids::{Identity, MAX_IDENTITY_LEN};
pub use messages::{CandidatePayload, SdpPayload, SignalMessage};
