//! Signaling Channel frames.
//!
//! A Signaling Channel carries exactly these envelopes: registration and
//! negotiation traffic from the client, plus routing results and presence
//! from the relay. Application payloads appear only inside the relay
//! fallback frames (`Forward`/`Forwarded`) and stay opaque to the relay.

use serde::{Deserialize, Serialize};

use crate::{Identity, SignalError, SignalMessage};

/// Frames sent from a client to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Bind this channel to an identity in the relay directory.
    Register {
        /// The identity to register.
        identity: Identity,
    },
    /// A session negotiation message to forward.
    Signal {
        /// The negotiation message.
        message: SignalMessage,
    },
    /// Relay-fallback delivery of an application message.
    ///
    /// Used when no direct transport to the target exists. The payload is
    /// opaque JSON the relay never inspects.
    Forward {
        /// Recipient identity.
        target: Identity,
        /// Opaque application payload.
        payload: serde_json::Value,
    },
    /// Graceful disconnect.
    Bye,
}

/// Frames sent from the relay to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// Registration accepted; carries the current online set.
    Welcome {
        /// All currently-online identities, sorted.
        online: Vec<Identity>,
    },
    /// A forwarded session negotiation message.
    Signal {
        /// The negotiation message.
        message: SignalMessage,
    },
    /// A relay-fallback application message from another client.
    Forwarded {
        /// Originating identity.
        sender: Identity,
        /// Opaque application payload.
        payload: serde_json::Value,
    },
    /// Full online-identity set, published on every membership change.
    Presence {
        /// All currently-online identities, sorted.
        online: Vec<Identity>,
    },
    /// A forward or signal could not be delivered: the target is offline.
    TargetOffline {
        /// The identity that could not be resolved.
        target: Identity,
    },
    /// This channel's registration was displaced by a newer registration
    /// for the same identity (reconnect from elsewhere).
    Displaced,
}

impl ClientFrame {
    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SignalError> {
        serde_json::to_vec(self).map_err(SignalError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignalError> {
        let frame: Self = serde_json::from_slice(bytes).map_err(SignalError::Deserialization)?;
        if let Self::Signal { message } = &frame {
            message.validate()?;
        }
        Ok(frame)
    }
}

impl ServerFrame {
    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SignalError> {
        serde_json::to_vec(self).map_err(SignalError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignalError> {
        serde_json::from_slice(bytes).map_err(SignalError::Deserialization)
    }
}
