//! Session negotiation messages.
//!
//! These are the payloads a client emits while negotiating a direct
//! transport with a peer. The relay forwards them by `target` alone and
//! never inspects the negotiation payload.

use serde::{Deserialize, Serialize};

use crate::{Identity, SignalError};

/// An SDP session description as produced by the negotiation engine.
///
/// Field names match the browser `RTCSessionDescription` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpPayload {
    /// Description type ("offer" or "answer").
    #[serde(rename = "type")]
    pub sdp_type: String,
    /// The SDP body.
    pub sdp: String,
}

impl SdpPayload {
    /// Validate the payload content.
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.sdp_type != "offer" && self.sdp_type != "answer" {
            return Err(SignalError::InvalidPayload(format!(
                "unknown sdp type: {}",
                self.sdp_type
            )));
        }
        if self.sdp.is_empty() {
            return Err(SignalError::InvalidPayload("empty sdp".into()));
        }
        Ok(())
    }
}

/// A trickled ICE candidate.
///
/// Field names match the browser `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePayload {
    /// The candidate attribute line.
    pub candidate: String,
    /// Media stream identification tag, when present.
    #[serde(rename = "sdpMid", skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// Index of the media description this candidate belongs to.
    #[serde(rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

impl CandidatePayload {
    /// Validate the payload content.
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.candidate.is_empty() {
            return Err(SignalError::InvalidPayload("empty candidate".into()));
        }
        Ok(())
    }
}

/// A session negotiation message.
///
/// `sender` and `target` are mandatory on every variant; the relay routes on
/// `target` and the receiving session validates the payload for its kind
/// before applying it. Unknown kinds fail deserialization and are dropped by
/// the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SignalMessage {
    /// Initial session description from the initiator.
    Offer {
        /// Originating identity.
        sender: Identity,
        /// Recipient identity.
        target: Identity,
        /// The offer description.
        payload: SdpPayload,
    },
    /// Responder's session description.
    Answer {
        /// Originating identity.
        sender: Identity,
        /// Recipient identity.
        target: Identity,
        /// The answer description.
        payload: SdpPayload,
    },
    /// A trickled ICE candidate.
    Candidate {
        /// Originating identity.
        sender: Identity,
        /// Recipient identity.
        target: Identity,
        /// The candidate.
        payload: CandidatePayload,
    },
    /// Renegotiation offer that adds audio/video media to a session.
    CallOffer {
        /// Originating identity.
        sender: Identity,
        /// Recipient identity.
        target: Identity,
        /// The renegotiation offer description.
        payload: SdpPayload,
        /// Whether the call includes video.
        #[serde(rename = "hasVideo")]
        has_video: bool,
    },
}

impl SignalMessage {
    /// The originating identity.
    pub fn sender(&self) -> &Identity {
        match self {
            Self::Offer { sender, .. }
            | Self::Answer { sender, .. }
            | Self::Candidate { sender, .. }
            | Self::CallOffer { sender, .. } => sender,
        }
    }

    /// The recipient identity the relay routes on.
    pub fn target(&self) -> &Identity {
        match self {
            Self::Offer { target, .. }
            | Self::Answer { target, .. }
            | Self::Candidate { target, .. }
            | Self::CallOffer { target, .. } => target,
        }
    }

    /// The wire name of this message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::CallOffer { .. } => "call-offer",
        }
    }

    /// Validate the negotiation payload for this kind.
    pub fn validate(&self) -> Result<(), SignalError> {
        match self {
            Self::Offer { payload, .. }
            | Self::Answer { payload, .. }
            | Self::CallOffer { payload, .. } => payload.validate(),
            Self::Candidate { payload, .. } => payload.validate(),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SignalError> {
        serde_json::to_vec(self).map_err(SignalError::Serialization)
    }

    /// Deserialize from JSON bytes, validating the payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignalError> {
        let message: Self =
            serde_json::from_slice(bytes).map_err(SignalError::Deserialization)?;
        message.validate()?;
        Ok(message)
    }
}
