//! Error types for Peerlink wire format handling.

use thiserror::Error;

/// Errors that can occur while constructing or decoding wire types.
#[derive(Debug, Error)]
pub enum SignalError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Identity failed validation
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// A negotiation payload failed validation
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SignalError::InvalidIdentity("empty".into());
        assert_eq!(err.to_string(), "invalid identity: empty");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SignalError>();
    }
}
