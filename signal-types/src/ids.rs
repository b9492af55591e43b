//! Identity type for the Peerlink network.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SignalError;

/// Maximum accepted identity length in bytes.
///
/// Wallet addresses are well under this; the bound exists so a hostile
/// client cannot register megabyte-sized keys into the relay directory.
pub const MAX_IDENTITY_LEN: usize = 256;

/// An opaque, stable identifier for a party.
///
/// Supplied by the authentication collaborator (a wallet address in the
/// source system) and immutable for the process lifetime of a client.
/// Identities are totally ordered so the presence list and the glare
/// tie-break are deterministic.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Create an identity, validating the raw string.
    ///
    /// Rejects empty strings, oversized strings, and strings containing
    /// control characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, SignalError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(SignalError::InvalidIdentity("empty".into()));
        }
        if raw.len() > MAX_IDENTITY_LEN {
            return Err(SignalError::InvalidIdentity(format!(
                "too long: {} bytes (max {})",
                raw.len(),
                MAX_IDENTITY_LEN
            )));
        }
        if raw.chars().any(|c| c.is_control()) {
            return Err(SignalError::InvalidIdentity(
                "contains control characters".into(),
            ));
        }
        Ok(Self(raw))
    }

    /// The raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = SignalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}
