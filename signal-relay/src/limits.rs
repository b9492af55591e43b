//! Rate limiting for signal-relay.
//!
//! Provides protection against registration flooding and signaling spam.
//!
//! ## Design Notes
//!
//! Clients reach the relay through browsers and NATs, so IP addresses are a
//! poor key. We rate limit by:
//! - **Identity** for registration attempts (reconnect storms)
//! - **Identity** for signaling/forward frames
//!
//! Both use the governor crate's keyed rate limiters backed by DashMap,
//! plus one direct limiter capping aggregate throughput.

use crate::config::LimitsConfig;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use signal_types::Identity;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Type alias for a direct (non-keyed) rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiters for the relay server.
#[derive(Clone)]
pub struct RateLimits {
    /// Limits registration attempts per identity.
    registration_limiter: Arc<KeyedLimiter<Identity>>,

    /// Limits signaling/forward frames per identity.
    message_limiter: Arc<KeyedLimiter<Identity>>,

    /// Global rate limiter across all clients.
    ///
    /// Prevents aggregate overload even if individual clients are within
    /// limits.
    global_limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("registration_limiter", &"KeyedLimiter<Identity>")
            .field("message_limiter", &"KeyedLimiter<Identity>")
            .field("global_limiter", &"DirectLimiter")
            .finish()
    }
}

impl RateLimits {
    /// Create rate limiters from configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configured values are zero.
    pub fn new(config: &LimitsConfig) -> Self {
        let registrations = NonZeroU32::new(config.registrations_per_minute)
            .expect("registrations_per_minute must be > 0");
        let registration_quota = Quota::per_minute(registrations);

        let messages = NonZeroU32::new(config.messages_per_minute)
            .expect("messages_per_minute must be > 0");
        let message_quota = Quota::per_minute(messages);

        let global = NonZeroU32::new(config.global_messages_per_second)
            .expect("global_messages_per_second must be > 0");
        let global_quota = Quota::per_second(global);

        Self {
            registration_limiter: Arc::new(RateLimiter::keyed(registration_quota)),
            message_limiter: Arc::new(RateLimiter::keyed(message_quota)),
            global_limiter: Arc::new(RateLimiter::direct(global_quota)),
        }
    }

    /// Check if a registration attempt is allowed for this identity.
    pub fn check_registration(&self, identity: &Identity) -> Result<(), RateLimitError> {
        self.registration_limiter
            .check_key(identity)
            .map_err(|_| RateLimitError::RegistrationLimitExceeded)
    }

    /// Check if a signaling/forward frame is allowed for this identity.
    pub fn check_message(&self, identity: &Identity) -> Result<(), RateLimitError> {
        self.message_limiter
            .check_key(identity)
            .map_err(|_| RateLimitError::MessageLimitExceeded)
    }

    /// Check the server-wide aggregate rate.
    pub fn check_global(&self) -> Result<(), RateLimitError> {
        self.global_limiter
            .check()
            .map_err(|_| RateLimitError::GlobalLimitExceeded)
    }

    /// Number of tracked registration keys (for metrics).
    pub fn registration_keys_count(&self) -> usize {
        self.registration_limiter.len()
    }

    /// Number of tracked message keys (for metrics).
    pub fn message_keys_count(&self) -> usize {
        self.message_limiter.len()
    }

    /// Evict idle entries from the keyed limiter maps.
    ///
    /// Disconnected identities leave entries behind; `retain_recent()`
    /// removes ones whose cells have fully recharged.
    pub fn shrink(&self) {
        self.registration_limiter.retain_recent();
        self.message_limiter.retain_recent();
    }
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Too many registration attempts for this identity.
    RegistrationLimitExceeded,
    /// Too many frames from this identity.
    MessageLimitExceeded,
    /// Global frame rate exceeded across all clients.
    GlobalLimitExceeded,
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegistrationLimitExceeded => {
                write!(f, "registration rate limit exceeded")
            }
            Self::MessageLimitExceeded => {
                write!(f, "message rate limit exceeded")
            }
            Self::GlobalLimitExceeded => {
                write!(f, "global rate limit exceeded")
            }
        }
    }
}

impl std::error::Error for RateLimitError {}
