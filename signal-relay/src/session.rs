//! Per-channel session management.
//!
//! Each Signaling Channel gets a ChannelSession that tracks registration
//! state and handles frames.

use crate::directory::EndpointHandle;
use crate::error::{ProtocolError, ProtocolResult};
use crate::server::{ForwardOutcome, SignalRelay};
use signal_types::{ClientFrame, Identity, ServerFrame};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Channel session state machine states.
#[derive(Debug, Clone)]
pub enum ChannelState {
    /// Waiting for the Register frame.
    AwaitingRegister,
    /// Channel is bound to an identity in the directory.
    Active {
        /// The registered identity.
        identity: Identity,
    },
    /// Channel is closing.
    Closing,
}

/// A per-channel session.
pub struct ChannelSession {
    relay: Arc<SignalRelay>,
    endpoint: EndpointHandle,
    state: ChannelState,
}

impl ChannelSession {
    /// Create a new session for a channel endpoint.
    pub fn new(relay: Arc<SignalRelay>, endpoint: EndpointHandle) -> Self {
        Self {
            relay,
            endpoint,
            state: ChannelState::AwaitingRegister,
        }
    }

    /// The registered identity, once Register succeeded.
    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            ChannelState::Active { identity } => Some(identity),
            _ => None,
        }
    }

    /// Whether the channel has completed registration.
    pub fn is_registered(&self) -> bool {
        matches!(self.state, ChannelState::Active { .. })
    }

    /// Whether the channel said Bye.
    pub fn is_closing(&self) -> bool {
        matches!(self.state, ChannelState::Closing)
    }

    /// Handle one decoded frame.
    ///
    /// Errors here are per-frame: the caller logs and counts them, but the
    /// channel keeps running (except after Bye).
    pub fn handle_frame(&mut self, frame: ClientFrame) -> ProtocolResult<()> {
        if self.is_closing() {
            return Ok(());
        }

        let identity = match self.identity() {
            Some(identity) => identity.clone(),
            None => {
                return match frame {
                    ClientFrame::Register { identity } => self.handle_register(identity),
                    _ => Err(ProtocolError::NotRegistered),
                };
            }
        };

        match frame {
            ClientFrame::Register { .. } => Err(ProtocolError::UnexpectedFrame {
                state: format!("{:?}", self.state),
                frame: "Register".to_string(),
            }),
            ClientFrame::Signal { message } => {
                self.check_message_limits(&identity)?;

                // A channel may only speak as the identity it registered.
                if message.sender() != &identity {
                    return Err(ProtocolError::SenderMismatch {
                        registered: identity.to_string(),
                        claimed: message.sender().to_string(),
                    });
                }

                self.relay.directory().touch(&identity);
                if self.relay.forward(message.clone()) == ForwardOutcome::TargetOffline {
                    self.endpoint.send(ServerFrame::TargetOffline {
                        target: message.target().clone(),
                    });
                }
                Ok(())
            }
            ClientFrame::Forward { target, payload } => {
                self.check_message_limits(&identity)?;

                self.relay.directory().touch(&identity);
                if self.relay.forward_app(&identity, &target, payload)
                    == ForwardOutcome::TargetOffline
                {
                    self.endpoint.send(ServerFrame::TargetOffline { target });
                }
                Ok(())
            }
            ClientFrame::Bye => {
                tracing::debug!(%identity, "client said bye");
                self.finish();
                self.state = ChannelState::Closing;
                Ok(())
            }
        }
    }

    /// Deregister this channel's identity (no-op if displaced or never
    /// registered). Safe to call more than once.
    pub fn finish(&mut self) {
        if let ChannelState::Active { identity } = &self.state {
            self.relay.deregister(identity, self.endpoint.id());
        }
    }

    fn handle_register(&mut self, identity: Identity) -> ProtocolResult<()> {
        if let Err(e) = self.relay.rate_limits().check_registration(&identity) {
            self.relay
                .metrics()
                .rate_limit_hits
                .fetch_add(1, Ordering::Relaxed);
            return Err(ProtocolError::RateLimited {
                reason: e.to_string(),
            });
        }

        self.relay.register(identity.clone(), self.endpoint.clone());
        self.state = ChannelState::Active {
            identity: identity.clone(),
        };

        // Welcome carries the authoritative online set for this client,
        // so a channel that missed earlier broadcasts starts correct.
        // It must be the first frame on the new channel, so presence is
        // published afterwards.
        self.endpoint.send(ServerFrame::Welcome {
            online: self.relay.online_identities(),
        });
        self.relay.broadcast_presence();
        Ok(())
    }

    fn check_message_limits(&self, identity: &Identity) -> ProtocolResult<()> {
        if let Err(e) = self.relay.rate_limits().check_global() {
            self.relay
                .metrics()
                .rate_limit_hits
                .fetch_add(1, Ordering::Relaxed);
            return Err(ProtocolError::RateLimited {
                reason: e.to_string(),
            });
        }
        if let Err(e) = self.relay.rate_limits().check_message(identity) {
            tracing::warn!(%identity, "message rate limited");
            self.relay
                .metrics()
                .rate_limit_hits
                .fetch_add(1, Ordering::Relaxed);
            return Err(ProtocolError::RateLimited {
                reason: e.to_string(),
            });
        }
        Ok(())
    }
}
