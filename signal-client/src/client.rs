//! LinkClient - the main interface for Peerlink.
//!
//! This module provides [`LinkClient`], the primary API for applications to
//! reach peers: it registers the local identity with the relay, routes
//! inbound signaling to per-peer sessions, surfaces typed events, and falls
//! back to relay-forwarded delivery when no direct transport exists.
//!
//! # Architecture
//!
//! ```text
//! Application → LinkClient → PeerSession → PeerConnector → WebRTC engine
//!                   ↓
//!            SignalingChannel → relay
//! ```

use signal_core::{PresenceRoster, SessionState};
use signal_types::{ClientFrame, Identity, ServerFrame, SignalMessage};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::connector::{ConnectorError, ConnectorFactory};
use crate::peers::PeerTable;
use crate::session::{PeerSession, SessionNotice};
use crate::signaling::{SignalingChannel, SignalingError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Signaling channel error.
    #[error("signaling error: {0}")]
    Signaling(#[from] SignalingError),

    /// Negotiation engine error.
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Unexpected relay behavior.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Not connected to the relay.
    #[error("not connected")]
    NotConnected,
}

/// How an application message reached (or will reach) the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    /// Sent over the direct peer transport.
    Direct,
    /// Handed to the relay for forwarding.
    Relayed,
}

/// Events emitted to the application layer.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// An application message arrived (direct or relayed).
    Message {
        /// Originating identity.
        sender: Identity,
        /// The application payload.
        payload: serde_json::Value,
        /// Which path delivered it.
        via: DeliveryPath,
    },
    /// A peer session changed connection state.
    ConnectionState {
        /// The remote identity.
        peer: Identity,
        /// The state entered.
        state: SessionState,
    },
    /// An identity came online or went offline.
    Presence {
        /// The identity that changed.
        identity: Identity,
        /// Whether it is now online.
        online: bool,
    },
    /// A peer started an audio/video call toward us.
    IncomingCall {
        /// The calling identity.
        peer: Identity,
        /// Whether the call includes video.
        has_video: bool,
    },
    /// A local call attempt failed to acquire media.
    CallFailed {
        /// The remote identity.
        peer: Identity,
        /// Description of the failure.
        error: String,
    },
    /// A relayed send could not be delivered: the target is offline.
    TargetOffline {
        /// The unreachable identity.
        target: Identity,
    },
    /// Our registration was displaced by a newer one for the same identity.
    Displaced,
}

/// The main Peerlink client.
///
/// Owns the Signaling Channel, the per-remote session table, and the event
/// stream consumed by the application.
pub struct LinkClient<S: SignalingChannel> {
    identity: Identity,
    relay_address: String,
    signaling: Arc<S>,
    factory: Arc<dyn ConnectorFactory>,
    peers: PeerTable,
    roster: Mutex<PresenceRoster>,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ClientEvent>>>,
    outbound_tx: mpsc::UnboundedSender<SignalMessage>,
    outbound_rx: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<SignalMessage>>>,
    notices_tx: mpsc::UnboundedSender<SessionNotice>,
    notices_rx: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<SessionNotice>>>,
}

impl<S: SignalingChannel + 'static> LinkClient<S> {
    /// Create a client for one identity.
    pub fn new(
        identity: Identity,
        relay_address: &str,
        signaling: S,
        factory: Arc<dyn ConnectorFactory>,
    ) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            identity,
            relay_address: relay_address.to_string(),
            signaling: Arc::new(signaling),
            factory,
            peers: PeerTable::new(),
            roster: Mutex::new(PresenceRoster::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            outbound_tx,
            outbound_rx: tokio::sync::Mutex::new(Some(outbound_rx)),
            notices_tx,
            notices_rx: tokio::sync::Mutex::new(Some(notices_rx)),
        })
    }

    /// Our identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Whether the Signaling Channel is up.
    pub fn is_connected(&self) -> bool {
        self.signaling.is_connected()
    }

    /// Identities currently online, per the last presence snapshot.
    pub fn online(&self) -> Vec<Identity> {
        self.roster.lock().unwrap().online()
    }

    /// Take the event stream.
    ///
    /// At most one receiver is live; taking again replaces the consumer
    /// (the previous receiver simply stops receiving).
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ClientEvent>> {
        self.events_rx.lock().unwrap().take()
    }

    /// Connect to the relay and register our identity.
    ///
    /// Completes once the relay's `Welcome` (carrying the online set) is
    /// received.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.signaling.connect(&self.relay_address).await?;
        self.signaling
            .send(&ClientFrame::Register {
                identity: self.identity.clone(),
            })
            .await?;

        match self.signaling.recv().await? {
            ServerFrame::Welcome { online } => {
                self.apply_presence(&online);
                tracing::info!(identity = %self.identity, peers = online.len(), "registered with relay");
                Ok(())
            }
            other => Err(ClientError::Protocol(format!(
                "expected Welcome, got {other:?}"
            ))),
        }
    }

    /// Gracefully leave the relay and tear down all sessions.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        for session in self.peers.all() {
            session.close().await;
        }
        if self.signaling.is_connected() {
            let _ = self.signaling.send(&ClientFrame::Bye).await;
        }
        self.signaling.close().await?;
        Ok(())
    }

    /// Start the background pumps: inbound frames, outbound signaling, and
    /// session notices.
    ///
    /// Inbound negotiation work is spawned per message, so one session's
    /// in-flight negotiation never blocks traffic for other peers.
    pub fn start(self: &Arc<Self>) {
        // Outbound: session-emitted signaling → relay
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let mut rx = match client.outbound_rx.lock().await.take() {
                Some(rx) => rx,
                None => return,
            };
            while let Some(message) = rx.recv().await {
                if let Err(e) = client
                    .signaling
                    .send(&ClientFrame::Signal { message })
                    .await
                {
                    tracing::warn!(error = %e, "failed to send signaling message");
                }
            }
        });

        // Session notices → application events
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let mut rx = match client.notices_rx.lock().await.take() {
                Some(rx) => rx,
                None => return,
            };
            while let Some(notice) = rx.recv().await {
                client.publish_notice(notice);
            }
        });

        // Inbound frames
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match client.signaling.recv().await {
                    Ok(frame) => client.handle_frame(frame).await,
                    Err(SignalingError::ConnectionClosed) => {
                        tracing::info!("signaling channel closed");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "signaling receive failed");
                        break;
                    }
                }
            }
        });
    }

    /// Begin negotiating a direct transport to a remote identity.
    ///
    /// Idempotent against a live session; a session that already failed or
    /// closed is torn down and replaced by a fresh one.
    pub async fn initiate(&self, remote: Identity) {
        let session = self.fresh_session_for(remote);
        session.initiate().await;
    }

    /// Start an audio/video call toward a remote identity.
    pub async fn start_call(&self, remote: Identity, video: bool) -> Result<(), ClientError> {
        let session = self.fresh_session_for(remote);
        session.start_call(video).await?;
        Ok(())
    }

    /// Send an application message, preferring the direct transport.
    ///
    /// Falls back to relay forwarding when the session has no open
    /// transport. The relay answers `TargetOffline` if the recipient is not
    /// registered either.
    pub async fn send_to(
        &self,
        remote: &Identity,
        payload: serde_json::Value,
    ) -> Result<DeliveryPath, ClientError> {
        if let Some(session) = self.peers.get(remote) {
            let bytes = serde_json::to_vec(&payload)
                .map_err(|e| ClientError::Serialization(e.to_string()))?;
            if session.send(&bytes).await {
                return Ok(DeliveryPath::Direct);
            }
        }

        self.signaling
            .send(&ClientFrame::Forward {
                target: remote.clone(),
                payload,
            })
            .await?;
        Ok(DeliveryPath::Relayed)
    }

    /// Tear down the session for a remote, if any.
    pub async fn close_peer(&self, remote: &Identity) {
        if let Some(session) = self.peers.remove(remote) {
            session.close().await;
        }
    }

    /// Reset the session for a remote back to a fresh state.
    pub async fn reset_peer(&self, remote: &Identity) {
        if let Some(session) = self.peers.get(remote) {
            session.reset().await;
        }
    }

    /// The session for a remote, if one exists.
    pub fn session(&self, remote: &Identity) -> Option<Arc<PeerSession>> {
        self.peers.get(remote)
    }

    /// Handle one inbound relay frame (used by the started pumps; public
    /// so tests can drive frames deterministically).
    pub async fn handle_frame(self: &Arc<Self>, frame: ServerFrame) {
        match frame {
            ServerFrame::Signal { message } => {
                // Spawned: a slow negotiation step for one peer must not
                // stall frames for other peers.
                let client = Arc::clone(self);
                tokio::spawn(async move {
                    client.handle_signal_message(message).await;
                });
            }
            ServerFrame::Forwarded { sender, payload } => {
                let _ = self.events_tx.send(ClientEvent::Message {
                    sender,
                    payload,
                    via: DeliveryPath::Relayed,
                });
            }
            ServerFrame::Welcome { online } | ServerFrame::Presence { online } => {
                self.apply_presence(&online);
            }
            ServerFrame::TargetOffline { target } => {
                tracing::debug!(%target, "relay reported target offline");
                let _ = self.events_tx.send(ClientEvent::TargetOffline { target });
            }
            ServerFrame::Displaced => {
                tracing::warn!(identity = %self.identity, "registration displaced by another endpoint");
                let _ = self.events_tx.send(ClientEvent::Displaced);
            }
        }
    }

    /// Route one inbound signaling message to its session.
    pub async fn handle_signal_message(&self, message: SignalMessage) {
        if message.target() != &self.identity {
            tracing::warn!(
                target = %message.target(),
                "dropping signaling message addressed to someone else"
            );
            return;
        }

        let sender = message.sender().clone();
        let session = match &message {
            // An offer (or an early candidate racing ahead of its offer)
            // may be first contact: create the responder session on demand.
            SignalMessage::Offer { .. } | SignalMessage::CallOffer { .. } => {
                Some(self.fresh_session_for(sender))
            }
            SignalMessage::Candidate { .. } => Some(self.session_for(sender)),
            // An answer without a session means we never offered: drop it.
            SignalMessage::Answer { .. } => self.peers.get(&sender),
        };

        match session {
            Some(session) => session.handle_signal(message).await,
            None => {
                tracing::warn!(
                    kind = message.kind(),
                    sender = %message.sender(),
                    "discarding signaling message with no session"
                );
            }
        }
    }

    /// Drain queued outbound signaling to the relay (inline alternative to
    /// the started pump, for deterministic tests).
    pub async fn drain_outbound(&self) -> Result<(), ClientError> {
        let mut guard = self.outbound_rx.lock().await;
        if let Some(rx) = guard.as_mut() {
            while let Ok(message) = rx.try_recv() {
                self.signaling
                    .send(&ClientFrame::Signal { message })
                    .await?;
            }
        }
        Ok(())
    }

    /// Drain queued session notices into application events (inline
    /// alternative to the started pump, for deterministic tests).
    pub async fn drain_notices(&self) {
        let mut guard = self.notices_rx.lock().await;
        if let Some(rx) = guard.as_mut() {
            while let Ok(notice) = rx.try_recv() {
                self.publish_notice(notice);
            }
        }
    }

    fn session_for(&self, remote: Identity) -> Arc<PeerSession> {
        let local = self.identity.clone();
        let factory = self.factory.clone();
        let outbound = self.outbound_tx.clone();
        let notices = self.notices_tx.clone();
        self.peers.get_or_create(remote.clone(), move || {
            PeerSession::spawn(local, remote, factory, outbound, notices)
        })
    }

    fn fresh_session_for(&self, remote: Identity) -> Arc<PeerSession> {
        let local = self.identity.clone();
        let factory = self.factory.clone();
        let outbound = self.outbound_tx.clone();
        let notices = self.notices_tx.clone();
        self.peers.fresh_or_existing(remote.clone(), move || {
            PeerSession::spawn(local, remote, factory, outbound, notices)
        })
    }

    fn apply_presence(&self, online: &[Identity]) {
        let changes = self.roster.lock().unwrap().apply_snapshot(online);
        for change in changes {
            let event = match change {
                signal_core::PresenceChange::Joined(identity) => ClientEvent::Presence {
                    identity,
                    online: true,
                },
                signal_core::PresenceChange::Left(identity) => ClientEvent::Presence {
                    identity,
                    online: false,
                },
            };
            let _ = self.events_tx.send(event);
        }
    }

    fn publish_notice(&self, notice: SessionNotice) {
        let event = match notice {
            SessionNotice::ConnectionState { remote, state } => ClientEvent::ConnectionState {
                peer: remote,
                state,
            },
            SessionNotice::Message { remote, data } => {
                match serde_json::from_slice(&data) {
                    Ok(payload) => ClientEvent::Message {
                        sender: remote,
                        payload,
                        via: DeliveryPath::Direct,
                    },
                    Err(e) => {
                        tracing::warn!(sender = %remote, error = %e, "dropping non-JSON direct message");
                        return;
                    }
                }
            }
            SessionNotice::IncomingCall { remote, has_video } => ClientEvent::IncomingCall {
                peer: remote,
                has_video,
            },
            SessionNotice::MediaFailure { remote, error } => ClientEvent::CallFailed {
                peer: remote,
                error,
            },
        };
        let _ = self.events_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::MockConnectorFactory;
    use crate::signaling::MockSignaling;
    use signal_types::SdpPayload;

    fn identity(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    fn client_with(
        local: &str,
        signaling: &MockSignaling,
        factory: &Arc<MockConnectorFactory>,
    ) -> Arc<LinkClient<MockSignaling>> {
        LinkClient::new(
            identity(local),
            "ws://relay.test:9000",
            signaling.clone(),
            factory.clone(),
        )
    }

    fn sdp(kind: &str) -> SdpPayload {
        SdpPayload {
            sdp_type: kind.into(),
            sdp: format!("v=0\r\n{kind}"),
        }
    }

    #[tokio::test]
    async fn connect_registers_and_seeds_roster() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome {
            online: vec![identity("bob")],
        });
        let factory = MockConnectorFactory::new();
        let client = client_with("alice", &signaling, &factory);

        client.connect().await.unwrap();

        assert_eq!(
            signaling.sent_frames(),
            vec![ClientFrame::Register {
                identity: identity("alice")
            }]
        );
        assert_eq!(client.online(), vec![identity("bob")]);

        let mut events = client.take_events().unwrap();
        assert!(matches!(
            events.try_recv().unwrap(),
            ClientEvent::Presence { online: true, .. }
        ));
    }

    #[tokio::test]
    async fn connect_rejects_unexpected_first_frame() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Presence { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("alice", &signaling, &factory);

        assert!(matches!(
            client.connect().await,
            Err(ClientError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn initiate_sends_offer_through_relay() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("alice", &signaling, &factory);
        client.connect().await.unwrap();

        client.initiate(identity("bob")).await;
        client.drain_outbound().await.unwrap();

        let last = signaling.last_sent().unwrap();
        match last {
            ClientFrame::Signal { message } => {
                assert_eq!(message.kind(), "offer");
                assert_eq!(message.target().as_str(), "bob");
            }
            other => panic!("expected Signal frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inbound_offer_creates_session_and_answers() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("bob", &signaling, &factory);
        client.connect().await.unwrap();

        client
            .handle_signal_message(SignalMessage::Offer {
                sender: identity("alice"),
                target: identity("bob"),
                payload: sdp("offer"),
            })
            .await;
        client.drain_outbound().await.unwrap();

        assert!(client.session(&identity("alice")).is_some());
        let last = signaling.last_sent().unwrap();
        match last {
            ClientFrame::Signal { message } => assert_eq!(message.kind(), "answer"),
            other => panic!("expected Signal frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn misaddressed_signal_dropped() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("bob", &signaling, &factory);
        client.connect().await.unwrap();

        client
            .handle_signal_message(SignalMessage::Offer {
                sender: identity("alice"),
                target: identity("carol"),
                payload: sdp("offer"),
            })
            .await;

        assert!(client.session(&identity("alice")).is_none());
    }

    #[tokio::test]
    async fn answer_without_session_dropped() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("alice", &signaling, &factory);
        client.connect().await.unwrap();

        client
            .handle_signal_message(SignalMessage::Answer {
                sender: identity("bob"),
                target: identity("alice"),
                payload: sdp("answer"),
            })
            .await;

        assert!(client.session(&identity("bob")).is_none());
    }

    #[tokio::test]
    async fn send_falls_back_to_relay_when_not_connected() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("alice", &signaling, &factory);
        client.connect().await.unwrap();

        // No session at all: relayed
        let path = client
            .send_to(&identity("bob"), serde_json::json!({"body": "hi"}))
            .await
            .unwrap();
        assert_eq!(path, DeliveryPath::Relayed);

        // Session exists but transport not open: still relayed
        client.initiate(identity("bob")).await;
        let path = client
            .send_to(&identity("bob"), serde_json::json!({"body": "hi again"}))
            .await
            .unwrap();
        assert_eq!(path, DeliveryPath::Relayed);

        let forwards = signaling
            .sent_frames()
            .into_iter()
            .filter(|f| matches!(f, ClientFrame::Forward { .. }))
            .count();
        assert_eq!(forwards, 2);
    }

    #[tokio::test]
    async fn send_prefers_direct_transport() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("alice", &signaling, &factory);
        client.connect().await.unwrap();

        client.initiate(identity("bob")).await;
        factory.last().unwrap().set_open(true);
        client
            .session(&identity("bob"))
            .unwrap()
            .handle_connector_event(crate::connector::ConnectorEvent::TransportOpened)
            .await;

        let path = client
            .send_to(&identity("bob"), serde_json::json!({"body": "direct"}))
            .await
            .unwrap();
        assert_eq!(path, DeliveryPath::Direct);
        assert_eq!(factory.last().unwrap().sent().len(), 1);
    }

    #[tokio::test]
    async fn forwarded_frame_becomes_message_event() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("bob", &signaling, &factory);
        client.connect().await.unwrap();
        let mut events = client.take_events().unwrap();

        client
            .handle_frame(ServerFrame::Forwarded {
                sender: identity("alice"),
                payload: serde_json::json!({"body": "hello"}),
            })
            .await;

        match events.try_recv().unwrap() {
            ClientEvent::Message {
                sender,
                payload,
                via,
            } => {
                assert_eq!(sender, identity("alice"));
                assert_eq!(payload["body"], "hello");
                assert_eq!(via, DeliveryPath::Relayed);
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn presence_updates_emit_events() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("alice", &signaling, &factory);
        client.connect().await.unwrap();
        let mut events = client.take_events().unwrap();

        client
            .handle_frame(ServerFrame::Presence {
                online: vec![identity("bob")],
            })
            .await;
        client
            .handle_frame(ServerFrame::Presence { online: vec![] })
            .await;

        assert!(matches!(
            events.try_recv().unwrap(),
            ClientEvent::Presence { online: true, .. }
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            ClientEvent::Presence { online: false, .. }
        ));
    }

    #[tokio::test]
    async fn target_offline_surfaces_event() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("alice", &signaling, &factory);
        client.connect().await.unwrap();
        let mut events = client.take_events().unwrap();

        client
            .handle_frame(ServerFrame::TargetOffline {
                target: identity("bob"),
            })
            .await;

        assert!(matches!(
            events.try_recv().unwrap(),
            ClientEvent::TargetOffline { .. }
        ));
    }

    #[tokio::test]
    async fn offer_for_closed_session_gets_fresh_one() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("bob", &signaling, &factory);
        client.connect().await.unwrap();

        client
            .handle_signal_message(SignalMessage::Offer {
                sender: identity("alice"),
                target: identity("bob"),
                payload: sdp("offer"),
            })
            .await;
        let first = client.session(&identity("alice")).unwrap();
        first.close().await;

        client
            .handle_signal_message(SignalMessage::Offer {
                sender: identity("alice"),
                target: identity("bob"),
                payload: sdp("offer"),
            })
            .await;
        let second = client.session(&identity("alice")).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn disconnect_says_bye_and_closes_sessions() {
        let signaling = MockSignaling::new();
        signaling.queue_frame(ServerFrame::Welcome { online: vec![] });
        let factory = MockConnectorFactory::new();
        let client = client_with("alice", &signaling, &factory);
        client.connect().await.unwrap();
        client.initiate(identity("bob")).await;

        client.disconnect().await.unwrap();

        assert!(!client.is_connected());
        assert!(signaling
            .sent_frames()
            .iter()
            .any(|f| matches!(f, ClientFrame::Bye)));
        assert_eq!(
            client.session(&identity("bob")).unwrap().state(),
            SessionState::Closed
        );
    }
}
