//! Per-peer session driver.
//!
//! [`PeerSession`] owns one negotiation toward one remote identity: it feeds
//! events into the pure machine from signal-core and interprets the returned
//! actions against the [`PeerConnector`] seam, emitting signaling messages
//! and application notices as it goes.

use signal_core::{SessionAction, SessionEvent, SessionMachine, SessionState};
use signal_types::{Identity, SignalMessage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::connector::{ConnectorError, ConnectorEvent, ConnectorFactory, PeerConnector};

/// Notices a session surfaces to its owner.
#[derive(Debug, Clone)]
pub enum SessionNotice {
    /// The session entered a new connection state.
    ConnectionState {
        /// The remote identity.
        remote: Identity,
        /// The state entered.
        state: SessionState,
    },
    /// Application bytes arrived over the direct transport.
    Message {
        /// The remote identity.
        remote: Identity,
        /// The raw payload.
        data: Vec<u8>,
    },
    /// The remote started an audio/video call.
    IncomingCall {
        /// The remote identity.
        remote: Identity,
        /// Whether the call includes video.
        has_video: bool,
    },
    /// Local media acquisition failed during a call attempt.
    MediaFailure {
        /// The remote identity.
        remote: Identity,
        /// Description of the failure.
        error: String,
    },
}

/// One client-side session: the negotiation toward a single remote identity.
///
/// All machine stepping is serialized behind one async lock, so an in-flight
/// negotiation step finishing after [`close`](Self::close) finds the machine
/// already closed and its result is discarded rather than applied.
pub struct PeerSession {
    local: Identity,
    remote: Identity,
    machine: tokio::sync::Mutex<SessionMachine>,
    connector: Mutex<Arc<dyn PeerConnector>>,
    factory: Arc<dyn ConnectorFactory>,
    outbound: mpsc::UnboundedSender<SignalMessage>,
    notices: mpsc::UnboundedSender<SessionNotice>,
    state_cache: Mutex<SessionState>,
    connecting_since: Mutex<Option<Instant>>,
    last_media_error: Mutex<Option<String>>,
}

impl PeerSession {
    /// Create a session and start pumping its connector events.
    pub fn spawn(
        local: Identity,
        remote: Identity,
        factory: Arc<dyn ConnectorFactory>,
        outbound: mpsc::UnboundedSender<SignalMessage>,
        notices: mpsc::UnboundedSender<SessionNotice>,
    ) -> Arc<Self> {
        let connector = factory.create();
        let session = Arc::new(Self {
            machine: tokio::sync::Mutex::new(SessionMachine::new(local.clone(), remote.clone())),
            local,
            remote,
            connector: Mutex::new(connector),
            factory,
            outbound,
            notices,
            state_cache: Mutex::new(SessionState::New),
            connecting_since: Mutex::new(None),
            last_media_error: Mutex::new(None),
        });
        session.spawn_event_pump();
        session
    }

    /// The remote identity this session negotiates with.
    pub fn remote(&self) -> &Identity {
        &self.remote
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        *self.state_cache.lock().unwrap()
    }

    /// How long the session has been `Connecting`, if it is.
    ///
    /// Timeouts are the caller's policy; the session only makes the duration
    /// observable.
    pub fn connecting_for(&self) -> Option<Duration> {
        self.connecting_since.lock().unwrap().map(|t| t.elapsed())
    }

    /// Start negotiating a direct transport to the remote.
    ///
    /// Idempotent: a session already connecting or connected is left alone.
    pub async fn initiate(&self) {
        self.dispatch(SessionEvent::Initiate).await;
    }

    /// Feed an inbound signaling message from this session's remote.
    pub async fn handle_signal(&self, message: SignalMessage) {
        if message.sender() != &self.remote {
            tracing::warn!(
                expected = %self.remote,
                actual = %message.sender(),
                "dropping signaling message from unexpected sender"
            );
            return;
        }
        let event = match message {
            SignalMessage::Offer { payload, .. } => SessionEvent::OfferReceived { payload },
            SignalMessage::Answer { payload, .. } => SessionEvent::AnswerReceived { payload },
            SignalMessage::Candidate { payload, .. } => {
                SessionEvent::CandidateReceived { payload }
            }
            SignalMessage::CallOffer {
                payload, has_video, ..
            } => {
                let _ = self.notices.send(SessionNotice::IncomingCall {
                    remote: self.remote.clone(),
                    has_video,
                });
                SessionEvent::OfferReceived { payload }
            }
        };
        self.dispatch(event).await;
    }

    /// Send application bytes over the direct transport.
    ///
    /// Returns `true` only if the session is `Connected` and the send
    /// succeeded; `false` signals the caller to use relay fallback.
    /// Openness is derived from the session state, not by probing the
    /// engine, and nothing is queued or buffered here.
    pub async fn send(&self, data: &[u8]) -> bool {
        if self.state() != SessionState::Connected {
            return false;
        }
        let connector = self.connector.lock().unwrap().clone();
        connector.send(data).await.is_ok()
    }

    /// Start an audio/video call, acquiring local media and renegotiating.
    ///
    /// Media failure aborts the call attempt, closes a session that existed
    /// only for this call, and is returned to the caller.
    pub async fn start_call(&self, video: bool) -> Result<(), ConnectorError> {
        self.last_media_error.lock().unwrap().take();
        self.dispatch(SessionEvent::CallRequested { video }).await;

        if let Some(error) = self.last_media_error.lock().unwrap().take() {
            if self.state() != SessionState::Connected {
                self.close().await;
            }
            return Err(ConnectorError::Media(error));
        }
        Ok(())
    }

    /// Tear the session down. Idempotent; never fails.
    pub async fn close(&self) {
        self.dispatch(SessionEvent::Close).await;
    }

    /// Close and return to a fresh `New` machine with a fresh connector.
    ///
    /// The only sanctioned way to retry a failed or closed session.
    pub async fn reset(self: &Arc<Self>) {
        self.dispatch(SessionEvent::Close).await;

        let fresh = self.factory.create();
        *self.connector.lock().unwrap() = fresh;
        {
            let mut machine = self.machine.lock().await;
            *machine = SessionMachine::new(self.local.clone(), self.remote.clone());
        }
        *self.state_cache.lock().unwrap() = SessionState::New;
        *self.connecting_since.lock().unwrap() = None;
        self.spawn_event_pump();
    }

    /// Feed an engine event (used by the pump; public for tests).
    pub async fn handle_connector_event(&self, event: ConnectorEvent) {
        match event {
            ConnectorEvent::TransportOpened => self.dispatch(SessionEvent::TransportOpened).await,
            ConnectorEvent::TransportFailed { error } => {
                self.dispatch(SessionEvent::TransportFailed { error }).await
            }
            ConnectorEvent::MessageReceived { data } => {
                if self.state() == SessionState::Closed {
                    return;
                }
                let _ = self.notices.send(SessionNotice::Message {
                    remote: self.remote.clone(),
                    data,
                });
            }
            ConnectorEvent::LocalCandidate { payload } => {
                if self.state() == SessionState::Closed {
                    return;
                }
                let _ = self.outbound.send(SignalMessage::Candidate {
                    sender: self.local.clone(),
                    target: self.remote.clone(),
                    payload,
                });
            }
        }
    }

    fn spawn_event_pump(self: &Arc<Self>) {
        let connector = self.connector.lock().unwrap().clone();
        let Some(mut events) = connector.take_events() else {
            return;
        };
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                session.handle_connector_event(event).await;
            }
        });
    }

    /// Step the machine and execute the resulting actions.
    ///
    /// Completion events produced by actions re-enter the loop, so one
    /// dispatch drives a negotiation step to quiescence while holding the
    /// machine lock; concurrent dispatches serialize behind it.
    async fn dispatch(&self, event: SessionEvent) {
        let mut machine = self.machine.lock().await;
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let (next, actions) = machine.clone().on_event(event);
            *machine = next;
            *self.state_cache.lock().unwrap() = machine.state();

            for action in actions {
                if let Some(follow_up) = self.perform(action).await {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    /// Execute one action; may produce a follow-up event for the machine.
    async fn perform(&self, action: SessionAction) -> Option<SessionEvent> {
        let connector = self.connector.lock().unwrap().clone();
        match action {
            SessionAction::CreateOffer => match connector.create_offer().await {
                Ok(payload) => Some(SessionEvent::LocalOfferReady { payload }),
                Err(e) => Some(SessionEvent::NegotiationFailed {
                    error: e.to_string(),
                }),
            },

            SessionAction::AcceptOffer { payload } => {
                if let Err(e) = connector.apply_remote_offer(payload).await {
                    return Some(SessionEvent::NegotiationFailed {
                        error: e.to_string(),
                    });
                }
                match connector.create_answer().await {
                    Ok(payload) => Some(SessionEvent::LocalAnswerReady { payload }),
                    Err(e) => Some(SessionEvent::NegotiationFailed {
                        error: e.to_string(),
                    }),
                }
            }

            SessionAction::ApplyAnswer { payload } => {
                match connector.apply_remote_answer(payload).await {
                    Ok(()) => None,
                    Err(e) => Some(SessionEvent::NegotiationFailed {
                        error: e.to_string(),
                    }),
                }
            }

            SessionAction::ApplyCandidates { payloads } => {
                for candidate in payloads {
                    if let Err(e) = connector.add_candidate(candidate).await {
                        tracing::warn!(remote = %self.remote, error = %e, "candidate apply failed");
                    }
                }
                None
            }

            SessionAction::AbandonLocalOffer => {
                if let Err(e) = connector.rollback_local().await {
                    tracing::warn!(remote = %self.remote, error = %e, "offer rollback failed");
                }
                None
            }

            SessionAction::AcquireMedia { video } => match connector.add_media(video).await {
                Ok(()) => Some(SessionEvent::MediaReady),
                Err(e) => Some(SessionEvent::MediaFailed {
                    error: e.to_string(),
                }),
            },

            SessionAction::SendOffer { payload } => {
                let _ = self.outbound.send(SignalMessage::Offer {
                    sender: self.local.clone(),
                    target: self.remote.clone(),
                    payload,
                });
                None
            }

            SessionAction::SendAnswer { payload } => {
                let _ = self.outbound.send(SignalMessage::Answer {
                    sender: self.local.clone(),
                    target: self.remote.clone(),
                    payload,
                });
                None
            }

            SessionAction::SendCallOffer { payload, video } => {
                let _ = self.outbound.send(SignalMessage::CallOffer {
                    sender: self.local.clone(),
                    target: self.remote.clone(),
                    payload,
                    has_video: video,
                });
                None
            }

            SessionAction::NotifyState { state } => {
                {
                    let mut since = self.connecting_since.lock().unwrap();
                    match state {
                        SessionState::Connecting => {
                            since.get_or_insert_with(Instant::now);
                        }
                        _ => *since = None,
                    }
                }
                let _ = self.notices.send(SessionNotice::ConnectionState {
                    remote: self.remote.clone(),
                    state,
                });
                None
            }

            SessionAction::DiscardSignal { kind, reason } => {
                tracing::warn!(remote = %self.remote, kind, %reason, "discarding signaling message");
                None
            }

            SessionAction::ReportMediaFailure { error } => {
                tracing::warn!(remote = %self.remote, %error, "media acquisition failed");
                *self.last_media_error.lock().unwrap() = Some(error.clone());
                let _ = self.notices.send(SessionNotice::MediaFailure {
                    remote: self.remote.clone(),
                    error,
                });
                None
            }

            SessionAction::Release => {
                connector.close().await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{MockConnector, MockConnectorFactory};
    use signal_types::{CandidatePayload, SdpPayload};

    struct Harness {
        session: Arc<PeerSession>,
        factory: Arc<MockConnectorFactory>,
        outbound: mpsc::UnboundedReceiver<SignalMessage>,
        notices: mpsc::UnboundedReceiver<SessionNotice>,
    }

    fn harness(local: &str, remote: &str) -> Harness {
        let factory = MockConnectorFactory::new();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let session = PeerSession::spawn(
            Identity::new(local).unwrap(),
            Identity::new(remote).unwrap(),
            factory.clone(),
            out_tx,
            notice_tx,
        );
        Harness {
            session,
            factory,
            outbound: out_rx,
            notices: notice_rx,
        }
    }

    fn connector(h: &Harness) -> Arc<MockConnector> {
        h.factory.last().unwrap()
    }

    fn sdp(kind: &str) -> SdpPayload {
        SdpPayload {
            sdp_type: kind.into(),
            sdp: format!("v=0\r\n{kind}"),
        }
    }

    fn candidate(n: u32) -> CandidatePayload {
        CandidatePayload {
            candidate: format!("candidate:{n} 1 UDP 1 10.0.0.{n} 9 typ host"),
            sdp_mid: Some("0".into()),
            sdp_m_line_index: Some(0),
        }
    }

    fn offer_from(sender: &str, target: &str) -> SignalMessage {
        SignalMessage::Offer {
            sender: Identity::new(sender).unwrap(),
            target: Identity::new(target).unwrap(),
            payload: sdp("offer"),
        }
    }

    // ===========================================
    // Negotiation flows
    // ===========================================

    #[tokio::test]
    async fn initiate_emits_offer_message() {
        let mut h = harness("alice", "bob");
        h.session.initiate().await;

        assert_eq!(h.session.state(), SessionState::Connecting);
        let msg = h.outbound.recv().await.unwrap();
        assert_eq!(msg.kind(), "offer");
        assert_eq!(msg.sender().as_str(), "alice");
        assert_eq!(msg.target().as_str(), "bob");
    }

    #[tokio::test]
    async fn offer_received_emits_answer() {
        let mut h = harness("bob", "alice");
        h.session.handle_signal(offer_from("alice", "bob")).await;

        let msg = h.outbound.recv().await.unwrap();
        assert_eq!(msg.kind(), "answer");
        assert_eq!(connector(&h).applied_offers().len(), 1);
    }

    #[tokio::test]
    async fn candidates_queue_and_drain_in_order() {
        let h = harness("bob", "alice");
        for n in 1..=3 {
            h.session
                .handle_signal(SignalMessage::Candidate {
                    sender: Identity::new("alice").unwrap(),
                    target: Identity::new("bob").unwrap(),
                    payload: candidate(n),
                })
                .await;
        }
        assert!(
            connector(&h).applied_candidates().is_empty(),
            "nothing applied before the remote description"
        );

        h.session.handle_signal(offer_from("alice", "bob")).await;

        let applied = connector(&h).applied_candidates();
        assert_eq!(applied.len(), 3);
        assert!(applied[0].candidate.contains("10.0.0.1"));
        assert!(applied[1].candidate.contains("10.0.0.2"));
        assert!(applied[2].candidate.contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn unexpected_sender_dropped() {
        let mut h = harness("bob", "alice");
        h.session.handle_signal(offer_from("mallory", "bob")).await;

        assert_eq!(h.session.state(), SessionState::New);
        assert!(h.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn transport_open_reports_connected() {
        let mut h = harness("alice", "bob");
        h.session.initiate().await;
        h.session
            .handle_connector_event(ConnectorEvent::TransportOpened)
            .await;

        assert_eq!(h.session.state(), SessionState::Connected);
        let saw_connected = std::iter::from_fn(|| h.notices.try_recv().ok()).any(|n| {
            matches!(
                n,
                SessionNotice::ConnectionState {
                    state: SessionState::Connected,
                    ..
                }
            )
        });
        assert!(saw_connected);
    }

    #[tokio::test]
    async fn negotiation_error_fails_session() {
        let h = harness("alice", "bob");
        connector(&h).fail_next_offer("engine exploded");
        h.session.initiate().await;

        assert_eq!(h.session.state(), SessionState::Failed);
    }

    // ===========================================
    // Send + fallback signal
    // ===========================================

    #[tokio::test]
    async fn send_returns_false_until_transport_open() {
        let h = harness("alice", "bob");
        h.session.initiate().await;
        assert!(!h.session.send(b"hello").await);

        // An open data channel alone is not enough: the session must have
        // observed the transport opening.
        connector(&h).set_open(true);
        assert!(!h.session.send(b"hello").await);

        h.session
            .handle_connector_event(ConnectorEvent::TransportOpened)
            .await;
        assert!(h.session.send(b"hello").await);
        assert_eq!(connector(&h).sent(), vec![b"hello".to_vec()]);
    }

    // ===========================================
    // Close / reset
    // ===========================================

    #[tokio::test]
    async fn close_is_idempotent_and_releases() {
        let h = harness("alice", "bob");
        h.session.initiate().await;
        h.session.close().await;
        h.session.close().await;

        assert_eq!(h.session.state(), SessionState::Closed);
        assert!(connector(&h).is_closed());
    }

    #[tokio::test]
    async fn late_transport_open_after_close_is_discarded() {
        let h = harness("alice", "bob");
        h.session.initiate().await;
        h.session.close().await;
        h.session
            .handle_connector_event(ConnectorEvent::TransportOpened)
            .await;

        assert_eq!(h.session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn reset_builds_fresh_connector_and_machine() {
        let mut h = harness("alice", "bob");
        h.session.initiate().await;
        h.session.reset().await;

        assert_eq!(h.session.state(), SessionState::New);
        assert_eq!(h.factory.created().len(), 2, "reset creates a connector");

        // The fresh session can negotiate again
        h.session.initiate().await;
        assert_eq!(h.session.state(), SessionState::Connecting);
        // Drain the first offer, expect a second one
        let first = h.outbound.recv().await.unwrap();
        assert_eq!(first.kind(), "offer");
        let second = h.outbound.recv().await.unwrap();
        assert_eq!(second.kind(), "offer");
    }

    #[tokio::test]
    async fn connecting_duration_is_observable() {
        let h = harness("alice", "bob");
        assert!(h.session.connecting_for().is_none());
        h.session.initiate().await;
        assert!(h.session.connecting_for().is_some());
        h.session.close().await;
        assert!(h.session.connecting_for().is_none());
    }

    // ===========================================
    // Calls
    // ===========================================

    #[tokio::test]
    async fn start_call_acquires_media_and_emits_call_offer() {
        let mut h = harness("alice", "bob");
        h.session.initiate().await;
        let _ = h.outbound.recv().await; // initial offer
        h.session
            .handle_signal(SignalMessage::Answer {
                sender: Identity::new("bob").unwrap(),
                target: Identity::new("alice").unwrap(),
                payload: sdp("answer"),
            })
            .await;
        h.session
            .handle_connector_event(ConnectorEvent::TransportOpened)
            .await;

        h.session.start_call(true).await.unwrap();

        assert_eq!(connector(&h).media_requests(), vec![true]);
        let msg = h.outbound.recv().await.unwrap();
        assert_eq!(msg.kind(), "call-offer");
        assert_eq!(h.session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn media_failure_aborts_call_and_closes_fresh_session() {
        let h = harness("alice", "bob");
        connector(&h).fail_media("camera denied");

        let result = h.session.start_call(true).await;
        assert!(matches!(result, Err(ConnectorError::Media(_))));
        // Session existed only for this call: closed
        assert_eq!(h.session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn media_failure_keeps_connected_session_alive() {
        let h = harness("bob", "alice");
        h.session.handle_signal(offer_from("alice", "bob")).await;
        h.session
            .handle_connector_event(ConnectorEvent::TransportOpened)
            .await;
        connector(&h).fail_media("camera denied");

        let result = h.session.start_call(false).await;
        assert!(result.is_err());
        assert_eq!(h.session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn incoming_call_offer_surfaces_notice() {
        let mut h = harness("bob", "alice");
        h.session
            .handle_signal(SignalMessage::CallOffer {
                sender: Identity::new("alice").unwrap(),
                target: Identity::new("bob").unwrap(),
                payload: sdp("offer"),
                has_video: true,
            })
            .await;

        let saw_call = std::iter::from_fn(|| h.notices.try_recv().ok()).any(|n| {
            matches!(
                n,
                SessionNotice::IncomingCall {
                    has_video: true,
                    ..
                }
            )
        });
        assert!(saw_call);
        // And it was answered like any offer
        let msg = h.outbound.recv().await.unwrap();
        assert_eq!(msg.kind(), "answer");
    }

    // ===========================================
    // Trickled local candidates
    // ===========================================

    #[tokio::test]
    async fn local_candidates_forwarded_to_signaling() {
        let mut h = harness("alice", "bob");
        h.session.initiate().await;
        let _ = h.outbound.recv().await; // offer

        h.session
            .handle_connector_event(ConnectorEvent::LocalCandidate {
                payload: candidate(9),
            })
            .await;

        let msg = h.outbound.recv().await.unwrap();
        assert_eq!(msg.kind(), "candidate");
        assert_eq!(msg.target().as_str(), "bob");
    }
}
