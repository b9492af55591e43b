//! Per-peer session state machine.
//!
//! This module provides a pure, side-effect-free state machine for
//! negotiating one direct transport to a remote identity. The machine takes
//! events as input and produces a new state plus a list of actions to
//! execute.
//!
//! The actual I/O (driving the WebRTC engine, emitting signaling messages)
//! is performed by signal-client, not by this module. This enables instant
//! unit testing of the negotiation rules, including the glare and candidate
//! ordering properties.

use signal_types::{CandidatePayload, Identity, SdpPayload};

/// Connection lifecycle states for a peer session.
///
/// `Closed` is terminal: a fresh machine must be constructed to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Freshly created, no negotiation yet.
    New,
    /// Negotiation in flight.
    Connecting,
    /// The direct transport is open.
    Connected,
    /// Negotiation or transport failure; recoverable only via reset.
    Failed,
    /// Torn down. Terminal.
    Closed,
}

/// Which side of the negotiation this session took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// We sent the winning offer.
    Initiator,
    /// We answered the remote offer.
    Responder,
}

/// The underlying negotiation sub-state.
///
/// Mirrors what the engine's signaling state would report, so offer/answer
/// compatibility is decided here instead of by probing the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Negotiation {
    /// No exchange outstanding; a remote offer is acceptable.
    Stable,
    /// A local offer was requested and is being created.
    CreatingOffer,
    /// Our offer is out; waiting for the remote answer.
    HaveLocalOffer,
    /// A remote offer was applied; our answer is being created.
    CreatingAnswer,
}

/// Events that can occur in the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Caller requested a connection to the remote identity.
    Initiate,
    /// A `kind=offer` (or `call-offer`) message arrived from the remote.
    OfferReceived {
        /// The remote offer description.
        payload: SdpPayload,
    },
    /// A `kind=answer` message arrived from the remote.
    AnswerReceived {
        /// The remote answer description.
        payload: SdpPayload,
    },
    /// A `kind=candidate` message arrived from the remote.
    CandidateReceived {
        /// The remote candidate.
        payload: CandidatePayload,
    },
    /// The engine finished creating our local offer.
    LocalOfferReady {
        /// The local offer description.
        payload: SdpPayload,
    },
    /// The engine finished creating our local answer.
    LocalAnswerReady {
        /// The local answer description.
        payload: SdpPayload,
    },
    /// Caller requested an audio/video call.
    CallRequested {
        /// Whether to capture video in addition to audio.
        video: bool,
    },
    /// Local media was acquired and attached.
    MediaReady,
    /// Local media acquisition failed (camera/mic denied or unavailable).
    MediaFailed {
        /// Description of the failure.
        error: String,
    },
    /// The direct transport reported open.
    TransportOpened,
    /// The transport failed or disconnected.
    TransportFailed {
        /// Description of the failure.
        error: String,
    },
    /// A negotiation step (create/apply description) failed.
    NegotiationFailed {
        /// Description of the failure.
        error: String,
    },
    /// Caller requested teardown.
    Close,
}

/// Actions to be executed by signal-client.
///
/// These are instructions, not side effects. The interpreter performs the
/// engine calls and message sends, then feeds completion events back in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Ask the engine for a local offer; feed back `LocalOfferReady`.
    CreateOffer,
    /// Apply the remote offer and ask the engine for an answer; feed back
    /// `LocalAnswerReady`.
    AcceptOffer {
        /// The remote offer to apply.
        payload: SdpPayload,
    },
    /// Apply the remote answer.
    ApplyAnswer {
        /// The remote answer to apply.
        payload: SdpPayload,
    },
    /// Apply candidates, in exactly this order.
    ApplyCandidates {
        /// Candidates in original arrival order.
        payloads: Vec<CandidatePayload>,
    },
    /// Roll back our outstanding local offer (glare, polite side).
    AbandonLocalOffer,
    /// Acquire local media and attach tracks; feed back `MediaReady` or
    /// `MediaFailed`.
    AcquireMedia {
        /// Whether to capture video in addition to audio.
        video: bool,
    },
    /// Emit a `kind=offer` message to the remote.
    SendOffer {
        /// The local offer description.
        payload: SdpPayload,
    },
    /// Emit a `kind=answer` message to the remote.
    SendAnswer {
        /// The local answer description.
        payload: SdpPayload,
    },
    /// Emit a `kind=call-offer` message to the remote.
    SendCallOffer {
        /// The local renegotiation offer.
        payload: SdpPayload,
        /// Whether the call includes video.
        video: bool,
    },
    /// Report a connection state change to the application.
    NotifyState {
        /// The state entered.
        state: SessionState,
    },
    /// An incompatible message was discarded (protocol violation, logged
    /// with a warning; the session state is unchanged).
    DiscardSignal {
        /// The discarded message kind.
        kind: &'static str,
        /// Why it was discarded.
        reason: String,
    },
    /// Surface a media acquisition failure to the caller.
    ReportMediaFailure {
        /// Description of the failure.
        error: String,
    },
    /// Release the engine, transport, and media resources.
    Release,
}

/// Session negotiation state machine - NO I/O, just state transitions.
///
/// ## Glare
///
/// When both sides offer simultaneously, the tie-break is deterministic and
/// lexicographic: the peer with the *lower* identity is "polite" — it
/// abandons its own outstanding offer and answers the remote one. The higher
/// identity discards the incoming offer with a warning and keeps waiting for
/// its answer. Exactly one offer wins and neither side errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMachine {
    local: Identity,
    remote: Identity,
    role: Option<SessionRole>,
    state: SessionState,
    negotiation: Negotiation,
    /// Whether a remote description (offer or answer) has been applied.
    remote_applied: bool,
    /// Candidates that arrived before the remote description.
    pending_candidates: Vec<CandidatePayload>,
    /// Video flag of an in-flight call request, if any.
    pending_call: Option<bool>,
}

impl SessionMachine {
    /// Create a machine in the `New` state for one remote identity.
    pub fn new(local: Identity, remote: Identity) -> Self {
        Self {
            local,
            remote,
            role: None,
            state: SessionState::New,
            negotiation: Negotiation::Stable,
            remote_applied: false,
            pending_candidates: Vec::new(),
            pending_call: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Negotiation role, once decided.
    pub fn role(&self) -> Option<SessionRole> {
        self.role
    }

    /// The remote identity this session negotiates with.
    pub fn remote(&self) -> &Identity {
        &self.remote
    }

    /// Number of candidates queued behind the remote description.
    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Whether the polite side of the glare tie-break is ours.
    ///
    /// The lower identity backs off and answers the remote offer.
    fn is_polite(&self) -> bool {
        self.local < self.remote
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (signal-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(mut self, event: SessionEvent) -> (Self, Vec<SessionAction>) {
        use SessionAction as A;
        use SessionEvent as E;
        use SessionState as S;

        match event {
            E::Initiate => match self.state {
                S::New => {
                    self.role = Some(SessionRole::Initiator);
                    self.state = S::Connecting;
                    self.negotiation = Negotiation::CreatingOffer;
                    (
                        self,
                        vec![
                            A::CreateOffer,
                            A::NotifyState {
                                state: S::Connecting,
                            },
                        ],
                    )
                }
                // Idempotent: an existing negotiation or connection wins.
                _ => (self, vec![]),
            },

            E::OfferReceived { payload } => match self.state {
                S::Closed | S::Failed => (
                    self,
                    vec![A::DiscardSignal {
                        kind: "offer",
                        reason: "session torn down".into(),
                    }],
                ),
                _ => match self.negotiation {
                    Negotiation::Stable => {
                        let mut actions = self.accept_offer(payload);
                        if self.state == S::New {
                            self.state = S::Connecting;
                            actions.push(A::NotifyState {
                                state: S::Connecting,
                            });
                        }
                        (self, actions)
                    }
                    Negotiation::CreatingOffer | Negotiation::HaveLocalOffer => {
                        if self.is_polite() {
                            // Glare, polite side: our offer dies, theirs wins.
                            let mut actions = vec![A::AbandonLocalOffer];
                            self.role = Some(SessionRole::Responder);
                            self.pending_call = None;
                            actions.extend(self.accept_offer(payload));
                            (self, actions)
                        } else {
                            (
                                self,
                                vec![A::DiscardSignal {
                                    kind: "offer",
                                    reason: "glare: local offer outstanding".into(),
                                }],
                            )
                        }
                    }
                    Negotiation::CreatingAnswer => (
                        self,
                        vec![A::DiscardSignal {
                            kind: "offer",
                            reason: "already answering a remote offer".into(),
                        }],
                    ),
                },
            },

            E::AnswerReceived { payload } => {
                let acceptable = self.role == Some(SessionRole::Initiator)
                    && self.negotiation == Negotiation::HaveLocalOffer
                    && matches!(self.state, S::Connecting | S::Connected);
                if acceptable {
                    self.negotiation = Negotiation::Stable;
                    self.remote_applied = true;
                    let mut actions = vec![A::ApplyAnswer { payload }];
                    self.drain_candidates(&mut actions);
                    (self, actions)
                } else {
                    (
                        self,
                        vec![A::DiscardSignal {
                            kind: "answer",
                            reason: "no local offer outstanding".into(),
                        }],
                    )
                }
            }

            E::CandidateReceived { payload } => match self.state {
                // Queue cleared on teardown; late candidates are dropped quietly.
                S::Closed | S::Failed => (self, vec![]),
                _ => {
                    if self.remote_applied {
                        (
                            self,
                            vec![A::ApplyCandidates {
                                payloads: vec![payload],
                            }],
                        )
                    } else {
                        self.pending_candidates.push(payload);
                        (self, vec![])
                    }
                }
            },

            E::LocalOfferReady { payload } => {
                // A completion landing after close/abandon must not mutate
                // or emit anything.
                if matches!(self.state, S::Closed | S::Failed)
                    || self.negotiation != Negotiation::CreatingOffer
                {
                    return (self, vec![]);
                }
                self.negotiation = Negotiation::HaveLocalOffer;
                let action = match self.pending_call {
                    Some(video) => A::SendCallOffer { payload, video },
                    None => A::SendOffer { payload },
                };
                self.pending_call = None;
                (self, vec![action])
            }

            E::LocalAnswerReady { payload } => {
                if matches!(self.state, S::Closed | S::Failed)
                    || self.negotiation != Negotiation::CreatingAnswer
                {
                    return (self, vec![]);
                }
                self.negotiation = Negotiation::Stable;
                (self, vec![A::SendAnswer { payload }])
            }

            E::CallRequested { video } => match self.state {
                S::New => {
                    // Fresh session created for the call: media first, then
                    // the initial offer carries the tracks.
                    self.role = Some(SessionRole::Initiator);
                    self.state = S::Connecting;
                    self.pending_call = Some(video);
                    (
                        self,
                        vec![
                            A::AcquireMedia { video },
                            A::NotifyState {
                                state: S::Connecting,
                            },
                        ],
                    )
                }
                S::Connecting | S::Connected if self.negotiation == Negotiation::Stable => {
                    self.pending_call = Some(video);
                    (self, vec![A::AcquireMedia { video }])
                }
                S::Connecting | S::Connected => (
                    self,
                    vec![A::DiscardSignal {
                        kind: "call-offer",
                        reason: "negotiation in progress".into(),
                    }],
                ),
                S::Failed | S::Closed => (
                    self,
                    vec![A::DiscardSignal {
                        kind: "call-offer",
                        reason: "session torn down".into(),
                    }],
                ),
            },

            E::MediaReady => {
                if matches!(self.state, S::Closed | S::Failed) || self.pending_call.is_none() {
                    return (self, vec![]);
                }
                self.negotiation = Negotiation::CreatingOffer;
                (self, vec![A::CreateOffer])
            }

            E::MediaFailed { error } => {
                self.pending_call = None;
                (self, vec![A::ReportMediaFailure { error }])
            }

            E::TransportOpened => match self.state {
                S::Closed => (self, vec![]),
                S::Connected => (self, vec![]),
                _ => {
                    self.state = S::Connected;
                    (
                        self,
                        vec![A::NotifyState {
                            state: S::Connected,
                        }],
                    )
                }
            },

            E::TransportFailed { .. } => match self.state {
                S::Connecting | S::Connected => {
                    self.state = S::Failed;
                    // The engine is dead; release it now so a replaced
                    // session never leaks a connection or media.
                    (
                        self,
                        vec![A::Release, A::NotifyState { state: S::Failed }],
                    )
                }
                _ => (self, vec![]),
            },

            E::NegotiationFailed { .. } => match self.state {
                S::Connecting => {
                    self.state = S::Failed;
                    (
                        self,
                        vec![A::Release, A::NotifyState { state: S::Failed }],
                    )
                }
                S::Connected => {
                    // A failed renegotiation aborts the call but keeps the
                    // established transport.
                    self.negotiation = Negotiation::Stable;
                    self.pending_call = None;
                    (self, vec![])
                }
                _ => (self, vec![]),
            },

            E::Close => match self.state {
                // Idempotent: closing twice is a no-op.
                S::Closed => (self, vec![]),
                _ => {
                    self.state = S::Closed;
                    self.pending_candidates.clear();
                    self.pending_call = None;
                    (
                        self,
                        vec![A::Release, A::NotifyState { state: S::Closed }],
                    )
                }
            },
        }
    }

    /// Accept a remote offer: apply it, drain queued candidates, answer.
    fn accept_offer(&mut self, payload: SdpPayload) -> Vec<SessionAction> {
        if self.role.is_none() {
            self.role = Some(SessionRole::Responder);
        }
        self.negotiation = Negotiation::CreatingAnswer;
        self.remote_applied = true;
        let mut actions = vec![SessionAction::AcceptOffer { payload }];
        self.drain_candidates(&mut actions);
        actions
    }

    /// Emit queued candidates in arrival order and clear the queue.
    fn drain_candidates(&mut self, actions: &mut Vec<SessionAction>) {
        if !self.pending_candidates.is_empty() {
            let payloads = std::mem::take(&mut self.pending_candidates);
            actions.push(SessionAction::ApplyCandidates { payloads });
        }
    }
}
