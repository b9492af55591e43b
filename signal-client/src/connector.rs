//! Peer connector abstraction.
//!
//! [`PeerConnector`] is the seam to the underlying WebRTC engine: creating
//! and applying session descriptions, trickling candidates, acquiring media,
//! and carrying application bytes once the data channel opens. The
//! production engine (a browser `RTCPeerConnection` or a native stack) plugs
//! in behind this trait; [`MockConnector`] ships for testing.

use async_trait::async_trait;
use signal_types::{CandidatePayload, SdpPayload};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from the negotiation engine.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Creating or applying a session description failed.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// Local media could not be acquired (camera/mic denied or missing).
    #[error("media acquisition failed: {0}")]
    Media(String),

    /// The data channel is not open.
    #[error("transport not open")]
    NotOpen,

    /// Send over the data channel failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Events surfaced by the engine while a session is alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    /// The data transport opened.
    TransportOpened,
    /// The transport failed or disconnected.
    TransportFailed {
        /// Description of the failure.
        error: String,
    },
    /// Application bytes arrived over the data channel.
    MessageReceived {
        /// The raw payload.
        data: Vec<u8>,
    },
    /// The engine trickled a local ICE candidate to signal to the remote.
    LocalCandidate {
        /// The candidate.
        payload: CandidatePayload,
    },
}

/// Seam to the underlying WebRTC negotiation engine.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create a local offer and set it as the local description.
    async fn create_offer(&self) -> Result<SdpPayload, ConnectorError>;

    /// Apply a remote offer as the remote description.
    async fn apply_remote_offer(&self, offer: SdpPayload) -> Result<(), ConnectorError>;

    /// Create a local answer and set it as the local description.
    ///
    /// Valid only after a remote offer was applied.
    async fn create_answer(&self) -> Result<SdpPayload, ConnectorError>;

    /// Apply a remote answer as the remote description.
    async fn apply_remote_answer(&self, answer: SdpPayload) -> Result<(), ConnectorError>;

    /// Apply a remote ICE candidate.
    ///
    /// Callers guarantee the remote description was applied first.
    async fn add_candidate(&self, candidate: CandidatePayload) -> Result<(), ConnectorError>;

    /// Roll back an un-answered local offer (glare, polite side).
    async fn rollback_local(&self) -> Result<(), ConnectorError>;

    /// Acquire local media (mic, optionally camera) and attach tracks.
    async fn add_media(&self, video: bool) -> Result<(), ConnectorError>;

    /// Whether the data channel is open for sending.
    fn is_open(&self) -> bool;

    /// Send application bytes over the open data channel.
    async fn send(&self, data: &[u8]) -> Result<(), ConnectorError>;

    /// Release the connection, channels, and any media.
    async fn close(&self);

    /// Take the engine event stream.
    ///
    /// At most one receiver exists; a second take returns `None`.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ConnectorEvent>>;
}

/// Factory producing one connector per peer session.
///
/// A session is reset by constructing a fresh connector, so the factory is
/// consulted again on every [`reset`](crate::PeerSession::reset).
pub trait ConnectorFactory: Send + Sync {
    /// Build a fresh, unconnected connector.
    fn create(&self) -> Arc<dyn PeerConnector>;
}

// ============================================================================
// Mock connector
// ============================================================================

#[derive(Debug, Default)]
struct MockRecord {
    applied_offers: Vec<SdpPayload>,
    applied_answers: Vec<SdpPayload>,
    applied_candidates: Vec<CandidatePayload>,
    rollbacks: u32,
    media_requests: Vec<bool>,
    sent: Vec<Vec<u8>>,
    fail_next_offer: Option<String>,
    fail_media: Option<String>,
}

/// Mock negotiation engine for testing.
///
/// Records every applied description and candidate (in order), supports
/// forced failures, and lets tests inject engine events. Two mocks can be
/// linked so `send` on one side surfaces as `MessageReceived` on the other.
pub struct MockConnector {
    record: Mutex<MockRecord>,
    open: AtomicBool,
    closed: AtomicBool,
    offer_seq: AtomicU32,
    events_tx: mpsc::UnboundedSender<ConnectorEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ConnectorEvent>>>,
    /// Event sender of the linked peer, when paired.
    peer_tx: Mutex<Option<mpsc::UnboundedSender<ConnectorEvent>>>,
}

impl MockConnector {
    /// Create an unlinked mock connector.
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            record: Mutex::new(MockRecord::default()),
            open: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            offer_seq: AtomicU32::new(0),
            events_tx: tx,
            events_rx: Mutex::new(Some(rx)),
            peer_tx: Mutex::new(None),
        })
    }

    /// Create two mocks whose data channels are linked back to back.
    pub fn linked_pair() -> (Arc<Self>, Arc<Self>) {
        let a = Self::new();
        let b = Self::new();
        *a.peer_tx.lock().unwrap() = Some(b.events_tx.clone());
        *b.peer_tx.lock().unwrap() = Some(a.events_tx.clone());
        (a, b)
    }

    /// Inject an engine event (transport open/failed, inbound data, candidate).
    pub fn emit(&self, event: ConnectorEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Mark the data channel open/closed for `is_open`/`send`.
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Cause the next `create_offer` to fail.
    pub fn fail_next_offer(&self, error: &str) {
        self.record.lock().unwrap().fail_next_offer = Some(error.to_string());
    }

    /// Cause every `add_media` to fail (camera/mic denied).
    pub fn fail_media(&self, error: &str) {
        self.record.lock().unwrap().fail_media = Some(error.to_string());
    }

    /// Remote offers applied, in order.
    pub fn applied_offers(&self) -> Vec<SdpPayload> {
        self.record.lock().unwrap().applied_offers.clone()
    }

    /// Remote answers applied, in order.
    pub fn applied_answers(&self) -> Vec<SdpPayload> {
        self.record.lock().unwrap().applied_answers.clone()
    }

    /// Remote candidates applied, in order.
    pub fn applied_candidates(&self) -> Vec<CandidatePayload> {
        self.record.lock().unwrap().applied_candidates.clone()
    }

    /// Number of local-offer rollbacks.
    pub fn rollbacks(&self) -> u32 {
        self.record.lock().unwrap().rollbacks
    }

    /// Media acquisitions requested, in order (video flag).
    pub fn media_requests(&self) -> Vec<bool> {
        self.record.lock().unwrap().media_requests.clone()
    }

    /// Application payloads sent over the data channel.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.record.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl PeerConnector for MockConnector {
    async fn create_offer(&self) -> Result<SdpPayload, ConnectorError> {
        if let Some(error) = self.record.lock().unwrap().fail_next_offer.take() {
            return Err(ConnectorError::Negotiation(error));
        }
        let seq = self.offer_seq.fetch_add(1, Ordering::SeqCst);
        Ok(SdpPayload {
            sdp_type: "offer".into(),
            sdp: format!("v=0\r\nmock offer {seq}"),
        })
    }

    async fn apply_remote_offer(&self, offer: SdpPayload) -> Result<(), ConnectorError> {
        self.record.lock().unwrap().applied_offers.push(offer);
        Ok(())
    }

    async fn create_answer(&self) -> Result<SdpPayload, ConnectorError> {
        Ok(SdpPayload {
            sdp_type: "answer".into(),
            sdp: "v=0\r\nmock answer".into(),
        })
    }

    async fn apply_remote_answer(&self, answer: SdpPayload) -> Result<(), ConnectorError> {
        self.record.lock().unwrap().applied_answers.push(answer);
        Ok(())
    }

    async fn add_candidate(&self, candidate: CandidatePayload) -> Result<(), ConnectorError> {
        self.record.lock().unwrap().applied_candidates.push(candidate);
        Ok(())
    }

    async fn rollback_local(&self) -> Result<(), ConnectorError> {
        self.record.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    async fn add_media(&self, video: bool) -> Result<(), ConnectorError> {
        let mut record = self.record.lock().unwrap();
        if let Some(error) = record.fail_media.clone() {
            return Err(ConnectorError::Media(error));
        }
        record.media_requests.push(video);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    async fn send(&self, data: &[u8]) -> Result<(), ConnectorError> {
        if !self.is_open() {
            return Err(ConnectorError::NotOpen);
        }
        self.record.lock().unwrap().sent.push(data.to_vec());
        if let Some(peer) = self.peer_tx.lock().unwrap().as_ref() {
            let _ = peer.send(ConnectorEvent::MessageReceived {
                data: data.to_vec(),
            });
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ConnectorEvent>> {
        self.events_rx.lock().unwrap().take()
    }
}

/// Factory that hands out [`MockConnector`]s and remembers them for
/// inspection.
#[derive(Default)]
pub struct MockConnectorFactory {
    created: Mutex<Vec<Arc<MockConnector>>>,
}

impl MockConnectorFactory {
    /// Create an empty factory.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All connectors created so far, in creation order.
    pub fn created(&self) -> Vec<Arc<MockConnector>> {
        self.created.lock().unwrap().clone()
    }

    /// The most recently created connector.
    pub fn last(&self) -> Option<Arc<MockConnector>> {
        self.created.lock().unwrap().last().cloned()
    }
}

impl ConnectorFactory for MockConnectorFactory {
    fn create(&self) -> Arc<dyn PeerConnector> {
        let connector = MockConnector::new();
        self.created.lock().unwrap().push(connector.clone());
        connector
    }
}
