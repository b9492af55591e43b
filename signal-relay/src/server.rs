//! Main SignalRelay server coordination.
//!
//! SignalRelay owns the Directory and routes signaling and fallback traffic
//! between connected channels. Forwarding never inspects negotiation
//! payloads and never blocks on a recipient: frames are queued onto each
//! endpoint's writer channel.

use crate::config::Config;
use crate::directory::{Directory, EndpointHandle, EndpointId};
use crate::error::RelayError;
use crate::limits::RateLimits;
use crate::session::ChannelSession;
use futures_util::{SinkExt, StreamExt};
use signal_types::{ClientFrame, Identity, ServerFrame, SignalMessage};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Thread-safe via `AtomicU64` — no locks needed for incrementing.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total connections accepted (before registration).
    pub connections_total: AtomicU64,
    /// Total successful registrations.
    pub registrations_total: AtomicU64,
    /// Total registrations that displaced a stale endpoint.
    pub displacements_total: AtomicU64,
    /// Total signaling messages forwarded to a resolved endpoint.
    pub signals_forwarded: AtomicU64,
    /// Total fallback application messages forwarded.
    pub app_forwarded: AtomicU64,
    /// Total forwards dropped because the target was offline.
    pub target_offline_total: AtomicU64,
    /// Total presence broadcasts published.
    pub presence_broadcasts: AtomicU64,
    /// Total rate limit rejections.
    pub rate_limit_hits: AtomicU64,
    /// Total protocol errors (invalid frames, spoofed senders, etc.).
    pub errors_total: AtomicU64,
}

/// Outcome of a forward attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The frame was queued on the target's channel.
    Delivered,
    /// No directory entry for the target; the sender is told.
    TargetOffline,
}

/// Main relay server.
pub struct SignalRelay {
    config: Config,
    directory: Directory,
    /// Rate limiters for registrations and messages.
    rate_limits: RateLimits,
    /// Operational metrics (counters).
    metrics: RelayMetrics,
}

impl std::fmt::Debug for SignalRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalRelay")
            .field("config", &self.config)
            .field("online", &self.directory.len())
            .finish_non_exhaustive()
    }
}

impl SignalRelay {
    /// Create a new SignalRelay with the given config.
    pub fn new(config: Config) -> Self {
        let rate_limits = RateLimits::new(&config.limits);
        Self {
            config,
            directory: Directory::new(),
            rate_limits,
            metrics: RelayMetrics::default(),
        }
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get access to the directory.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Register an identity at an endpoint.
    ///
    /// A stale entry under a different endpoint is displaced first (logged,
    /// and the displaced channel is told so it stops reconnecting). The
    /// caller acks the new channel (`Welcome`) and then publishes presence,
    /// so the first frame a registering client sees is always its Welcome.
    pub fn register(&self, identity: Identity, endpoint: EndpointHandle) {
        if let Some(displaced) = self.directory.register(identity.clone(), endpoint) {
            tracing::info!(
                %identity,
                old_endpoint = %displaced.id(),
                "displacing stale registration"
            );
            self.metrics.displacements_total.fetch_add(1, Ordering::Relaxed);
            displaced.send(ServerFrame::Displaced);
        }
        self.metrics.registrations_total.fetch_add(1, Ordering::Relaxed);
        tracing::info!(%identity, online = self.directory.len(), "registered");
    }

    /// Remove an identity's entry if it still points at this endpoint, and
    /// publish presence when something actually changed.
    pub fn deregister(&self, identity: &Identity, endpoint_id: EndpointId) {
        if self.directory.deregister(identity, endpoint_id) {
            tracing::info!(%identity, online = self.directory.len(), "deregistered");
            self.broadcast_presence();
        }
    }

    /// Forward a signaling message to its target, unchanged.
    pub fn forward(&self, message: SignalMessage) -> ForwardOutcome {
        let target = message.target().clone();
        match self.directory.resolve(&target) {
            Some(endpoint) if endpoint.send(ServerFrame::Signal { message }) => {
                self.metrics.signals_forwarded.fetch_add(1, Ordering::Relaxed);
                ForwardOutcome::Delivered
            }
            _ => {
                tracing::debug!(%target, "signal dropped: target offline");
                self.metrics.target_offline_total.fetch_add(1, Ordering::Relaxed);
                ForwardOutcome::TargetOffline
            }
        }
    }

    /// Forward a fallback application message to its target.
    ///
    /// The payload is never inspected. The relay performs no queueing and no
    /// retries; an offline target is simply reported back to the sender.
    pub fn forward_app(
        &self,
        sender: &Identity,
        target: &Identity,
        payload: serde_json::Value,
    ) -> ForwardOutcome {
        match self.directory.resolve(target) {
            Some(endpoint)
                if endpoint.send(ServerFrame::Forwarded {
                    sender: sender.clone(),
                    payload,
                }) =>
            {
                self.metrics.app_forwarded.fetch_add(1, Ordering::Relaxed);
                ForwardOutcome::Delivered
            }
            _ => {
                tracing::debug!(%target, "forward dropped: target offline");
                self.metrics.target_offline_total.fetch_add(1, Ordering::Relaxed);
                ForwardOutcome::TargetOffline
            }
        }
    }

    /// All currently-online identities, sorted.
    pub fn online_identities(&self) -> Vec<Identity> {
        self.directory.online()
    }

    /// Publish the full online set to every connected channel.
    ///
    /// Best-effort and eventually consistent: a client that misses one
    /// update receives the corrected full set on its next registration or
    /// on the next membership change.
    pub fn broadcast_presence(&self) {
        let online = self.directory.online();
        let endpoints = self.directory.endpoints();
        let count = endpoints.len();
        for endpoint in endpoints {
            endpoint.send(ServerFrame::Presence {
                online: online.clone(),
            });
        }
        self.metrics.presence_broadcasts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(online = online.len(), channels = count, "presence broadcast");
    }

    /// Accept WebSocket Signaling Channels until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), RelayError> {
        tracing::info!(address = %listener.local_addr()?, "relay listening");
        loop {
            let (stream, addr) = listener.accept().await?;
            let relay = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = relay.handle_connection(stream, addr).await {
                    tracing::debug!(%addr, error = %e, "connection ended");
                }
            });
        }
    }

    /// Run one Signaling Channel to completion.
    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        addr: SocketAddr,
    ) -> Result<(), RelayError> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| RelayError::WebSocket(e.to_string()))?;
        self.metrics.connections_total.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%addr, "channel connected");

        let (mut write, mut read) = ws.split();
        let (endpoint, mut outbound) = EndpointHandle::new();

        // Writer task: drains the endpoint queue so no forward ever blocks
        // on this peer's socket.
        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                let text = match frame.to_bytes().map(String::from_utf8) {
                    Ok(Ok(text)) => text,
                    _ => continue,
                };
                if write.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        let mut session = ChannelSession::new(Arc::clone(&self), endpoint);
        let register_timeout = Duration::from_secs(self.config.limits.register_timeout_secs);
        let max_frame = self.config.limits.max_frame_bytes;

        loop {
            // Unregistered channels get a bounded window to say Register.
            let next = if session.is_registered() {
                read.next().await
            } else {
                match tokio::time::timeout(register_timeout, read.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(%addr, "register timeout, dropping channel");
                        break;
                    }
                }
            };

            let data = match next {
                Some(Ok(Message::Text(text))) => text.into_bytes(),
                Some(Ok(Message::Binary(data))) => data,
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(%addr, error = %e, "read error");
                    break;
                }
            };

            if data.len() > max_frame {
                tracing::warn!(%addr, size = data.len(), max = max_frame, "oversized frame");
                self.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let frame = match ClientFrame::from_bytes(&data) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(%addr, error = %e, "undecodable frame");
                    self.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            if let Err(e) = session.handle_frame(frame) {
                tracing::warn!(%addr, error = %e, "protocol error");
                self.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            }
            if session.is_closing() {
                break;
            }
        }

        session.finish();
        // Dropping the session drops the last frame sender, so the writer
        // drains what is queued and exits.
        drop(session);
        let _ = writer.await;
        tracing::debug!(%addr, "channel closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_types::SdpPayload;

    fn identity(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    fn offer(sender: &str, target: &str) -> SignalMessage {
        SignalMessage::Offer {
            sender: identity(sender),
            target: identity(target),
            payload: SdpPayload {
                sdp_type: "offer".into(),
                sdp: "v=0\r\n".into(),
            },
        }
    }

    fn relay() -> SignalRelay {
        SignalRelay::new(Config::default())
    }

    #[tokio::test]
    async fn forward_delivers_unchanged_to_target() {
        let relay = relay();
        let (endpoint, mut rx) = EndpointHandle::new();
        relay.register(identity("bob"), endpoint);

        let message = offer("alice", "bob");
        assert_eq!(relay.forward(message.clone()), ForwardOutcome::Delivered);

        let delivered = loop {
            match rx.recv().await.unwrap() {
                ServerFrame::Signal { message } => break message,
                _ => continue,
            }
        };
        assert_eq!(delivered, message);
    }

    #[tokio::test]
    async fn forward_to_unknown_target_reports_offline() {
        let relay = relay();
        assert_eq!(
            relay.forward(offer("alice", "ghost")),
            ForwardOutcome::TargetOffline
        );
        assert_eq!(
            relay.metrics().target_offline_total.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn displacement_notifies_old_endpoint() {
        let relay = relay();
        let (e1, mut rx1) = EndpointHandle::new();
        let (e2, _rx2) = EndpointHandle::new();

        relay.register(identity("alice"), e1);
        relay.register(identity("alice"), e2);

        let displaced = loop {
            match rx1.recv().await.unwrap() {
                ServerFrame::Displaced => break true,
                _ => continue,
            }
        };
        assert!(displaced);
        assert_eq!(relay.directory().len(), 1);
        assert_eq!(
            relay.metrics().displacements_total.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn presence_broadcast_carries_full_sorted_set() {
        let relay = relay();
        let (e1, mut rx1) = EndpointHandle::new();
        let (e2, _rx2) = EndpointHandle::new();

        relay.register(identity("carol"), e1);
        relay.register(identity("alice"), e2);
        relay.broadcast_presence();

        // Every endpoint receives the full sorted set, not a diff.
        let mut last_online = Vec::new();
        while let Ok(frame) = rx1.try_recv() {
            if let ServerFrame::Presence { online } = frame {
                last_online = online;
            }
        }
        let names: Vec<String> = last_online.iter().map(|i| i.to_string()).collect();
        assert_eq!(names, ["alice", "carol"]);
    }

    #[tokio::test]
    async fn deregister_then_forward_is_offline() {
        let relay = relay();
        let (endpoint, mut rx) = EndpointHandle::new();
        let endpoint_id = endpoint.id();
        relay.register(identity("bob"), endpoint);
        relay.deregister(&identity("bob"), endpoint_id);

        assert_eq!(
            relay.forward(offer("alice", "bob")),
            ForwardOutcome::TargetOffline
        );

        // Nothing but registration-time frames ever reached the endpoint.
        while let Ok(frame) = rx.try_recv() {
            assert!(
                !matches!(frame, ServerFrame::Signal { .. }),
                "no signal may be delivered after deregistration"
            );
        }
    }

    #[tokio::test]
    async fn forward_app_keeps_payload_opaque() {
        let relay = relay();
        let (endpoint, mut rx) = EndpointHandle::new();
        relay.register(identity("bob"), endpoint);

        let payload = serde_json::json!({"body": "hi", "nested": {"x": 1}});
        let outcome = relay.forward_app(&identity("alice"), &identity("bob"), payload.clone());
        assert_eq!(outcome, ForwardOutcome::Delivered);

        let delivered = loop {
            match rx.recv().await.unwrap() {
                ServerFrame::Forwarded { sender, payload } => break (sender, payload),
                _ => continue,
            }
        };
        assert_eq!(delivered.0, identity("alice"));
        assert_eq!(delivered.1, payload);
    }

    #[tokio::test]
    async fn dead_endpoint_counts_as_offline() {
        let relay = relay();
        let (endpoint, rx) = EndpointHandle::new();
        relay.register(identity("bob"), endpoint);
        drop(rx);

        assert_eq!(
            relay.forward(offer("alice", "bob")),
            ForwardOutcome::TargetOffline
        );
    }
}
