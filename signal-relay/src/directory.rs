//! The relay's session directory.
//!
//! Maps each online identity to the endpoint of its current Signaling
//! Channel. This is the relay's only shared mutable state; every operation
//! here is lock-per-shard and never awaits, so register/resolve/deregister
//! appear atomic relative to each other without ever holding exclusivity
//! across network I/O.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use signal_types::{Identity, ServerFrame};
use std::fmt;
use std::time::Instant;
use tokio::sync::mpsc;

/// Unique identifier for one Signaling Channel endpoint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(uuid::Uuid);

impl EndpointId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointId({})", self.0)
    }
}

/// Opaque handle to one connected Signaling Channel.
///
/// Delivery is fire-and-forget: frames are pushed onto the channel's
/// unbounded queue and drained by its writer task, so no caller ever blocks
/// on the remote peer.
#[derive(Clone, Debug)]
pub struct EndpointHandle {
    id: EndpointId,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

impl EndpointHandle {
    /// Create a handle plus the receiving side its writer task drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: EndpointId::new(),
                tx,
            },
            rx,
        )
    }

    /// This endpoint's unique id.
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Queue a frame for delivery. Returns `false` if the channel is gone.
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// One directory entry: an identity's current endpoint.
#[derive(Debug)]
struct DirectoryEntry {
    endpoint: EndpointHandle,
    last_seen: Instant,
}

impl DirectoryEntry {
    fn new(endpoint: EndpointHandle) -> Self {
        Self {
            endpoint,
            last_seen: Instant::now(),
        }
    }
}

/// Identity → endpoint map. At most one live endpoint per identity.
#[derive(Debug, Default)]
pub struct Directory {
    entries: DashMap<Identity, DirectoryEntry>,
}

impl Directory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity at an endpoint.
    ///
    /// A stale entry under a different endpoint is displaced in the same
    /// entry operation, so no interleaving can observe two endpoints for one
    /// identity. Returns the displaced endpoint, if any.
    pub fn register(&self, identity: Identity, endpoint: EndpointHandle) -> Option<EndpointHandle> {
        match self.entries.entry(identity) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().endpoint.id() == endpoint.id() {
                    // Same channel re-registering: refresh, nothing displaced.
                    occupied.get_mut().last_seen = Instant::now();
                    None
                } else {
                    let old = std::mem::replace(occupied.get_mut(), DirectoryEntry::new(endpoint));
                    Some(old.endpoint)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(DirectoryEntry::new(endpoint));
                None
            }
        }
    }

    /// Look up the endpoint for an identity. O(1) expected.
    pub fn resolve(&self, identity: &Identity) -> Option<EndpointHandle> {
        self.entries
            .get(identity)
            .map(|entry| entry.endpoint.clone())
    }

    /// Remove the entry for `identity` only if it still points at
    /// `endpoint_id`.
    ///
    /// A channel that was displaced by a newer registration finds the entry
    /// owned by someone else and leaves it alone. Returns whether an entry
    /// was removed.
    pub fn deregister(&self, identity: &Identity, endpoint_id: EndpointId) -> bool {
        self.entries
            .remove_if(identity, |_, entry| entry.endpoint.id() == endpoint_id)
            .is_some()
    }

    /// Refresh the liveness timestamp for an identity.
    pub fn touch(&self, identity: &Identity) {
        if let Some(mut entry) = self.entries.get_mut(identity) {
            entry.last_seen = Instant::now();
        }
    }

    /// When the identity last registered or sent traffic.
    pub fn last_seen(&self, identity: &Identity) -> Option<Instant> {
        self.entries.get(identity).map(|entry| entry.last_seen)
    }

    /// All online identities, sorted.
    pub fn online(&self) -> Vec<Identity> {
        let mut identities: Vec<Identity> =
            self.entries.iter().map(|e| e.key().clone()).collect();
        identities.sort();
        identities
    }

    /// Snapshot of every connected endpoint.
    pub fn endpoints(&self) -> Vec<EndpointHandle> {
        self.entries
            .iter()
            .map(|e| e.value().endpoint.clone())
            .collect()
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no identity is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    #[test]
    fn register_and_resolve() {
        let directory = Directory::new();
        let (endpoint, _rx) = EndpointHandle::new();

        assert!(directory.register(identity("alice"), endpoint.clone()).is_none());
        let resolved = directory.resolve(&identity("alice")).unwrap();
        assert_eq!(resolved.id(), endpoint.id());
    }

    #[test]
    fn reregistration_displaces_stale_endpoint() {
        let directory = Directory::new();
        let (e1, _rx1) = EndpointHandle::new();
        let (e2, _rx2) = EndpointHandle::new();

        directory.register(identity("alice"), e1.clone());
        let displaced = directory.register(identity("alice"), e2.clone());

        assert_eq!(displaced.unwrap().id(), e1.id());
        // Exactly one entry, pointing at the new endpoint
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.resolve(&identity("alice")).unwrap().id(), e2.id());
    }

    #[test]
    fn same_endpoint_reregistration_is_not_displacement() {
        let directory = Directory::new();
        let (endpoint, _rx) = EndpointHandle::new();

        directory.register(identity("alice"), endpoint.clone());
        assert!(directory.register(identity("alice"), endpoint.clone()).is_none());
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn deregister_removes_own_entry() {
        let directory = Directory::new();
        let (endpoint, _rx) = EndpointHandle::new();
        directory.register(identity("alice"), endpoint.clone());

        assert!(directory.deregister(&identity("alice"), endpoint.id()));
        assert!(directory.resolve(&identity("alice")).is_none());
        assert!(directory.is_empty());
    }

    #[test]
    fn deregister_after_displacement_is_noop() {
        let directory = Directory::new();
        let (e1, _rx1) = EndpointHandle::new();
        let (e2, _rx2) = EndpointHandle::new();

        directory.register(identity("alice"), e1.clone());
        directory.register(identity("alice"), e2.clone());

        // The displaced channel disconnects later: its deregister must not
        // remove the newer registration.
        assert!(!directory.deregister(&identity("alice"), e1.id()));
        assert_eq!(directory.resolve(&identity("alice")).unwrap().id(), e2.id());
    }

    #[test]
    fn touch_refreshes_last_seen() {
        let directory = Directory::new();
        let (endpoint, _rx) = EndpointHandle::new();
        directory.register(identity("alice"), endpoint);

        let before = directory.last_seen(&identity("alice")).unwrap();
        directory.touch(&identity("alice"));
        let after = directory.last_seen(&identity("alice")).unwrap();
        assert!(after >= before);
        assert!(directory.last_seen(&identity("ghost")).is_none());
    }

    #[test]
    fn deregister_unknown_identity_is_noop() {
        let directory = Directory::new();
        let (endpoint, _rx) = EndpointHandle::new();
        assert!(!directory.deregister(&identity("ghost"), endpoint.id()));
    }

    #[test]
    fn online_is_sorted() {
        let directory = Directory::new();
        let mut receivers = Vec::new();
        for name in ["carol", "alice", "bob"] {
            let (endpoint, rx) = EndpointHandle::new();
            receivers.push(rx);
            directory.register(identity(name), endpoint);
        }

        let names: Vec<String> = directory.online().iter().map(|i| i.to_string()).collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
    }

    #[test]
    fn endpoint_send_reports_closed_channel() {
        let (endpoint, rx) = EndpointHandle::new();
        drop(rx);
        assert!(!endpoint.send(ServerFrame::Displaced));
    }

    #[tokio::test]
    async fn endpoint_send_delivers_frames() {
        let (endpoint, mut rx) = EndpointHandle::new();
        assert!(endpoint.send(ServerFrame::Presence { online: vec![] }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerFrame::Presence { .. }
        ));
    }

    #[test]
    fn concurrent_registrations_keep_single_entry() {
        let directory = std::sync::Arc::new(Directory::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let directory = directory.clone();
            handles.push(std::thread::spawn(move || {
                let (endpoint, rx) = EndpointHandle::new();
                // Keep the receiver alive long enough for the register
                let displaced = directory.register(identity("alice"), endpoint);
                drop(rx);
                displaced
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(directory.len(), 1, "never more than one entry per identity");
    }
}
