//! Per-remote session table.
//!
//! Keyed by remote identity; get-or-create is atomic so two near-simultaneous
//! calls for the same remote never produce two sessions.

use dashmap::DashMap;
use signal_core::SessionState;
use signal_types::Identity;
use std::sync::Arc;

use crate::session::PeerSession;

/// Concurrent directory of live peer sessions, one per remote identity.
#[derive(Default)]
pub struct PeerTable {
    sessions: DashMap<Identity, Arc<PeerSession>>,
}

impl PeerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the session for a remote, if any.
    pub fn get(&self, remote: &Identity) -> Option<Arc<PeerSession>> {
        self.sessions.get(remote).map(|entry| entry.value().clone())
    }

    /// Get the session for a remote, creating it if absent.
    ///
    /// Creation runs under the map's entry lock, so concurrent callers for
    /// the same remote observe exactly one session.
    pub fn get_or_create<F>(&self, remote: Identity, create: F) -> Arc<PeerSession>
    where
        F: FnOnce() -> Arc<PeerSession>,
    {
        self.sessions
            .entry(remote)
            .or_insert_with(create)
            .value()
            .clone()
    }

    /// Like [`get_or_create`](Self::get_or_create), but a session that has
    /// already failed or closed is torn down and replaced first.
    ///
    /// Closed state is terminal, so an inbound offer for such a remote gets
    /// a fresh session instead of a dead one.
    pub fn fresh_or_existing<F>(&self, remote: Identity, create: F) -> Arc<PeerSession>
    where
        F: FnOnce() -> Arc<PeerSession>,
    {
        if let Some(existing) = self.get(&remote) {
            if !matches!(
                existing.state(),
                SessionState::Closed | SessionState::Failed
            ) {
                return existing;
            }
            self.sessions.remove(&remote);
        }
        self.get_or_create(remote, create)
    }

    /// Remove and return the session for a remote.
    ///
    /// The caller is responsible for closing it.
    pub fn remove(&self, remote: &Identity) -> Option<Arc<PeerSession>> {
        self.sessions.remove(remote).map(|(_, session)| session)
    }

    /// Number of tracked sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of all sessions.
    pub fn all(&self) -> Vec<Arc<PeerSession>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
