//! Presence roster tracking.
//!
//! The relay publishes the full online-identity set on every membership
//! change. [`PresenceRoster`] diffs consecutive snapshots into joined/left
//! changes for the contacts layer.

use signal_types::Identity;
use std::collections::BTreeSet;

/// A single presence change derived from two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    /// The identity came online.
    Joined(Identity),
    /// The identity went offline.
    Left(Identity),
}

/// Tracks the last known online set and diffs incoming snapshots.
///
/// Snapshots are authoritative: a missed update is corrected by the next
/// full set, so the roster never drifts permanently.
#[derive(Debug, Default, Clone)]
pub struct PresenceRoster {
    online: BTreeSet<Identity>,
}

impl PresenceRoster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a full snapshot, returning the changes since the previous one.
    ///
    /// Changes are ordered: joins first, then leaves, each sorted by
    /// identity.
    pub fn apply_snapshot(&mut self, snapshot: &[Identity]) -> Vec<PresenceChange> {
        let next: BTreeSet<Identity> = snapshot.iter().cloned().collect();
        let mut changes = Vec::new();

        for id in next.difference(&self.online) {
            changes.push(PresenceChange::Joined(id.clone()));
        }
        for id in self.online.difference(&next) {
            changes.push(PresenceChange::Left(id.clone()));
        }

        self.online = next;
        changes
    }

    /// Whether the identity is currently online.
    pub fn is_online(&self, identity: &Identity) -> bool {
        self.online.contains(identity)
    }

    /// The current online set, sorted.
    pub fn online(&self) -> Vec<Identity> {
        self.online.iter().cloned().collect()
    }

    /// Number of identities currently online.
    pub fn len(&self) -> usize {
        self.online.len()
    }

    /// Whether nobody is online.
    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }
}
