//! Peer roster
//!
//! Shared map of known peers: `EndpointId -> EndpointAddr`. Entries are added
//! when discovery hands us a peer or when a peer dials in; nothing is ever
//! proactively removed; a stale entry just costs one failed attempt at
//! request time.

use std::collections::HashMap;

use iroh::{EndpointAddr, EndpointId};
use parking_lot::RwLock;
use tracing::debug;

/// Roster of reachable (or once-reachable) peers.
#[derive(Default)]
pub struct PeerRoster {
    peers: RwLock<HashMap<EndpointId, EndpointAddr>>,
}

impl PeerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or refresh a peer. Returns `true` if the peer was not known yet.
    pub fn add(&self, addr: EndpointAddr) -> bool {
        let id = addr.id;
        let mut peers = self.peers.write();
        let inserted = peers.insert(id, addr).is_none();
        if inserted {
            debug!(peer = %hex::encode(&id.as_bytes()[..8]), total = peers.len(), "roster: peer added");
        }
        inserted
    }

    pub fn contains(&self, id: &EndpointId) -> bool {
        self.peers.read().contains_key(id)
    }

    /// Dial info for one peer, if known.
    pub fn addr_of(&self, id: &EndpointId) -> Option<EndpointAddr> {
        self.peers.read().get(id).cloned()
    }

    /// Current peer ids, sorted by id bytes.
    ///
    /// The sort is what makes `request_file`'s roster walk deterministic for
    /// a given roster state.
    pub fn peer_ids(&self) -> Vec<EndpointId> {
        let mut ids: Vec<EndpointId> = self.peers.read().keys().copied().collect();
        ids.sort_by_key(|id| *id.as_bytes());
        ids
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

impl std::fmt::Debug for PeerRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerRoster")
            .field("peers", &self.len())
            .finish()
    }
}
