//! Membership registry — address → node map shared by every task.
//!
//! Each operation takes the lock exactly once, so readers never observe a
//! half-applied change. Nothing here blocks beyond the lock itself, and
//! callers that iterate get a [`Snapshot`] instead of holding the lock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use fleet_core::{Node, epoch_millis};
use tracing::{debug, info};

/// Thread-safe registry of known cluster members.
#[derive(Clone, Default)]
pub struct MembershipRegistry {
    members: Arc<RwLock<HashMap<SocketAddr, Node>>>,
}

impl MembershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry with compute nodes for each flatfile entry.
    pub fn from_flatfile(peers: &[SocketAddr]) -> Self {
        let registry = Self::new();
        for peer in peers {
            registry.add(Node::compute(*peer));
        }
        info!(members = registry.len(), "registry seeded from flatfile");
        registry
    }

    /// Insert or overwrite a node. Returns true if the address was new.
    pub fn add(&self, node: Node) -> bool {
        let address = node.address;
        let mut members = self.members.write().expect("members lock");
        let added = members.insert(address, node).is_none();
        debug!(%address, added, "node added to registry");
        added
    }

    /// Remove a node. Absent addresses are a no-op.
    pub fn remove(&self, address: &SocketAddr) -> Option<Node> {
        let mut members = self.members.write().expect("members lock");
        let removed = members.remove(address);
        debug!(%address, existed = removed.is_some(), "node removed from registry");
        removed
    }

    pub fn contains(&self, address: &SocketAddr) -> bool {
        let members = self.members.read().expect("members lock");
        members.contains_key(address)
    }

    pub fn get(&self, address: &SocketAddr) -> Option<Node> {
        let members = self.members.read().expect("members lock");
        members.get(address).cloned()
    }

    /// Copy of the current members, safe to iterate while others mutate.
    pub fn list(&self) -> Snapshot {
        let members = self.members.read().expect("members lock");
        Snapshot {
            nodes: members.values().cloned().collect(),
        }
    }

    /// Record contact with a known node. Unknown addresses are ignored.
    pub fn touch(&self, address: &SocketAddr, timestamp: u64) -> bool {
        let mut members = self.members.write().expect("members lock");
        match members.get_mut(address) {
            Some(node) => {
                node.last_heard_from = timestamp;
                true
            }
            None => false,
        }
    }

    /// Ingest a heartbeat from a known node: take the advertised metadata
    /// and stamp the local receive time. Unknown addresses are ignored, so
    /// a heartbeat that arrives after its node's DISCONNECT adds nothing.
    pub fn refresh(&self, node: Node) -> bool {
        let address = node.address;
        let mut members = self.members.write().expect("members lock");
        match members.get_mut(&address) {
            Some(existing) => {
                existing.role = node.role;
                existing.heartbeat = node.heartbeat;
                existing.last_heard_from = epoch_millis();
                true
            }
            None => false,
        }
    }

    /// Members carrying the controlling-client flag.
    pub fn controlling_clients(&self) -> Vec<Node> {
        let members = self.members.read().expect("members lock");
        members
            .values()
            .filter(|n| n.is_controlling_client())
            .cloned()
            .collect()
    }

    pub fn addresses(&self) -> Vec<SocketAddr> {
        let members = self.members.read().expect("members lock");
        members.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        let members = self.members.read().expect("members lock");
        members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MembershipRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipRegistry")
            .field("members", &self.len())
            .finish()
    }
}

/// Point-in-time view of the registry. Iterate it as often as needed.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    nodes: Vec<Node>,
}

impl Snapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, address: &SocketAddr) -> bool {
        self.nodes.iter().any(|n| n.address == *address)
    }

    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.nodes.iter().map(|n| n.address).collect()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl IntoIterator for Snapshot {
    type Item = Node;
    type IntoIter = std::vec::IntoIter<Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}
