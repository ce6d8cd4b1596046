//! Node identity and heartbeat record.
//!
//! A [`Node`] is identified by its network address. Everything else on it
//! is liveness metadata that the registry overwrites in place as heartbeats
//! and membership events arrive.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Whether a node computes or only submits work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    #[default]
    Compute,
    Client,
}

/// Liveness metadata a node advertises about itself.
///
/// Only `controlling_client` is interpreted by the membership subsystem;
/// the statistics are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeartBeat {
    /// The "bully" client whose departure or silence ends the cluster.
    ///
    /// At most one node should carry this flag, but nothing enforces it.
    pub controlling_client: bool,
    pub cpus: u32,
    pub free_memory_bytes: u64,
    /// Cluster size as last seen by the advertising node.
    pub cloud_size: u32,
    pub build_version: String,
}

/// One cluster participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub address: SocketAddr,
    pub role: NodeRole,
    pub heartbeat: HeartBeat,
    /// Unix timestamp (milliseconds) of the most recent contact.
    pub last_heard_from: u64,
}

impl Node {
    /// A compute node heard from just now.
    pub fn compute(address: SocketAddr) -> Self {
        Self {
            address,
            role: NodeRole::Compute,
            heartbeat: HeartBeat::default(),
            last_heard_from: epoch_millis(),
        }
    }

    /// A client node heard from just now.
    pub fn client(address: SocketAddr, controlling: bool) -> Self {
        Self {
            address,
            role: NodeRole::Client,
            heartbeat: HeartBeat {
                controlling_client: controlling,
                ..HeartBeat::default()
            },
            last_heard_from: epoch_millis(),
        }
    }

    pub fn with_last_heard_from(mut self, timestamp: u64) -> Self {
        self.last_heard_from = timestamp;
        self
    }

    pub fn is_client(&self) -> bool {
        self.role == NodeRole::Client
    }

    pub fn is_controlling_client(&self) -> bool {
        self.heartbeat.controlling_client
    }

    /// Instant (epoch millis) after which the node counts as silent.
    pub fn deadline(&self, timeout: Duration) -> u64 {
        self.last_heard_from.saturating_add(duration_millis(timeout))
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.role, self.is_controlling_client()) {
            (NodeRole::Client, true) => write!(f, "{} (controlling client)", self.address),
            (NodeRole::Client, false) => write!(f, "{} (client)", self.address),
            (NodeRole::Compute, _) => write!(f, "{}", self.address),
        }
    }
}

/// Current Unix time in milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_millis)
        .unwrap_or_default()
}

pub(crate) fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
