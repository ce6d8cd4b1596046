//! Wire messages.
//!
//! Every datagram is one JSON-encoded [`Envelope`]. The `message` object
//! is tagged by `type`; client events spell their kind `CONNECT` or
//! `DISCONNECT`.
//!
//! ```json
//! {"sender":"10.0.0.5:54321",
//!  "message":{"type":"client_event","kind":"CONNECT","node":{...}}}
//! ```

use std::net::SocketAddr;

use fleet_core::Node;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM_BYTES: usize = 65_507;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientEventKind {
    Connect,
    Disconnect,
}

impl ClientEventKind {
    pub fn event(self, node: Node) -> ClientEvent {
        ClientEvent { kind: self, node }
    }
}

impl std::fmt::Display for ClientEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientEventKind::Connect => f.write_str("CONNECT"),
            ClientEventKind::Disconnect => f.write_str("DISCONNECT"),
        }
    }
}

/// A client joining or leaving the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEvent {
    pub kind: ClientEventKind,
    pub node: Node,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    ClientEvent(ClientEvent),
    /// Liveness signal; `node` is the sender's own record.
    Heartbeat { node: Node },
    /// Ask the receiver to stop with the given exit code.
    Shutdown { exit_code: i32 },
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::ClientEvent(_) => "client_event",
            Message::Heartbeat { .. } => "heartbeat",
            Message::Shutdown { .. } => "shutdown",
        }
    }
}

/// A message plus the address of the node that originated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: SocketAddr,
    pub message: Message,
}

impl Envelope {
    pub fn new(sender: SocketAddr, message: Message) -> Self {
        Self { sender, message }
    }

    pub fn client_event(sender: SocketAddr, kind: ClientEventKind, node: Node) -> Self {
        Self::new(sender, Message::ClientEvent(kind.event(node)))
    }

    pub fn heartbeat(node: Node) -> Self {
        Self::new(node.address, Message::Heartbeat { node })
    }

    pub fn shutdown(sender: SocketAddr, exit_code: i32) -> Self {
        Self::new(sender, Message::Shutdown { exit_code })
    }

    /// Serialize to a datagram payload.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let bytes = serde_json::to_vec(self).map_err(|e| ProtocolError::Encode(e.to_string()))?;
        if bytes.len() > MAX_DATAGRAM_BYTES {
            return Err(ProtocolError::Oversized {
                size: bytes.len(),
                max: MAX_DATAGRAM_BYTES,
            });
        }
        Ok(bytes)
    }

    pub fn decode(buf: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(buf).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}
