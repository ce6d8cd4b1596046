//! Client agent — how a client node joins, stays alive in, and leaves
//! the cluster.
//!
//! A client only needs to reach one compute node: the CONNECT it sends is
//! applied there, and its heartbeats keep the watchdogs on every node it
//! reaches satisfied.

use std::net::SocketAddr;
use std::time::Duration;

use fleet_core::{Node, epoch_millis};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ProtocolResult;
use crate::message::{ClientEventKind, Envelope};
use crate::transport::UdpTransport;

pub struct ClientAgent {
    transport: UdpTransport,
    node: Node,
    peers: Vec<SocketAddr>,
}

impl ClientAgent {
    /// `node` describes this client; its address is used as the sender.
    pub fn new(transport: UdpTransport, node: Node, peers: Vec<SocketAddr>) -> Self {
        Self {
            transport,
            node,
            peers,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn peers(&self) -> &[SocketAddr] {
        &self.peers
    }

    /// Announce this client to every configured peer.
    pub async fn connect(&self) -> ProtocolResult<usize> {
        let sent = self.announce(ClientEventKind::Connect).await?;
        info!(client = %self.node, peers = sent, "connected to cluster");
        Ok(sent)
    }

    /// Announce departure. For the controlling client this ends the cluster.
    pub async fn disconnect(&self) -> ProtocolResult<usize> {
        let sent = self.announce(ClientEventKind::Disconnect).await?;
        info!(client = %self.node, peers = sent, "disconnected from cluster");
        Ok(sent)
    }

    /// Send heartbeats every `interval` until `shutdown` flips to true.
    pub async fn run_heartbeat(
        &self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> ProtocolResult<()> {
        info!(client = %self.node, ?interval, "heartbeat loop started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match self.send_heartbeat().await {
                        Ok(sent) => debug!(peers = sent, "heartbeat sent"),
                        Err(e) => warn!(error = %e, "heartbeat failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(client = %self.node, "heartbeat loop shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    pub async fn send_heartbeat(&self) -> ProtocolResult<usize> {
        let node = self.node.clone().with_last_heard_from(epoch_millis());
        self.transport
            .broadcast(self.peers.iter().copied(), &Envelope::heartbeat(node))
            .await
    }

    async fn announce(&self, kind: ClientEventKind) -> ProtocolResult<usize> {
        let node = self.node.clone().with_last_heard_from(epoch_millis());
        let envelope = Envelope::client_event(self.node.address, kind, node);
        self.transport
            .broadcast(self.peers.iter().copied(), &envelope)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MAX_DATAGRAM_BYTES, Message};
    use tokio::net::UdpSocket;

    async fn recv_envelope(socket: &UdpSocket) -> Envelope {
        let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        Envelope::decode(&buf[..len]).unwrap()
    }

    async fn agent_with_peer() -> (ClientAgent, UdpSocket) {
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let node = Node::client(transport.local_addr(), true);
        let agent = ClientAgent::new(transport, node, vec![peer.local_addr().unwrap()]);
        (agent, peer)
    }

    #[tokio::test]
    async fn connect_announces_self() {
        let (agent, peer) = agent_with_peer().await;

        assert_eq!(agent.connect().await.unwrap(), 1);

        let envelope = recv_envelope(&peer).await;
        assert_eq!(envelope.sender, agent.node().address);
        match envelope.message {
            Message::ClientEvent(event) => {
                assert_eq!(event.kind, ClientEventKind::Connect);
                assert!(event.node.is_controlling_client());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn disconnect_announces_self() {
        let (agent, peer) = agent_with_peer().await;

        agent.disconnect().await.unwrap();

        let envelope = recv_envelope(&peer).await;
        assert!(matches!(
            envelope.message,
            Message::ClientEvent(ref e) if e.kind == ClientEventKind::Disconnect
        ));
    }

    #[tokio::test]
    async fn heartbeat_loop_sends_until_stopped() {
        let (agent, peer) = agent_with_peer().await;
        let (tx, rx) = watch::channel(false);

        let agent = std::sync::Arc::new(agent);
        let runner = agent.clone();
        let handle = tokio::spawn(async move {
            runner
                .run_heartbeat(Duration::from_millis(20), rx)
                .await
                .unwrap();
        });

        let envelope = recv_envelope(&peer).await;
        assert!(matches!(envelope.message, Message::Heartbeat { .. }));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
