//! UDP transport — fire-and-forget datagrams between nodes.
//!
//! Sends are never acknowledged or retried. The receive loop hands each
//! datagram to its own task so a slow shutdown action cannot stall
//! membership updates queued behind it.

use std::net::SocketAddr;
use std::sync::Arc;

use fleet_membership::MembershipRegistry;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::ProtocolResult;
use crate::message::{Envelope, MAX_DATAGRAM_BYTES};

/// A bound UDP socket shared by the receive loop and all senders.
#[derive(Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl UdpTransport {
    pub async fn bind(addr: SocketAddr) -> ProtocolResult<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        debug!(%local_addr, "udp transport bound");
        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    /// The bound address (resolves port 0 to the assigned port).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn send_to(&self, target: SocketAddr, envelope: &Envelope) -> ProtocolResult<()> {
        let payload = envelope.encode()?;
        self.socket.send_to(&payload, target).await?;
        Ok(())
    }

    /// Send one envelope to every target except ourselves.
    ///
    /// Returns the number of successful sends. A failed send is logged and
    /// skipped; only an unencodable envelope is an error.
    pub async fn broadcast<I>(&self, targets: I, envelope: &Envelope) -> ProtocolResult<usize>
    where
        I: IntoIterator<Item = SocketAddr>,
    {
        let payload = envelope.encode()?;
        let mut sent = 0;

        for target in targets {
            if target == self.local_addr || target == envelope.sender {
                continue;
            }
            match self.socket.send_to(&payload, target).await {
                Ok(_) => sent += 1,
                Err(e) => {
                    warn!(%target, kind = envelope.message.name(), error = %e, "broadcast send failed")
                }
            }
        }

        debug!(kind = envelope.message.name(), sent, "broadcast complete");
        Ok(sent)
    }

    /// Broadcast to every current registry member.
    pub async fn broadcast_to_members(
        &self,
        registry: &MembershipRegistry,
        envelope: &Envelope,
    ) -> ProtocolResult<usize> {
        self.broadcast(registry.list().addresses(), envelope).await
    }

    /// Receive and dispatch datagrams until `shutdown` flips to true.
    pub async fn serve(
        &self,
        dispatcher: Arc<Dispatcher>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ProtocolResult<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
        info!(local_addr = %self.local_addr, "membership listener started");

        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    let (len, from) = match received {
                        Ok(r) => r,
                        Err(e) => {
                            // ICMP port-unreachable from an earlier send surfaces here.
                            warn!(error = %e, "udp receive failed");
                            continue;
                        }
                    };

                    let datagram = buf[..len].to_vec();
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        match dispatcher.dispatch_datagram(&datagram).await {
                            Ok(outcome) => debug!(%from, ?outcome, "message dispatched"),
                            Err(e) => error!(%from, error = %e, "dropping inbound message"),
                        }
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(local_addr = %self.local_addr, "membership listener shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}
