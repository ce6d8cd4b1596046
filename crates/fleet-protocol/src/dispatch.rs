//! Inbound dispatch — applies decoded messages to the local registry.
//!
//! Membership events and heartbeats are only acted on by compute nodes
//! running in flatfile mode, and never when they come from the local node
//! itself. Anything else is accepted and dropped. Shutdown requests are
//! honoured by clients and compute nodes alike, but a node with flatfile
//! membership disabled takes no part in this protocol and ignores them too.
//!
//! Members are added only by CONNECT and removed only by DISCONNECT. A
//! heartbeat refreshes a known entry and is otherwise dropped, since it may
//! be overtaken by its sender's DISCONNECT. `last_heard_from` always holds
//! the local receive time, never the sender's clock.
//!
//! A client usually talks to a single compute node. When that node has a
//! relay transport, whatever it hears straight from the client (CONNECT,
//! DISCONNECT, heartbeats) is forwarded once to the rest of its registry.
//! Forwarded copies carry the relaying node as sender and are never
//! forwarded again.

use std::net::SocketAddr;
use std::sync::Arc;

use fleet_core::shutdown::CLUSTER_EXIT_CODE;
use fleet_core::{FleetConfig, Node, ShutdownCoordinator, ShutdownReason, epoch_millis};
use fleet_membership::MembershipRegistry;
use tracing::{debug, info, warn};

use crate::error::ProtocolResult;
use crate::message::{ClientEvent, ClientEventKind, Envelope, Message};
use crate::transport::UdpTransport;

/// The local facts that decide whether a message is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub address: SocketAddr,
    pub client: bool,
    pub flatfile_enabled: bool,
}

impl DispatchConfig {
    pub fn from_config(config: &FleetConfig) -> Self {
        Self {
            address: config.node.address,
            client: config.node.client,
            flatfile_enabled: config.membership.flatfile_enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    SelfOriginated,
    ClientNode,
    FlatfileDisabled,
}

/// What dispatching a message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    Connected { address: SocketAddr, added: bool },
    Disconnected {
        address: SocketAddr,
        existed: bool,
        /// Whether this message started the cluster shutdown.
        shutdown: bool,
    },
    /// `known` is false when the sender is not a member; nothing changed.
    HeartbeatRecorded { address: SocketAddr, known: bool },
    ShutdownRequested { initiated: bool },
}

/// Applies inbound messages for one node.
pub struct Dispatcher {
    local: DispatchConfig,
    registry: MembershipRegistry,
    shutdown: Arc<ShutdownCoordinator>,
    relay: Option<UdpTransport>,
}

impl Dispatcher {
    pub fn new(
        local: DispatchConfig,
        registry: MembershipRegistry,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            local,
            registry,
            shutdown,
            relay: None,
        }
    }

    /// Forward messages received directly from a client to the other members.
    pub fn with_relay(mut self, transport: UdpTransport) -> Self {
        self.relay = Some(transport);
        self
    }

    pub fn local(&self) -> &DispatchConfig {
        &self.local
    }

    /// Decode a datagram and dispatch it.
    ///
    /// A datagram that fails to decode never touches the registry.
    pub async fn dispatch_datagram(&self, buf: &[u8]) -> ProtocolResult<Outcome> {
        let envelope = Envelope::decode(buf)?;
        Ok(self.dispatch(envelope).await)
    }

    pub async fn dispatch(&self, envelope: Envelope) -> Outcome {
        let Envelope { sender, message } = envelope;

        if sender == self.local.address {
            debug!(kind = message.name(), "ignoring self-originated message");
            return Outcome::Ignored(IgnoreReason::SelfOriginated);
        }

        match message {
            Message::Shutdown { exit_code } => {
                if !self.local.flatfile_enabled {
                    debug!(%sender, "shutdown request ignored, flatfile membership disabled");
                    return Outcome::Ignored(IgnoreReason::FlatfileDisabled);
                }
                let initiated = self
                    .shutdown
                    .initiate(ShutdownReason::PeerRequested { peer: sender }, exit_code)
                    .await;
                Outcome::ShutdownRequested { initiated }
            }
            Message::ClientEvent(event) => match self.membership_filter() {
                Some(reason) => {
                    debug!(%sender, kind = %event.kind, ?reason, "client event ignored");
                    Outcome::Ignored(reason)
                }
                None => self.handle_client_event(sender, event).await,
            },
            Message::Heartbeat { node } => match self.membership_filter() {
                Some(reason) => Outcome::Ignored(reason),
                None => {
                    let address = node.address;
                    let known = self.registry.refresh(node.clone());
                    if known {
                        debug!(%address, "heartbeat recorded");
                        self.relay(sender, &node, || Message::Heartbeat { node: node.clone() })
                            .await;
                    } else {
                        debug!(%address, %sender, "heartbeat from non-member ignored");
                    }
                    Outcome::HeartbeatRecorded { address, known }
                }
            },
        }
    }

    fn membership_filter(&self) -> Option<IgnoreReason> {
        if self.local.client {
            Some(IgnoreReason::ClientNode)
        } else if !self.local.flatfile_enabled {
            Some(IgnoreReason::FlatfileDisabled)
        } else {
            None
        }
    }

    async fn handle_client_event(&self, sender: SocketAddr, event: ClientEvent) -> Outcome {
        let ClientEvent { kind, node } = event;
        let address = node.address;

        match kind {
            ClientEventKind::Connect => {
                self.relay(sender, &node, || {
                    Message::ClientEvent(ClientEventKind::Connect.event(node.clone()))
                })
                .await;
                let added = self.registry.add(node.with_last_heard_from(epoch_millis()));
                info!(client = %address, %sender, added, "client connected");
                Outcome::Connected { address, added }
            }
            ClientEventKind::Disconnect => {
                let controlling = node.is_controlling_client();
                let existed = self.registry.remove(&address).is_some();
                info!(client = %address, %sender, existed, "client disconnected");
                self.relay(sender, &node, || {
                    Message::ClientEvent(ClientEventKind::Disconnect.event(node.clone()))
                })
                .await;

                let shutdown = controlling
                    && self
                        .shutdown
                        .initiate(
                            ShutdownReason::ControllingClientDisconnected { client: address },
                            CLUSTER_EXIT_CODE,
                        )
                        .await;

                Outcome::Disconnected {
                    address,
                    existed,
                    shutdown,
                }
            }
        }
    }

    /// Forward `message` to every other member, but only when `subject`
    /// sent it itself.
    async fn relay(&self, sender: SocketAddr, subject: &Node, message: impl FnOnce() -> Message) {
        let Some(transport) = &self.relay else {
            return;
        };
        if sender != subject.address {
            return;
        }

        let targets: Vec<SocketAddr> = self
            .registry
            .addresses()
            .into_iter()
            .filter(|a| *a != subject.address)
            .collect();
        let envelope = Envelope::new(self.local.address, message());

        match transport.broadcast(targets, &envelope).await {
            Ok(sent) => debug!(
                subject = %subject.address,
                kind = envelope.message.name(),
                sent,
                "relayed to peers"
            ),
            Err(e) => warn!(subject = %subject.address, error = %e, "relay failed"),
        }
    }
}
