//! fleet-protocol — membership events over UDP.
//!
//! Carries CONNECT/DISCONNECT announcements, client heartbeats, and
//! cluster-wide shutdown requests between nodes, and applies them to the
//! local [`MembershipRegistry`](fleet_membership::MembershipRegistry).
//!
//! # Architecture
//!
//! ```text
//! ClientAgent (client node)
//!   ├── connect()       → broadcast CONNECT(self)
//!   ├── run_heartbeat() → periodic Heartbeat(self) to every peer
//!   └── disconnect()    → broadcast DISCONNECT(self)
//!
//! UdpTransport::serve (compute node)
//!   └── one task per datagram → Envelope::decode → Dispatcher::dispatch
//!       ├── CONNECT     → registry.add (stamped with receive time)
//!       ├── DISCONNECT  → registry.remove (+ shutdown if controlling client)
//!       ├── Heartbeat   → registry.refresh (known nodes only)
//!       └── Shutdown    → ShutdownCoordinator::initiate
//! ```
//!
//! Delivery is best-effort. Duplicates are harmless because every registry
//! update is idempotent, and a lost DISCONNECT of the controlling client is
//! caught by the heartbeat watchdog instead.

pub mod client;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod transport;

pub use client::ClientAgent;
pub use dispatch::{DispatchConfig, Dispatcher, IgnoreReason, Outcome};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{ClientEvent, ClientEventKind, Envelope, Message};
pub use transport::UdpTransport;
