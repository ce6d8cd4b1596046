//! fleet-membership — the process-wide set of known peers.
//!
//! The registry (historically "the flatfile") is seeded from static
//! configuration and afterwards gains or loses members only through
//! CONNECT/DISCONNECT; heartbeats just refresh known entries. It is an explicit `Clone`-able handle rather than
//! global state, so every test and every process builds its own.
//!
//! ```text
//! MembershipRegistry (Arc<RwLock<HashMap<SocketAddr, Node>>>)
//!   ├── add / remove        ← CONNECT / DISCONNECT handling
//!   ├── touch / refresh     ← heartbeats
//!   └── list → Snapshot     → watchdog scans, broadcasts
//! ```

pub mod registry;

pub use registry::{MembershipRegistry, Snapshot};
