//! fleet-watchdog — controlling-client liveness enforcement.
//!
//! A client that crashes never sends DISCONNECT. The watchdog covers that
//! case: every timeout interval it looks for the controlling client in the
//! registry and, if that client has been silent for longer than the
//! timeout, stops the cluster.
//!
//! ```text
//! HeartbeatWatchdog::run
//!   loop {
//!     SCANNING: check_at(now) → NoClient | Alive | TimedOut
//!                 └── TimedOut → ShutdownCoordinator::initiate
//!     WAITING:  sleep(timeout)
//!   }
//! ```

pub mod watchdog;

pub use watchdog::{HeartbeatWatchdog, Verdict};
