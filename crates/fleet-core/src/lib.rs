//! fleet-core — shared building blocks for the Fleet membership subsystem.
//!
//! - [`Node`] / [`HeartBeat`]: peer identity plus mutable liveness metadata
//! - [`FleetConfig`]: `fleet.toml` parsing and duration handling
//! - [`flatfile`]: the static peer list used for flatfile membership
//! - [`ShutdownCoordinator`]: the single, latched "stop the cluster" action

pub mod config;
pub mod error;
pub mod flatfile;
pub mod shutdown;
pub mod types;

pub use config::FleetConfig;
pub use error::{CoreError, CoreResult};
pub use shutdown::{BoxFuture, ShutdownAction, ShutdownCoordinator, ShutdownReason};
pub use types::*;
