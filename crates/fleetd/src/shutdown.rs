//! Process-level shutdown action.

use std::net::SocketAddr;
use std::sync::Arc;

use fleet_core::{ShutdownAction, ShutdownReason};
use fleet_membership::MembershipRegistry;
use fleet_protocol::{Envelope, UdpTransport};
use tracing::{error, info};

/// Tell every known member to stop, then exit this process.
pub fn process_exit_action(
    transport: UdpTransport,
    registry: MembershipRegistry,
    local: SocketAddr,
) -> ShutdownAction {
    Arc::new(move |reason: ShutdownReason, exit_code: i32| {
        let transport = transport.clone();
        let registry = registry.clone();
        Box::pin(async move {
            let envelope = Envelope::shutdown(local, exit_code);
            match transport.broadcast_to_members(&registry, &envelope).await {
                Ok(sent) => info!(peers = sent, "shutdown broadcast to cluster"),
                Err(e) => error!(error = %e, "failed to broadcast shutdown"),
            }
            info!(%reason, exit_code, "fleetd exiting");
            std::process::exit(exit_code);
        })
    })
}
