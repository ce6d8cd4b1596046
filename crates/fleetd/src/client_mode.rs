//! Client mode — runs on the node that submits work.
//!
//! In this mode, the daemon:
//! 1. Announces itself to the configured peers (CONNECT)
//! 2. Sends heartbeats so the compute nodes' watchdogs stay quiet
//! 3. Listens for cluster shutdown requests
//! 4. On Ctrl-C, announces its departure (DISCONNECT). For the
//!    controlling client this ends the whole cluster.

use std::sync::Arc;

use fleet_core::{FleetConfig, ShutdownCoordinator};
use fleet_membership::MembershipRegistry;
use fleet_protocol::{ClientAgent, DispatchConfig, Dispatcher, UdpTransport};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::shutdown::process_exit_action;

/// Run a client node.
pub async fn run_client(config: FleetConfig) -> anyhow::Result<()> {
    info!(
        address = %config.node.address,
        controlling = config.node.controlling_client,
        "Fleet daemon starting in client mode"
    );

    let peers = config.resolve_peers()?;
    if peers.is_empty() {
        anyhow::bail!("client mode needs at least one peer in the flatfile or membership.peers");
    }

    let interval = config.heartbeat_interval()?;
    let timeout = config.client_timeout()?;
    if interval >= timeout {
        warn!(?interval, ?timeout, "heartbeat interval is not shorter than the watchdog timeout");
    }

    // ── Transport + shutdown coordinator ─────────────────────────
    let registry = MembershipRegistry::from_flatfile(&peers);
    let transport = UdpTransport::bind(config.node.address).await?;
    let shutdown = Arc::new(ShutdownCoordinator::new(process_exit_action(
        transport.clone(),
        registry.clone(),
        config.node.address,
    )));
    let dispatcher = Arc::new(Dispatcher::new(
        DispatchConfig::from_config(&config),
        registry,
        shutdown,
    ));

    let (stop_tx, stop_rx) = watch::channel(false);

    // ── Shutdown listener ────────────────────────────────────────
    let listener = transport.clone();
    let listener_stop = stop_rx.clone();
    let listener_handle = tokio::spawn(async move {
        if let Err(e) = listener.serve(dispatcher, listener_stop).await {
            tracing::error!(error = %e, "listener error");
        }
    });

    // ── Join cluster ─────────────────────────────────────────────
    let agent = Arc::new(ClientAgent::new(transport, config.local_node(), peers));
    agent.connect().await?;

    // ── Heartbeat loop ───────────────────────────────────────────
    let heartbeat_agent = agent.clone();
    let heartbeat_stop = stop_rx.clone();
    let heartbeat_handle = tokio::spawn(async move {
        if let Err(e) = heartbeat_agent.run_heartbeat(interval, heartbeat_stop).await {
            tracing::error!(error = %e, "heartbeat loop error");
        }
    });

    // ── Wait for Ctrl-C, then leave ──────────────────────────────
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = stop_tx.send(true);
    let _ = heartbeat_handle.await;

    agent.disconnect().await?;
    let _ = listener_handle.await;

    info!("client stopped");
    Ok(())
}
