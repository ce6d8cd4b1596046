//! Node mode — runs on compute nodes.
//!
//! In this mode, the daemon:
//! 1. Seeds the membership registry from the flatfile
//! 2. Listens for membership events, heartbeats, and shutdown requests,
//!    relaying what a client tells it directly to the other members
//! 3. Runs the heartbeat watchdog for the controlling client
//! 4. On Ctrl-C, stops its own tasks without touching the cluster

use std::sync::Arc;

use fleet_core::{FleetConfig, ShutdownCoordinator};
use fleet_membership::MembershipRegistry;
use fleet_protocol::{DispatchConfig, Dispatcher, UdpTransport};
use fleet_watchdog::HeartbeatWatchdog;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::shutdown::process_exit_action;

/// Run a compute node.
pub async fn run_node(config: FleetConfig) -> anyhow::Result<()> {
    info!(address = %config.node.address, "Fleet daemon starting in node mode");

    // ── Membership registry ──────────────────────────────────────
    let peers = config.resolve_peers()?;
    let registry = MembershipRegistry::from_flatfile(&peers);

    // ── Transport + shutdown coordinator ─────────────────────────
    let transport = UdpTransport::bind(config.node.address).await?;
    let shutdown = Arc::new(ShutdownCoordinator::new(process_exit_action(
        transport.clone(),
        registry.clone(),
        config.node.address,
    )));

    let dispatcher = Arc::new(
        Dispatcher::new(
            DispatchConfig::from_config(&config),
            registry.clone(),
            shutdown.clone(),
        )
        .with_relay(transport.clone()),
    );

    // ── Shutdown signal ──────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);

    // ── Membership listener ──────────────────────────────────────
    let listener = transport.clone();
    let listener_stop = stop_rx.clone();
    let listener_handle = tokio::spawn(async move {
        if let Err(e) = listener.serve(dispatcher, listener_stop).await {
            tracing::error!(error = %e, "membership listener error");
        }
    });

    // ── Heartbeat watchdog ───────────────────────────────────────
    let watchdog_handle = if config.membership.flatfile_enabled {
        let watchdog = HeartbeatWatchdog::new(registry.clone(), config.client_timeout()?, shutdown);
        let watchdog_stop = stop_rx.clone();
        Some(tokio::spawn(async move { watchdog.run(watchdog_stop).await }))
    } else {
        warn!("flatfile membership disabled, membership protocol and watchdog inactive");
        None
    };

    // ── Wait for Ctrl-C ──────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = stop_tx.send(true);

    let _ = listener_handle.await;
    if let Some(handle) = watchdog_handle {
        let _ = handle.await;
    }

    info!(members = registry.len(), "node stopped");
    Ok(())
}
