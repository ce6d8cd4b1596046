//! Shutdown coordinator — the point of no return.
//!
//! Two triggers end the cluster: the controlling client announcing its
//! departure and the controlling client going silent past the watchdog
//! timeout. A third, peer-requested shutdown, propagates the decision to
//! the rest of the cluster. Whatever the trigger, the configured action
//! runs at most once per process.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

/// Exit status used when the controlling client ends the session.
pub const CLUSTER_EXIT_CODE: i32 = 0;

/// Callback that performs the actual shutdown.
///
/// In production this tells the peers to stop and exits the process.
pub type ShutdownAction = Arc<dyn Fn(ShutdownReason, i32) -> BoxFuture + Send + Sync>;

pub type BoxFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// Why the cluster is being stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    ControllingClientDisconnected { client: SocketAddr },
    ControllingClientTimedOut { client: SocketAddr, silent_for: Duration },
    PeerRequested { peer: SocketAddr },
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::ControllingClientDisconnected { client } => {
                write!(f, "controlling client {client} disconnected from the cluster")
            }
            ShutdownReason::ControllingClientTimedOut { client, silent_for } => write!(
                f,
                "controlling client {client} heartbeat timed out (silent for {silent_for:?})"
            ),
            ShutdownReason::PeerRequested { peer } => {
                write!(f, "shutdown requested by peer {peer}")
            }
        }
    }
}

/// Latches the first shutdown request and runs the action for it.
pub struct ShutdownCoordinator {
    initiated: AtomicBool,
    reason: Mutex<Option<ShutdownReason>>,
    action: ShutdownAction,
}

impl ShutdownCoordinator {
    pub fn new(action: ShutdownAction) -> Self {
        Self {
            initiated: AtomicBool::new(false),
            reason: Mutex::new(None),
            action,
        }
    }

    /// Start shutting down the cluster.
    ///
    /// Returns `true` if this call ran the action, `false` if a shutdown
    /// was already in progress.
    pub async fn initiate(&self, reason: ShutdownReason, exit_code: i32) -> bool {
        if self.initiated.swap(true, Ordering::SeqCst) {
            debug!(%reason, "shutdown already in progress, ignoring");
            return false;
        }

        warn!(%reason, exit_code, "stopping cluster");
        *self.reason.lock().expect("shutdown reason lock") = Some(reason.clone());
        (self.action)(reason, exit_code).await;
        true
    }

    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// The reason recorded by the call that won the latch.
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.lock().expect("shutdown reason lock").clone()
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("initiated", &self.is_initiated())
            .finish_non_exhaustive()
    }
}
