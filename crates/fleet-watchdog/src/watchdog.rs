//! Heartbeat watchdog — background loop enforcing the controlling-client
//! timeout.
//!
//! The loop never ends on its own: in production it lives as long as the
//! process. A `watch` stop signal exists so tests can end it; any other
//! wake-up during the wait is treated as an interruption and the loop
//! simply carries on.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fleet_core::shutdown::CLUSTER_EXIT_CODE;
use fleet_core::{ShutdownCoordinator, ShutdownReason, epoch_millis};
use fleet_membership::MembershipRegistry;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Result of scanning the registry once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No controlling client is registered; nothing to enforce.
    NoClient,
    Alive { client: SocketAddr },
    TimedOut { client: SocketAddr, silent_for: Duration },
}

/// Watches the controlling client's last heartbeat.
pub struct HeartbeatWatchdog {
    registry: MembershipRegistry,
    timeout: Duration,
    shutdown: Arc<ShutdownCoordinator>,
}

enum Wake {
    Elapsed,
    Stop,
    Interrupted,
    Detached,
}

impl HeartbeatWatchdog {
    pub fn new(
        registry: MembershipRegistry,
        timeout: Duration,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            registry,
            timeout,
            shutdown,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluate the registry as of `now` (epoch millis) without side effects.
    ///
    /// The client counts as alive while `now <= last_heard_from + timeout`.
    /// Should more than one node claim the controlling flag, any live one
    /// keeps the cluster up.
    pub fn check_at(&self, now: u64) -> Verdict {
        let snapshot = self.registry.list();
        let mut stale = None;

        for node in snapshot.iter().filter(|n| n.is_controlling_client()) {
            if now <= node.deadline(self.timeout) {
                return Verdict::Alive {
                    client: node.address,
                };
            }
            if stale.is_none() {
                stale = Some(Verdict::TimedOut {
                    client: node.address,
                    silent_for: Duration::from_millis(now.saturating_sub(node.last_heard_from)),
                });
            }
        }

        stale.unwrap_or(Verdict::NoClient)
    }

    /// One SCANNING step: check and, on timeout, stop the cluster.
    pub async fn cycle(&self, now: u64) -> Verdict {
        let verdict = self.check_at(now);
        match verdict {
            Verdict::NoClient => debug!("no controlling client registered"),
            Verdict::Alive { client } => debug!(%client, "controlling client alive"),
            Verdict::TimedOut { client, silent_for } => {
                warn!(
                    %client,
                    ?silent_for,
                    timeout = ?self.timeout,
                    "controlling client heartbeat not seen within timeout"
                );
                self.shutdown
                    .initiate(
                        ShutdownReason::ControllingClientTimedOut { client, silent_for },
                        CLUSTER_EXIT_CODE,
                    )
                    .await;
            }
        }
        verdict
    }

    /// Run SCANNING/WAITING cycles until `stop` carries `true`.
    ///
    /// If the stop sender goes away the loop keeps running for the rest of
    /// the process lifetime.
    pub async fn run(&self, stop: watch::Receiver<bool>) {
        let mut stop = Some(stop);
        info!(timeout = ?self.timeout, "heartbeat watchdog started");

        loop {
            self.cycle(epoch_millis()).await;

            let sleep = tokio::time::sleep(self.timeout);
            let wake = match stop.as_mut() {
                None => {
                    sleep.await;
                    Wake::Elapsed
                }
                Some(rx) => tokio::select! {
                    _ = sleep => Wake::Elapsed,
                    changed = rx.changed() => match changed {
                        Ok(()) if *rx.borrow() => Wake::Stop,
                        Ok(()) => Wake::Interrupted,
                        Err(_) => Wake::Detached,
                    },
                },
            };

            match wake {
                Wake::Elapsed => {}
                Wake::Stop => {
                    info!("heartbeat watchdog stopped");
                    break;
                }
                Wake::Interrupted => debug!("watchdog wait interrupted, resuming"),
                Wake::Detached => {
                    debug!("watchdog stop signal dropped, running until process exit");
                    stop = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{Node, ShutdownAction};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const T0: u64 = 1_700_000_000_000;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn recording_shutdown() -> (Arc<ShutdownCoordinator>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let action: ShutdownAction = Arc::new(move |_reason, _code| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        (Arc::new(ShutdownCoordinator::new(action)), calls)
    }

    /// Registry {A, B} plus controlling client C last heard at T0.
    fn scenario() -> (HeartbeatWatchdog, MembershipRegistry, Arc<AtomicUsize>) {
        let registry =
            MembershipRegistry::from_flatfile(&[addr("10.0.0.1:54321"), addr("10.0.0.2:54321")]);
        registry.add(Node::client(addr("10.0.0.3:54321"), true).with_last_heard_from(T0));
        let (shutdown, calls) = recording_shutdown();
        let watchdog =
            HeartbeatWatchdog::new(registry.clone(), Duration::from_millis(5_000), shutdown);
        (watchdog, registry, calls)
    }

    #[test]
    fn fresh_client_is_alive() {
        let (watchdog, _, _) = scenario();
        assert_eq!(
            watchdog.check_at(T0 + 4_000),
            Verdict::Alive {
                client: addr("10.0.0.3:54321")
            }
        );
    }

    #[test]
    fn deadline_itself_is_still_alive() {
        let (watchdog, _, _) = scenario();
        assert!(matches!(watchdog.check_at(T0 + 5_000), Verdict::Alive { .. }));
    }

    #[test]
    fn stale_client_times_out() {
        let (watchdog, _, _) = scenario();
        assert_eq!(
            watchdog.check_at(T0 + 6_000),
            Verdict::TimedOut {
                client: addr("10.0.0.3:54321"),
                silent_for: Duration::from_millis(6_000),
            }
        );
    }

    #[test]
    fn no_client_is_normal() {
        let registry = MembershipRegistry::from_flatfile(&[addr("10.0.0.1:54321")]);
        registry.add(Node::client(addr("10.0.0.4:54321"), false).with_last_heard_from(0));
        let (shutdown, _) = recording_shutdown();
        let watchdog = HeartbeatWatchdog::new(registry, Duration::from_secs(5), shutdown);

        assert_eq!(watchdog.check_at(T0), Verdict::NoClient);
    }

    #[test]
    fn any_live_controlling_client_keeps_cluster_up() {
        let (watchdog, registry, _) = scenario();
        registry.add(Node::client(addr("10.0.0.5:54321"), true).with_last_heard_from(T0 + 5_000));

        assert_eq!(
            watchdog.check_at(T0 + 6_000),
            Verdict::Alive {
                client: addr("10.0.0.5:54321")
            }
        );
    }

    #[tokio::test]
    async fn cycle_within_window_does_not_shut_down() {
        let (watchdog, _, calls) = scenario();
        watchdog.cycle(T0 + 4_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cycle_past_deadline_shuts_down() {
        let (watchdog, _, calls) = scenario();
        watchdog.cycle(T0 + 6_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            watchdog.shutdown.reason(),
            Some(ShutdownReason::ControllingClientTimedOut { .. })
        ));
    }

    #[tokio::test]
    async fn repeated_timeouts_shut_down_once() {
        let (watchdog, _, calls) = scenario();
        watchdog.cycle(T0 + 6_000).await;
        watchdog.cycle(T0 + 11_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn heartbeat_touch_keeps_client_alive() {
        let (watchdog, registry, calls) = scenario();
        registry.touch(&addr("10.0.0.3:54321"), T0 + 4_000);

        watchdog.cycle(T0 + 6_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_shuts_down_stale_client_and_stops_on_signal() {
        let registry = MembershipRegistry::new();
        registry.add(Node::client(addr("10.0.0.3:54321"), true).with_last_heard_from(1));
        let (shutdown, calls) = recording_shutdown();
        let watchdog = Arc::new(HeartbeatWatchdog::new(
            registry,
            Duration::from_millis(20),
            shutdown,
        ));

        let (tx, rx) = watch::channel(false);
        let runner = watchdog.clone();
        let handle = tokio::spawn(async move { runner.run(rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn spurious_wakeup_does_not_stop_loop() {
        let (shutdown, _) = recording_shutdown();
        let watchdog = Arc::new(HeartbeatWatchdog::new(
            MembershipRegistry::new(),
            Duration::from_millis(20),
            shutdown,
        ));

        let (tx, rx) = watch::channel(false);
        let runner = watchdog.clone();
        let handle = tokio::spawn(async move { runner.run(rx).await });

        tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_stop_signal_keeps_running() {
        let (shutdown, _) = recording_shutdown();
        let watchdog = Arc::new(HeartbeatWatchdog::new(
            MembershipRegistry::new(),
            Duration::from_millis(10),
            shutdown,
        ));

        let (tx, rx) = watch::channel(false);
        let runner = watchdog.clone();
        let handle = tokio::spawn(async move { runner.run(rx).await });

        drop(tx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
