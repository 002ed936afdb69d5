//! Network status monitor.
//!
//! Holds the current connectivity snapshot in a `tokio::sync::watch`
//! channel and fires registered handlers once per transition edge. Setting
//! the same status twice fires nothing.

use crate::config::MonitorConfig;
use crate::error::SyncResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Direction of a connectivity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Offline to online.
    Online,
    /// Online to offline.
    Offline,
}

impl Direction {
    fn of(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

type Handler = Arc<dyn Fn() + Send + Sync>;

/// Tracks online/offline status.
pub struct NetworkMonitor {
    status: watch::Sender<bool>,
    handlers: RwLock<Vec<(Direction, Handler)>>,
}

impl NetworkMonitor {
    /// Creates a monitor with an initial status.
    pub fn new(online: bool) -> Self {
        let (status, _) = watch::channel(online);
        Self {
            status,
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Current snapshot.
    pub fn is_online(&self) -> bool {
        *self.status.borrow()
    }

    /// Registers a handler for one transition direction.
    ///
    /// Every registered handler fires exactly once per matching edge.
    /// Handlers run on the thread that reported the change and must not
    /// block.
    pub fn on_transition<F>(&self, direction: Direction, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers.write().push((direction, Arc::new(handler)));
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// Reports the current status. Returns true if this was an edge.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.status.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            let direction = Direction::of(online);
            info!(%direction, "network status changed");
            let handlers: Vec<Handler> = self
                .handlers
                .read()
                .iter()
                .filter(|(d, _)| *d == direction)
                .map(|(_, h)| Arc::clone(h))
                .collect();
            for handler in handlers {
                handler();
            }
        }
        changed
    }

    /// Polls `probe` every `probe_interval` and reports the result.
    ///
    /// A probe error or a probe exceeding `probe_timeout` reports offline.
    /// The task ends once the monitor is dropped.
    pub fn spawn_probe(
        self: &Arc<Self>,
        probe: Arc<dyn ConnectivityProbe>,
        config: MonitorConfig,
    ) -> JoinHandle<()> {
        let monitor: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.probe_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let online = match tokio::time::timeout(config.probe_timeout, probe.check()).await
                {
                    Ok(Ok(online)) => online,
                    Ok(Err(err)) => {
                        debug!(error = %err, "connectivity probe failed");
                        false
                    }
                    Err(_) => {
                        debug!(timeout = ?config.probe_timeout, "connectivity probe timed out");
                        false
                    }
                };
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                monitor.set_online(online);
            }
        })
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("online", &self.is_online())
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

/// Checks whether the remote system is reachable.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true if the remote system is reachable.
    async fn check(&self) -> SyncResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn counter(monitor: &NetworkMonitor, direction: Direction) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        monitor.on_transition(direction, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn handlers_fire_once_per_edge() {
        let monitor = NetworkMonitor::new(false);
        let online = counter(&monitor, Direction::Online);
        let offline = counter(&monitor, Direction::Offline);

        assert!(monitor.set_online(true));
        assert!(!monitor.set_online(true));
        assert!(!monitor.set_online(true));
        assert!(monitor.is_online());
        assert_eq!(online.load(Ordering::SeqCst), 1);
        assert_eq!(offline.load(Ordering::SeqCst), 0);

        assert!(monitor.set_online(false));
        assert!(!monitor.set_online(false));
        assert_eq!(offline.load(Ordering::SeqCst), 1);

        monitor.set_online(true);
        assert_eq!(online.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn every_registration_fires() {
        let monitor = NetworkMonitor::new(false);
        let a = counter(&monitor, Direction::Online);
        let b = counter(&monitor, Direction::Online);
        monitor.set_online(true);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let monitor = NetworkMonitor::new(false);
        let mut rx = monitor.subscribe();
        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    struct FlagProbe(AtomicBool);

    #[async_trait]
    impl ConnectivityProbe for FlagProbe {
        async fn check(&self) -> SyncResult<bool> {
            Ok(self.0.load(Ordering::SeqCst))
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl ConnectivityProbe for FailingProbe {
        async fn check(&self) -> SyncResult<bool> {
            Err(SyncError::transport_retryable("dns lookup failed"))
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl ConnectivityProbe for HangingProbe {
        async fn check(&self) -> SyncResult<bool> {
            std::future::pending::<()>().await;
            Ok(true)
        }
    }

    fn fast() -> MonitorConfig {
        MonitorConfig::new()
            .with_probe_interval(Duration::from_millis(10))
            .with_probe_timeout(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn probe_drives_status() {
        let monitor = Arc::new(NetworkMonitor::new(false));
        let probe = Arc::new(FlagProbe(AtomicBool::new(true)));
        let mut rx = monitor.subscribe();
        let task = monitor.spawn_probe(probe.clone(), fast());

        rx.changed().await.unwrap();
        assert!(monitor.is_online());

        probe.0.store(false, Ordering::SeqCst);
        rx.changed().await.unwrap();
        assert!(!monitor.is_online());
        task.abort();
    }

    #[tokio::test]
    async fn failing_probe_reports_offline() {
        let monitor = Arc::new(NetworkMonitor::new(true));
        let mut rx = monitor.subscribe();
        let task = monitor.spawn_probe(Arc::new(FailingProbe), fast());
        rx.changed().await.unwrap();
        assert!(!monitor.is_online());
        task.abort();
    }

    #[tokio::test]
    async fn hanging_probe_reports_offline() {
        let monitor = Arc::new(NetworkMonitor::new(true));
        let mut rx = monitor.subscribe();
        let task = monitor.spawn_probe(Arc::new(HangingProbe), fast());
        rx.changed().await.unwrap();
        assert!(!monitor.is_online());
        task.abort();
    }

    #[tokio::test]
    async fn probe_stops_when_monitor_dropped() {
        let monitor = Arc::new(NetworkMonitor::new(false));
        let task = monitor.spawn_probe(Arc::new(FlagProbe(AtomicBool::new(true))), fast());
        drop(monitor);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
