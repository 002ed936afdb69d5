//! Background drain worker.

use crate::coordinator::SyncCoordinator;
use crate::network::{Direction, NetworkMonitor};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error};

/// Handle to a running worker.
///
/// Dropping the handle stops the worker as well; a pass already running
/// finishes on its own.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Stops the worker and waits for its loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            error!(error = %err, "sync worker panicked");
        }
    }

    /// Returns true once the worker loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl SyncCoordinator {
    /// Starts the background worker.
    ///
    /// The worker:
    /// - runs crash recovery, then a startup pass if already online
    /// - starts a pass on every offline-to-online transition
    /// - starts a pass on [`SyncCoordinator::trigger`] while online
    /// - starts a pass every `auto_sync_interval` while online, if set
    ///
    /// Passes run as their own tasks, so a trigger arriving mid-pass hits
    /// the pass flag and is ignored.
    pub fn spawn_worker(self: &Arc<Self>, monitor: Arc<NetworkMonitor>) -> WorkerHandle {
        let on_online = Arc::downgrade(self);
        monitor.on_transition(Direction::Online, move || {
            if let Some(coordinator) = on_online.upgrade() {
                coordinator.trigger();
            }
        });

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move {
            if let Err(err) = coordinator.recover() {
                error!(error = %err, "queue recovery failed");
            }
            if monitor.is_online() {
                start_pass(&coordinator, "startup");
            }

            let mut ticker = coordinator.config().auto_sync_interval.map(|period| {
                let mut ticker =
                    tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                ticker
            });

            loop {
                tokio::select! {
                    _ = coordinator.wake_signal().notified() => {
                        if monitor.is_online() {
                            start_pass(&coordinator, "trigger");
                        } else {
                            debug!("offline; trigger ignored");
                        }
                    }
                    _ = tick(&mut ticker) => {
                        if monitor.is_online() {
                            start_pass(&coordinator, "interval");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("sync worker stopped");
        });

        WorkerHandle { shutdown, task }
    }
}

fn start_pass(coordinator: &Arc<SyncCoordinator>, source: &'static str) {
    let coordinator = Arc::clone(coordinator);
    tokio::spawn(async move {
        debug!(source, "starting drain pass");
        // Errors are already logged and recorded in the stats.
        let _ = coordinator.sync().await;
    });
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
