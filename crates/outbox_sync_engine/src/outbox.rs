//! One-stop entry point for applications.

use crate::config::SyncConfig;
use crate::conflict::ConflictResolver;
use crate::coordinator::SyncCoordinator;
use crate::error::SyncResult;
use crate::network::NetworkMonitor;
use crate::notify::Notifier;
use crate::stats::{PassOutcome, SyncStats};
use crate::submit::SubmitterRegistry;
use crate::worker::WorkerHandle;
use outbox_core::{DeadLetterEntry, Operation, OperationDraft, OperationId, OutboxDir};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// An opened outbox: locked directory, stores, monitor and coordinator.
///
/// # Example
///
/// ```rust,ignore
/// let mut outbox = Outbox::builder("data/outbox", registry).open()?;
/// outbox.start();
/// outbox.monitor().set_online(true);
/// outbox.write(OperationDraft::create("incident", payload))?;
/// ```
pub struct Outbox {
    dir: OutboxDir,
    monitor: Arc<NetworkMonitor>,
    coordinator: Arc<SyncCoordinator>,
    worker: Option<WorkerHandle>,
}

impl Outbox {
    /// Opens an outbox with default settings.
    pub fn open(
        path: impl AsRef<Path>,
        config: SyncConfig,
        submitters: SubmitterRegistry,
    ) -> SyncResult<Self> {
        Self::builder(path, submitters).with_config(config).open()
    }

    /// Starts configuring an outbox.
    pub fn builder(path: impl AsRef<Path>, submitters: SubmitterRegistry) -> OutboxBuilder {
        OutboxBuilder {
            path: path.as_ref().to_path_buf(),
            submitters,
            config: SyncConfig::default(),
            resolver: None,
            notifier: None,
            monitor: None,
        }
    }

    /// Queues a write. If online, also asks the worker for a pass.
    ///
    /// Durable once this returns.
    pub fn write(&self, draft: OperationDraft) -> SyncResult<Operation> {
        let op = self.coordinator.enqueue(draft)?;
        if self.monitor.is_online() {
            self.coordinator.trigger();
        }
        Ok(op)
    }

    /// Starts the background worker. Needs a tokio runtime.
    pub fn start(&mut self) {
        if self.worker.is_none() {
            self.worker = Some(self.coordinator.spawn_worker(Arc::clone(&self.monitor)));
        }
    }

    /// Stops the background worker, if running.
    pub async fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown().await;
        }
    }

    /// Runs one drain pass now.
    pub async fn sync(&self) -> SyncResult<PassOutcome> {
        self.coordinator.sync().await
    }

    /// Queued operations, oldest first.
    pub fn pending(&self) -> SyncResult<Vec<Operation>> {
        self.coordinator.pending()
    }

    /// Dead letters, oldest first.
    pub fn dead_letters(&self) -> SyncResult<Vec<DeadLetterEntry>> {
        self.coordinator.dead_lettered()
    }

    /// Puts a dead letter back into the queue.
    pub fn replay_dead_letter(&self, id: OperationId) -> SyncResult<Operation> {
        let op = self.coordinator.replay_dead_letter(id)?;
        if self.monitor.is_online() {
            self.coordinator.trigger();
        }
        Ok(op)
    }

    /// Deletes a dead letter.
    pub fn discard_dead_letter(&self, id: OperationId) -> SyncResult<DeadLetterEntry> {
        self.coordinator.discard_dead_letter(id)
    }

    /// Running totals.
    pub fn stats(&self) -> SyncStats {
        self.coordinator.stats()
    }

    /// The network monitor.
    pub fn monitor(&self) -> &Arc<NetworkMonitor> {
        &self.monitor
    }

    /// The coordinator.
    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// Root of the outbox directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("path", &self.dir.path())
            .field("online", &self.monitor.is_online())
            .field("worker", &self.worker.is_some())
            .finish()
    }
}

/// Builder for [`Outbox`].
pub struct OutboxBuilder {
    path: PathBuf,
    submitters: SubmitterRegistry,
    config: SyncConfig,
    resolver: Option<Arc<dyn ConflictResolver>>,
    notifier: Option<Arc<dyn Notifier>>,
    monitor: Option<Arc<NetworkMonitor>>,
}

impl OutboxBuilder {
    /// Sets the sync configuration.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the default field-merge resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Installs a notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Shares an existing monitor. By default the outbox starts offline.
    pub fn with_monitor(mut self, monitor: Arc<NetworkMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Locks the directory, replays both logs and repairs the queue.
    pub fn open(self) -> SyncResult<Outbox> {
        let dir = OutboxDir::open(&self.path, true)?;
        let queue = Arc::new(dir.open_queue()?);
        let dead_letters = Arc::new(dir.open_dead_letters()?);

        let mut coordinator =
            SyncCoordinator::new(self.config, queue, dead_letters, self.submitters)?;
        if let Some(resolver) = self.resolver {
            coordinator = coordinator.with_resolver(resolver);
        }
        if let Some(notifier) = self.notifier {
            coordinator = coordinator.with_notifier(notifier);
        }
        let coordinator = Arc::new(coordinator);
        coordinator.recover()?;

        info!(
            path = %dir.path().display(),
            pending = coordinator.queue().len(),
            dead_letters = coordinator.dead_letters().len(),
            "opened outbox"
        );

        Ok(Outbox {
            dir,
            monitor: self.monitor.unwrap_or_default(),
            coordinator,
            worker: None,
        })
    }
}
