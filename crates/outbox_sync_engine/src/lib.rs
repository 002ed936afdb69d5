//! # Outbox Sync Engine
//!
//! Offline-first mutation queue and sync engine.
//!
//! This crate provides:
//! - Network status monitor with edge-triggered transition handlers
//! - Submitter contract and per-entity-type registry
//! - Deterministic conflict resolution
//! - Retry with exponential backoff between passes
//! - Sync coordinator with at-most-one drain pass
//! - Background worker and the [`Outbox`] facade
//!
//! ## Architecture
//!
//! A write is queued durably first and applied remotely later:
//! 1. [`Outbox::write`] puts the operation into the queue store
//! 2. an online transition, manual trigger or timer starts a drain pass
//! 3. the pass submits entries in queue order and routes each outcome to
//!    the queue (done or retry) or the dead-letter store
//!
//! ## Key Invariants
//!
//! - At most one drain pass runs at a time
//! - Entries are submitted in enqueue order; edits of one record never
//!   overtake each other
//! - An entry is attempted at most `max_retries + 1` times
//! - A conflict is never silently overwritten

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod coordinator;
mod error;
mod network;
mod notify;
mod outbox;
mod stats;
mod submit;
mod worker;

pub use config::{MonitorConfig, RetryConfig, SyncConfig};
pub use conflict::{ApplyMode, ConflictResolver, FieldMergeResolver, Resolution};
pub use coordinator::SyncCoordinator;
pub use error::{SyncError, SyncResult};
pub use network::{ConnectivityProbe, Direction, NetworkMonitor};
pub use notify::{NoopNotifier, Notifier, SyncEvent};
pub use outbox::{Outbox, OutboxBuilder};
pub use outbox_core::RecoveryReport;
pub use stats::{PassOutcome, PassReport, SyncState, SyncStats};
pub use submit::{RemoteState, SubmitOutcome, SubmitRequest, Submitter, SubmitterRegistry};
pub use worker::WorkerHandle;
