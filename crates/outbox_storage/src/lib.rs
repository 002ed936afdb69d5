//! # Outbox Storage
//!
//! Append-only byte stores underneath the outbox queue logs.
//!
//! Backends are **opaque**: they know nothing about queue entries, record
//! framing or checksums. The record log in `outbox_core` owns all of that.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - durable storage on the local file system
//! - [`InMemoryBackend`] - ephemeral storage with fault injection for tests
//!
//! ## Example
//!
//! ```rust
//! use outbox_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append_synced(b"queued").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"queued");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::{FaultSwitch, InMemoryBackend};
