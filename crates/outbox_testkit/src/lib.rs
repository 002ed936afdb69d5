//! # Outbox Testkit
//!
//! Test utilities for the outbox sync engine.
//!
//! This crate provides:
//! - Store fixtures, in memory and in temporary directories
//! - Property-based test generators using proptest
//! - A scripted submitter that records every call
//! - A notifier that records every event
//!
//! ## Usage
//!
//! ```rust,ignore
//! use outbox_testkit::prelude::*;
//!
//! let submitter = ScriptedSubmitter::always(Step::Apply);
//! let fixture = MemoryFixture::new();
//! let coordinator = fixture.coordinator(SyncConfig::new(), registry_for("incident", submitter.clone()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod notifier;
pub mod submitter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::notifier::*;
    pub use crate::submitter::*;
}

pub use fixtures::*;
pub use generators::*;
pub use notifier::*;
pub use submitter::*;
