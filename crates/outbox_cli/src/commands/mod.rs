//! CLI command implementations.

pub mod compact;
pub mod dead_letters;
pub mod discard;
pub mod list;
pub mod replay;
pub mod status;

use outbox_core::{LogDeadLetterStore, LogQueueStore, OperationId, OutboxDir};
use std::path::Path;

/// Result type shared by the commands.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// A locked outbox directory with both stores replayed.
pub struct OpenOutbox {
    /// Held for the lifetime of the command.
    pub dir: OutboxDir,
    /// Primary queue.
    pub queue: LogQueueStore,
    /// Dead-letter store.
    pub dead_letters: LogDeadLetterStore,
}

/// Opens an existing outbox directory and repairs what a crash left
/// behind. Never creates one.
pub fn open_outbox(path: &Path) -> CommandResult<OpenOutbox> {
    let dir = OutboxDir::open(path, false)?;
    let queue = dir.open_queue()?;
    let dead_letters = dir.open_dead_letters()?;
    outbox_core::recover(&queue, &dead_letters)?;
    Ok(OpenOutbox {
        dir,
        queue,
        dead_letters,
    })
}

/// Parses an operation id given on the command line.
pub fn parse_id(id: &str) -> CommandResult<OperationId> {
    id.parse()
        .map_err(|err| format!("Invalid operation id '{id}': {err}").into())
}

/// Output format of listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable lines.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl Format {
    /// Parses `text` or `json`.
    pub fn parse(format: &str) -> CommandResult<Self> {
        match format {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown format '{other}' (expected text or json)").into()),
        }
    }
}
