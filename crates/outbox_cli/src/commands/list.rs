//! List command implementation.

use super::{open_outbox, CommandResult, Format};
use outbox_core::{Operation, QueueStore};
use std::path::Path;

/// Runs the list command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> CommandResult<()> {
    let format = Format::parse(format)?;
    let outbox = open_outbox(path)?;
    let pending = outbox.queue.get_all()?;
    let total = pending.len();
    let shown: Vec<Operation> = pending.into_iter().take(limit.unwrap_or(usize::MAX)).collect();

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
        Format::Text => {
            if shown.is_empty() {
                println!("Queue is empty");
                return Ok(());
            }
            for op in &shown {
                println!("{}", describe(op));
            }
            if shown.len() < total {
                println!("... {} more", total - shown.len());
            }
        }
    }
    Ok(())
}

fn describe(op: &Operation) -> String {
    let mut line = format!(
        "{} {:<6} {} [{}] {} v{} retries={}",
        op.id,
        op.kind,
        op.entity_type,
        op.record_key(),
        op.status,
        op.local_version,
        op.retry_count
    );
    if let Some(next) = op.next_attempt_at {
        line.push_str(&format!(" next={}", next.to_rfc3339()));
    }
    if let Some(error) = &op.last_error {
        line.push_str(&format!(" error={error:?}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_core::OperationDraft;
    use serde_json::json;

    #[test]
    fn description_includes_retry_state() {
        let mut op = Operation::from_draft(
            OperationDraft::update("medication", json!({ "id": "m1", "dose": 5 }), 3),
            chrono::Utc::now(),
        )
        .unwrap();
        op.last_error = Some("503".into());

        let line = describe(&op);
        assert!(line.contains("medication"));
        assert!(line.contains("v3"));
        assert!(line.contains("error=\"503\""));
    }
}
