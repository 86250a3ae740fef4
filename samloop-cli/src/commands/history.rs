//! Export the history produced by a script as JSON lines.

use anyhow::{Context, Result};
use samloop_core::JsonCodec;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;

#[derive(Serialize)]
struct HistoryLine {
    sequence: u64,
    timestamp: String,
    current: bool,
    state: Value,
}

pub fn export_history(
    config_path: &Path,
    script_path: &Path,
    reset_threshold: i64,
    out: Option<&Path>,
) -> Result<()> {
    let (manager, _) = super::execute(config_path, script_path, reset_threshold)?;
    let persisted = manager
        .export_history(&JsonCodec)
        .context("Failed to export history")?;

    let mut buffer = Vec::new();
    for (index, entry) in persisted.entries.iter().enumerate() {
        let line = HistoryLine {
            sequence: entry.sequence.as_u64(),
            timestamp: entry.timestamp.to_rfc3339(),
            current: index == persisted.cursor,
            state: serde_json::from_slice(&entry.bytes)
                .with_context(|| format!("Version {} is not valid JSON", entry.sequence))?,
        };
        serde_json::to_writer(&mut buffer, &line)?;
        buffer.push(b'\n');
    }

    match out {
        Some(path) => {
            std::fs::write(path, &buffer)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(
                path = %path.display(),
                versions = persisted.entries.len(),
                "history exported"
            );
        }
        None => std::io::stdout().write_all(&buffer)?,
    }
    Ok(())
}
