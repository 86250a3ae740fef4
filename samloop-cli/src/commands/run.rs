//! Run a script and show where the manager ended up.

use crate::script::StepReport;
use anyhow::Result;
use samloop_core::{MetricsSnapshot, VersionSummary};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[derive(Serialize)]
struct RunSummary<'a> {
    steps: &'a [StepReport],
    representation: Value,
    cursor: usize,
    history: &'a [VersionSummary],
    metrics: MetricsSnapshot,
}

pub fn run_script(
    config_path: &Path,
    script_path: &Path,
    reset_threshold: i64,
    json: bool,
) -> Result<()> {
    let (manager, reports) = super::execute(config_path, script_path, reset_threshold)?;
    let history = manager.history_snapshot();

    let summary = RunSummary {
        steps: &reports,
        representation: manager.representation().to_value(),
        cursor: manager.history_cursor(),
        history: &history,
        metrics: manager.metrics(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for report in &reports {
        println!("{:>3}. {} -> {}", report.index, report.step, report.outcome);
    }

    println!("\nRepresentation:");
    for (view, value) in manager.representation().iter() {
        println!("  {} = {}", view, value);
    }

    println!("\nHistory ({} versions):", history.len());
    for version in &history {
        println!(
            "{} {:<5} {}",
            if version.current { "*" } else { " " },
            version.sequence.to_string(),
            version.timestamp.format("%Y-%m-%d %H:%M:%S%.3f")
        );
    }

    println!("\n{}", summary.metrics);
    Ok(())
}
