//! CLI command implementations.

pub mod history;
pub mod run;

pub use history::export_history;
pub use run::run_script;

use crate::model;
use crate::script::{Script, StepReport};
use anyhow::{Context, Result};
use samloop_core::{ManagerConfig, ManagerHandle};
use std::path::Path;

/// Load the manager configuration, falling back to defaults when the file
/// does not exist
fn load_config(config_path: &Path) -> Result<ManagerConfig> {
    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "no config file, using defaults");
        return Ok(ManagerConfig::default());
    }
    ManagerConfig::from_file(config_path).context("Failed to load configuration")
}

/// Build the counter model and run `script_path` against it
fn execute(
    config_path: &Path,
    script_path: &Path,
    reset_threshold: i64,
) -> Result<(ManagerHandle, Vec<StepReport>)> {
    let config = load_config(config_path)?;
    let script = Script::from_file(script_path)?;
    let manager =
        model::counter(reset_threshold, config).context("Failed to build counter model")?;

    tracing::info!(steps = script.steps.len(), "running script");
    let reports = script.run(&manager);
    Ok((manager, reports))
}
