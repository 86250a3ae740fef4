//! YAML scripts of steps to run against a manager.
//!
//! ```yaml
//! steps:
//!   - dispatch: increment
//!   - dispatch: add
//!     payload: 15
//!   - undo
//!   - redo
//!   - goto: 1
//! ```

use anyhow::{Context, Result};
use samloop_core::{ManagerHandle, SamError};
use samloop_types::Sequence;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Dispatch {
        dispatch: String,
        #[serde(default)]
        payload: Value,
    },
    Goto {
        goto: u64,
    },
    Navigate(Navigation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Navigation {
    Undo,
    Redo,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Dispatch { dispatch, payload } if payload.is_null() => {
                write!(f, "dispatch {dispatch}")
            }
            Step::Dispatch { dispatch, payload } => write!(f, "dispatch {dispatch}({payload})"),
            Step::Goto { goto } => write!(f, "goto v{goto}"),
            Step::Navigate(Navigation::Undo) => write!(f, "undo"),
            Step::Navigate(Navigation::Redo) => write!(f, "redo"),
        }
    }
}

/// What happened when a step ran
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The dispatch cycle committed
    Committed,
    /// The history cursor moved
    Moved,
    /// Undo/redo/goto had nothing to do
    Unchanged,
    /// The dispatch was rejected or its cycle aborted
    Failed { error: String },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Committed => write!(f, "ok"),
            Outcome::Moved => write!(f, "moved"),
            Outcome::Unchanged => write!(f, "no-op"),
            Outcome::Failed { error } => write!(f, "error: {error}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub step: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Script {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse script {}", path.display()))
    }

    /// Run every step in order
    ///
    /// A failing step does not stop the script; its error is part of the
    /// report.
    pub fn run(&self, manager: &ManagerHandle) -> Vec<StepReport> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let outcome = run_step(manager, step);
                if let Outcome::Failed { error } = &outcome {
                    tracing::debug!(step = %step, %error, "step failed");
                }
                StepReport {
                    index: i + 1,
                    step: step.to_string(),
                    outcome,
                }
            })
            .collect()
    }
}

fn run_step(manager: &ManagerHandle, step: &Step) -> Outcome {
    let moved = |did_move: bool| {
        if did_move {
            Outcome::Moved
        } else {
            Outcome::Unchanged
        }
    };

    match step {
        Step::Dispatch { dispatch, payload } => {
            match manager.dispatch(dispatch.as_str(), payload.clone()) {
                Ok(()) => Outcome::Committed,
                Err(err) => failed(&err),
            }
        }
        Step::Goto { goto } => moved(manager.goto(Sequence(*goto))),
        Step::Navigate(Navigation::Undo) => moved(manager.undo()),
        Step::Navigate(Navigation::Redo) => moved(manager.redo()),
    }
}

fn failed(err: &SamError) -> Outcome {
    Outcome::Failed {
        error: err.to_string(),
    }
}
