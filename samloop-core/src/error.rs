//! Error types for the SAM control loop

use samloop_types::{ActionName, ViewName};
use thiserror::Error;

/// Rejection of a payload, raised by schema validation or by an acceptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{}", .path.as_ref().map(|p| format!("at `{p}`: ")).unwrap_or_default(), .message)]
pub struct ValidationError {
    /// Location inside the payload, dotted (`items.0.name`), if known
    pub path: Option<String>,
    /// Human readable reason
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: None,
            message: message.into(),
        }
    }

    pub fn at(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            message: message.into(),
        }
    }

    /// Prefix the path with an outer segment
    pub(crate) fn nested(mut self, segment: &str) -> Self {
        self.path = Some(match self.path.take() {
            Some(inner) => format!("{segment}.{inner}"),
            None => segment.to_string(),
        });
        self
    }
}

/// Top-level error for manager construction and dispatch cycles
#[derive(Debug, Clone, Error)]
pub enum SamError {
    /// No acceptor is registered for the action
    #[error("unknown action `{0}`")]
    UnknownAction(ActionName),

    /// The payload was rejected by its schema or by the acceptor
    #[error("action `{action}` rejected: {source}")]
    Validation {
        action: ActionName,
        #[source]
        source: ValidationError,
    },

    /// Next-action predicates kept firing past the configured bound
    #[error("next-action chain exceeded {bound} steps (last predicate `{predicate}` fired `{action}`)")]
    RunawayPredicate {
        bound: usize,
        predicate: String,
        action: ActionName,
    },

    /// A queued action was dropped because the cycle ahead of it panicked
    #[error("queued action `{0}` was dropped after an interrupted cycle")]
    Interrupted(ActionName),

    /// An action name was registered twice
    #[error("action `{0}` already has an acceptor")]
    DuplicateAction(ActionName),

    /// A view name was registered twice
    #[error("view `{0}` already has a builder")]
    DuplicateView(ViewName),

    /// Subscription or lookup of a view that was never registered
    #[error("unknown view `{0}`")]
    UnknownView(ViewName),

    /// Manager configuration cannot be honored
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// History persistence failed
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Undo or redo at the edge of history
///
/// This is an expected condition. The manager reports it as `false`
/// rather than as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryBoundsError {
    #[error("already at the oldest version")]
    AtOldest,

    #[error("already at the newest version")]
    AtNewest,
}

/// Encoding or decoding of persisted history failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("failed to encode state: {0}")]
    Encode(String),

    #[error("failed to decode state: {0}")]
    Decode(String),

    #[error("persisted history is empty")]
    Empty,

    #[error("sequence {found} does not follow {previous}")]
    OutOfOrder { previous: u64, found: u64 },

    #[error("cursor {cursor} is outside history of length {len}")]
    CursorOutOfRange { cursor: usize, len: usize },
}

/// Result type using SamError
pub type Result<T> = std::result::Result<T, SamError>;
