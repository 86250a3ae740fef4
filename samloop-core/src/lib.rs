//! samloop - State-Action-Model control loop
//!
//! This crate implements the SAM pattern: one authoritative state, mutated
//! only by acceptors bound to named actions, with read-only representations
//! recomputed after every mutation and next-action predicates that can
//! chain further actions without outside input. Every completed cycle is
//! recorded in a snapshot history that supports undo and redo.
//!
//! # Architecture
//!
//! ```text
//! dispatch(action, payload)
//!        │
//!        ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ DispatchQueue│──▶│  Acceptors   │──▶│    NapEngine     │──┐
//! │ (FIFO, 1 run)│   │ (schema+fn)  │◀──│ (bounded chain)  │  │
//! └──────────────┘   └──────────────┘   └──────────────────┘  │
//!                                                              ▼
//! ┌──────────────┐   ┌──────────────────┐   ┌───────────────────────┐
//! │ Subscribers  │◀──│  VersionHistory  │◀──│ RepresentationBuilder │
//! │ (no locks)   │   │ (snapshots+cursor)│   │  (views from state)   │
//! └──────────────┘   └──────────────────┘   └───────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use samloop_core::{
//!     Action, ManagerBuilder, Payload, PayloadSchema, Predicate, State, ValidationError,
//! };
//! use serde_json::json;
//!
//! let manager = ManagerBuilder::new(State::from_fields([("count", json!(0))]))
//!     .acceptor_with_schema("add", PayloadSchema::Integer, |s: &State, p: &Payload| {
//!         let count = s.require_i64("count")?.checked_add(p.as_i64()?);
//!         Ok(s.with("count", count.ok_or_else(|| ValidationError::at("count", "overflow"))?))
//!     })
//!     .acceptor("reset", |s: &State, _: &Payload| Ok(s.with("count", 0)))
//!     .predicate(Predicate::when(
//!         "auto-reset-at-10",
//!         |s| s.get_i64("count").unwrap_or(0) >= 10,
//!         Action::new("reset"),
//!     ))
//!     .view("count", |s: &State| json!(s.get_i64("count")))
//!     .build()
//!     .unwrap();
//!
//! manager.dispatch("add", json!(4)).unwrap();
//! assert_eq!(manager.state().get_i64("count"), Some(4));
//!
//! manager.dispatch("add", json!(15)).unwrap();
//! assert_eq!(manager.state().get_i64("count"), Some(0));
//!
//! assert!(manager.undo());
//! assert_eq!(manager.state().get_i64("count"), Some(4));
//! ```

#![warn(missing_debug_implementations)]

pub mod action;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod nap;
pub mod represent;
pub mod state;
pub mod subscription;

pub use action::{Action, Payload, PayloadSchema};
pub use codec::{JsonCodec, PersistedEntry, PersistedHistory, StateCodec};
pub use config::{ConfigError, ManagerConfig};
pub use error::{CodecError, HistoryBoundsError, Result, SamError, ValidationError};
pub use history::{VersionEntry, VersionHistory, VersionSummary};
pub use manager::{create_manager, create_manager_with_config, ManagerBuilder, ManagerHandle, Phase};
pub use metrics::{CycleMetrics, MetricsSnapshot};
pub use model::{Acceptor, AcceptorRegistry};
pub use nap::{NapEngine, Predicate, Resolution, Step, Trigger, DEFAULT_MAX_CHAIN_LENGTH};
pub use represent::{Representation, RepresentationBuilder};
pub use samloop_types::{ActionName, CycleId, Sequence, SubscriptionId, ViewName};
pub use state::{Fingerprint, State};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, Payload, PayloadSchema};
    pub use crate::error::{SamError, ValidationError};
    pub use crate::manager::{ManagerBuilder, ManagerHandle};
    pub use crate::nap::Predicate;
    pub use crate::state::State;
}
