//! Built-in counter model.

use samloop_core::{
    Action, ManagerBuilder, ManagerConfig, ManagerHandle, Payload, PayloadSchema, Predicate,
    Result, State, ValidationError,
};
use serde_json::json;

pub const DEFAULT_RESET_THRESHOLD: i64 = 10;

/// Counter with `increment`, `add` and `reset`, resetting itself once the
/// count reaches `reset_threshold`
pub fn counter(reset_threshold: i64, config: ManagerConfig) -> Result<ManagerHandle> {
    ManagerBuilder::new(State::from_fields([("count", json!(0))]))
        .acceptor_with_schema("increment", PayloadSchema::Empty, |s: &State, _: &Payload| {
            bump(s, 1)
        })
        .acceptor_with_schema("add", PayloadSchema::Integer, |s: &State, p: &Payload| {
            bump(s, p.as_i64()?)
        })
        .acceptor_with_schema("reset", PayloadSchema::Empty, |s: &State, _: &Payload| {
            Ok(s.with("count", 0))
        })
        .predicate(Predicate::when(
            format!("auto-reset-at-{reset_threshold}"),
            move |s| s.get_i64("count").is_some_and(|n| n >= reset_threshold),
            Action::new("reset"),
        ))
        .view("count", |s: &State| json!(s.get_i64("count")))
        .view("summary", |s: &State| {
            json!(format!("count is {}", s.get_i64("count").unwrap_or_default()))
        })
        .config(config)
        .build()
}

fn bump(s: &State, by: i64) -> std::result::Result<State, ValidationError> {
    let count = s
        .require_i64("count")?
        .checked_add(by)
        .ok_or_else(|| ValidationError::at("count", "overflow"))?;
    Ok(s.with("count", count))
}
