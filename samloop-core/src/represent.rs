//! Representation builders
//!
//! A representation is a read-only view derived from the final state of
//! a cycle. Builders are registered per view name and every view is
//! recomputed in full from state alone; nothing is patched incrementally.

use crate::error::{Result, SamError};
use crate::state::State;
use samloop_types::ViewName;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type BuildFn = dyn Fn(&State) -> Value + Send + Sync;

/// Registered view builders
#[derive(Clone, Default)]
pub struct RepresentationBuilder {
    views: BTreeMap<ViewName, Arc<BuildFn>>,
}

impl RepresentationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder for `view`
    pub fn register<F>(&mut self, view: impl Into<ViewName>, build: F) -> Result<()>
    where
        F: Fn(&State) -> Value + Send + Sync + 'static,
    {
        let view = view.into();
        if self.views.contains_key(&view) {
            return Err(SamError::DuplicateView(view));
        }
        self.views.insert(view, Arc::new(build));
        Ok(())
    }

    pub fn contains(&self, view: &str) -> bool {
        self.views.contains_key(view)
    }

    pub fn view_names(&self) -> impl Iterator<Item = &ViewName> {
        self.views.keys()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Compute every view from `state`
    pub fn build(&self, state: &State) -> Representation {
        let views = self
            .views
            .iter()
            .map(|(name, build)| (name.clone(), Arc::new(build(state))))
            .collect();
        Representation { views }
    }
}

impl fmt::Debug for RepresentationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepresentationBuilder")
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The computed views for one state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Representation {
    views: BTreeMap<ViewName, Arc<Value>>,
}

impl Representation {
    pub fn get(&self, view: &str) -> Option<&Arc<Value>> {
        self.views.get(view)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ViewName, &Arc<Value>)> {
        self.views.iter()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Views whose value differs from `previous`
    pub fn changed_since<'a>(&'a self, previous: &Representation) -> Vec<&'a ViewName> {
        self.views
            .iter()
            .filter(|(name, value)| previous.views.get(*name) != Some(*value))
            .map(|(name, _)| name)
            .collect()
    }

    /// All views as one JSON object keyed by view name
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.views
                .iter()
                .map(|(k, v)| (k.to_string(), (**v).clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder() -> RepresentationBuilder {
        let mut builder = RepresentationBuilder::new();
        builder
            .register("count", |s: &State| json!(s.get_i64("count")))
            .unwrap();
        builder
            .register("parity", |s: &State| {
                let even = s.get_i64("count").unwrap_or(0) % 2 == 0;
                json!(if even { "even" } else { "odd" })
            })
            .unwrap();
        builder
    }

    #[test]
    fn test_build_all_views() {
        let state = State::from_fields([("count", json!(3))]);
        let rep = builder().build(&state);

        assert_eq!(rep.len(), 2);
        assert_eq!(**rep.get("count").unwrap(), json!(3));
        assert_eq!(**rep.get("parity").unwrap(), json!("odd"));
        assert_eq!(rep.to_value(), json!({"count": 3, "parity": "odd"}));
    }

    #[test]
    fn test_duplicate_view_rejected() {
        let mut b = builder();
        let err = b.register("count", |_: &State| Value::Null).unwrap_err();
        assert!(matches!(err, SamError::DuplicateView(_)));
    }

    #[test]
    fn test_changed_since() {
        let b = builder();
        let r1 = b.build(&State::from_fields([("count", json!(1))]));
        let r3 = b.build(&State::from_fields([("count", json!(3))]));

        let changed: Vec<_> = r3.changed_since(&r1).into_iter().map(|v| v.as_str()).collect();
        assert_eq!(changed, vec!["count"]);
        assert!(r1.changed_since(&r1.clone()).is_empty());
    }

    #[test]
    fn test_same_state_same_representation() {
        let b = builder();
        let state = State::from_fields([("count", json!(8))]);
        assert_eq!(b.build(&state), b.build(&state.clone()));
    }
}
