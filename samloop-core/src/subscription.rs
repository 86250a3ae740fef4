//! Subscriber bookkeeping
//!
//! The registry only stores callbacks. The manager collects the callbacks
//! to run while holding its lock and invokes them after releasing it, so a
//! callback may freely call back into the manager.

use crate::error::SamError;
use crate::represent::Representation;
use samloop_types::{SubscriptionId, ViewName};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Callback receiving a view's new representation
pub type ViewCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Callback receiving errors of failed cycles
pub type ErrorCallback = Arc<dyn Fn(&SamError) + Send + Sync>;

/// A callback ready to run, detached from the registry
pub struct Notification {
    pub view: ViewName,
    pub value: Arc<Value>,
    callback: ViewCallback,
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("view", &self.view)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

impl Notification {
    pub fn deliver(&self) {
        tracing::trace!(view = %self.view, "notifying subscriber");
        (self.callback)(&self.value);
    }
}

/// View and error subscriptions of one manager
#[derive(Default)]
pub struct SubscriptionRegistry {
    views: BTreeMap<SubscriptionId, (ViewName, ViewCallback)>,
    errors: BTreeMap<SubscriptionId, ErrorCallback>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one view
    pub fn subscribe_view(&mut self, view: ViewName, callback: ViewCallback) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.views.insert(id, (view, callback));
        id
    }

    /// Subscribe to cycle errors
    pub fn subscribe_errors(&mut self, callback: ErrorCallback) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.errors.insert(id, callback);
        id
    }

    /// Remove a view or error subscription
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.views.remove(&id).is_some() || self.errors.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.views.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty() && self.errors.is_empty()
    }

    /// Notifications for every subscriber of the given views, in
    /// subscription order
    ///
    /// With `changed` set, only subscribers of the listed views are included.
    pub fn notifications(
        &self,
        representation: &Representation,
        changed: Option<&[&ViewName]>,
    ) -> Vec<Notification> {
        self.views
            .values()
            .filter(|(view, _)| changed.map_or(true, |c| c.contains(&view)))
            .filter_map(|(view, callback)| {
                representation.get(view.as_str()).map(|value| Notification {
                    view: view.clone(),
                    value: value.clone(),
                    callback: callback.clone(),
                })
            })
            .collect()
    }

    /// Error callbacks, in subscription order
    pub fn error_callbacks(&self) -> Vec<ErrorCallback> {
        self.errors.values().cloned().collect()
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("views", &self.views.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::represent::RepresentationBuilder;
    use crate::state::State;
    use parking_lot::Mutex;
    use serde_json::json;

    fn representation(count: i64) -> Representation {
        let mut builder = RepresentationBuilder::new();
        builder
            .register("count", |s: &State| json!(s.get_i64("count")))
            .unwrap();
        builder
            .register("label", |_: &State| json!("counter"))
            .unwrap();
        builder.build(&State::from_fields([("count", json!(count))]))
    }

    #[test]
    fn test_notifications_per_view() {
        let mut registry = SubscriptionRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        registry.subscribe_view(
            ViewName::new("count"),
            Arc::new(move |v: &Value| sink.lock().push(v.clone())),
        );

        for n in registry.notifications(&representation(4), None) {
            n.deliver();
        }
        assert_eq!(*seen.lock(), vec![json!(4)]);
    }

    #[test]
    fn test_changed_filter() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe_view(ViewName::new("count"), Arc::new(|_: &Value| {}));
        registry.subscribe_view(ViewName::new("label"), Arc::new(|_: &Value| {}));

        let before = representation(1);
        let after = representation(2);
        let changed = after.changed_since(&before);

        let pending = registry.notifications(&after, Some(&changed));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].view.as_str(), "count");
    }

    #[test]
    fn test_unsubscribe() {
        let mut registry = SubscriptionRegistry::new();
        let view = registry.subscribe_view(ViewName::new("count"), Arc::new(|_: &Value| {}));
        let errors = registry.subscribe_errors(Arc::new(|_: &SamError| {}));
        assert_eq!(registry.len(), 2);

        assert!(registry.unsubscribe(view));
        assert!(registry.unsubscribe(errors));
        assert!(!registry.unsubscribe(view));
        assert!(registry.is_empty());
    }
}
