//! The SAM manager
//!
//! Orchestrates one cycle per dispatched action:
//!
//! ```text
//! Idle → Dispatching → Resolving (acceptor + NAP chain) → Representing → Notifying → Idle
//! ```
//!
//! A cycle is all-or-nothing. The working state only becomes current, and
//! a version is only recorded, once the acceptor and the whole predicate
//! chain succeeded and the representation was rebuilt. Any failure leaves
//! state, representation and history exactly as they were before the
//! cycle and is reported to the caller and to error subscribers.
//!
//! Subscribers are notified after the cycle has been committed and with no
//! internal lock held.

use crate::action::{Action, Payload, PayloadSchema};
use crate::codec::{PersistedHistory, StateCodec};
use crate::config::ManagerConfig;
use crate::dispatch::{Admission, DispatchQueue};
use crate::error::{HistoryBoundsError, Result, SamError, ValidationError};
use crate::history::{VersionHistory, VersionSummary};
use crate::metrics::{CycleMetrics, MetricsSnapshot};
use crate::model::AcceptorRegistry;
use crate::nap::{NapEngine, Predicate};
use crate::represent::{Representation, RepresentationBuilder};
use crate::state::State;
use crate::subscription::{Notification, SubscriptionRegistry};
use parking_lot::Mutex;
use samloop_types::{ActionName, CycleId, Sequence, SubscriptionId, ViewName};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Where the manager is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Dispatching,
    Resolving,
    Representing,
    Notifying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Dispatching => write!(f, "dispatching"),
            Phase::Resolving => write!(f, "resolving"),
            Phase::Representing => write!(f, "representing"),
            Phase::Notifying => write!(f, "notifying"),
        }
    }
}

/// Holds the phase of the running cycle and resets it to `Idle` on drop,
/// including when an acceptor, predicate or view panics
struct PhaseGuard<'a> {
    phase: &'a Mutex<Phase>,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a Mutex<Phase>) -> Self {
        *phase.lock() = Phase::Dispatching;
        Self { phase }
    }

    fn set(&self, phase: Phase) {
        *self.phase.lock() = phase;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock() = Phase::Idle;
    }
}

fn deliver(notifications: &[Notification]) {
    for notification in notifications {
        notification.deliver();
    }
}

/// Mutable part of the manager, guarded by one lock
struct Core {
    history: VersionHistory,
    representation: Representation,
}

struct Shared {
    acceptors: AcceptorRegistry,
    nap: NapEngine,
    views: RepresentationBuilder,
    config: ManagerConfig,
    core: Mutex<Core>,
    subscriptions: Mutex<SubscriptionRegistry>,
    queue: DispatchQueue,
    phase: Mutex<Phase>,
    next_cycle: AtomicU64,
    metrics: CycleMetrics,
}

/// Handle to one manager instance
///
/// Cloning the handle shares the manager. Every operation goes through a
/// handle; there is no global instance.
#[derive(Clone)]
pub struct ManagerHandle {
    shared: Arc<Shared>,
}

/// Build a manager from already populated registries
pub fn create_manager(
    initial_state: State,
    acceptors: AcceptorRegistry,
    predicates: Vec<Predicate>,
    views: RepresentationBuilder,
) -> Result<ManagerHandle> {
    create_manager_with_config(
        initial_state,
        acceptors,
        predicates,
        views,
        ManagerConfig::default(),
    )
}

/// Like [`create_manager`], with explicit configuration
pub fn create_manager_with_config(
    initial_state: State,
    acceptors: AcceptorRegistry,
    predicates: Vec<Predicate>,
    views: RepresentationBuilder,
    config: ManagerConfig,
) -> Result<ManagerHandle> {
    config
        .validate()
        .map_err(|e| SamError::InvalidConfig(e.to_string()))?;
    let history = VersionHistory::with_limit(initial_state, config.history_limit);
    Ok(ManagerHandle::assemble(
        acceptors, predicates, views, config, history,
    ))
}

impl ManagerHandle {
    fn assemble(
        acceptors: AcceptorRegistry,
        predicates: Vec<Predicate>,
        views: RepresentationBuilder,
        config: ManagerConfig,
        history: VersionHistory,
    ) -> Self {
        let representation = views.build(history.current_state());
        let nap = NapEngine::new(predicates, config.max_chain_length);
        tracing::debug!(
            actions = acceptors.len(),
            predicates = nap.predicates().len(),
            views = views.len(),
            "manager created"
        );
        Self {
            shared: Arc::new(Shared {
                acceptors,
                nap,
                views,
                config,
                core: Mutex::new(Core {
                    history,
                    representation,
                }),
                subscriptions: Mutex::new(SubscriptionRegistry::new()),
                queue: DispatchQueue::new(),
                phase: Mutex::new(Phase::Idle),
                next_cycle: AtomicU64::new(1),
                metrics: CycleMetrics::new(),
            }),
        }
    }

    /// Dispatch an action by name
    ///
    /// Returns the result of the action's own cycle. When another thread
    /// is running a cycle the call blocks until the action has had its
    /// turn. A dispatch from inside a subscriber callback cannot wait for
    /// the cycle that is calling it: it is queued, returns `Ok(())` at once,
    /// and its outcome is reported to error subscribers.
    pub fn dispatch(&self, name: impl Into<ActionName>, payload: impl Into<Payload>) -> Result<()> {
        self.dispatch_action(Action::with_payload(name, payload))
    }

    /// Dispatch a prepared action
    pub fn dispatch_action(&self, action: Action) -> Result<()> {
        let shared = &self.shared;
        if !shared.acceptors.contains(action.name.as_str()) {
            shared.metrics.record_rejected();
            tracing::warn!(action = %action.name, "rejected unknown action");
            return Err(SamError::UnknownAction(action.name));
        }

        match shared.queue.admit(action) {
            Admission::Queued => {
                shared.metrics.record_queued();
                tracing::debug!(pending = shared.queue.pending(), "dispatched from a callback, action queued");
                Ok(())
            }
            Admission::Waiting(completion) => {
                shared.metrics.record_queued();
                tracing::debug!(pending = shared.queue.pending(), "cycle in progress, waiting for turn");
                completion.wait()
            }
            Admission::Drain(mut guard, action) => {
                let result = self.run_cycle(action);
                while let Some(mut pending) = guard.next() {
                    let result = self.run_cycle(pending.action.clone());
                    pending.finish(result);
                }
                result
            }
        }
    }

    fn run_cycle(&self, action: Action) -> Result<()> {
        let shared = &self.shared;
        let cycle = CycleId::new(shared.next_cycle.fetch_add(1, Ordering::Relaxed));
        let span = tracing::info_span!("cycle", id = cycle.0, action = %action.name);
        let _enter = span.enter();
        let started = Instant::now();

        let phase = PhaseGuard::enter(&shared.phase);
        let committed = {
            let mut core = shared.core.lock();
            let start = core.history.current_state().clone();

            phase.set(Phase::Resolving);
            match shared.nap.resolve(&shared.acceptors, &start, action) {
                Err(err) => Err(err),
                Ok(resolution) => {
                    phase.set(Phase::Representing);
                    let chained = resolution.chained();
                    let representation = shared.views.build(&resolution.state);
                    let sequence = core.history.record(resolution.state);
                    let previous = std::mem::replace(&mut core.representation, representation);
                    let notifications = self.pending_notifications(&core.representation, &previous);
                    Ok((sequence, chained, notifications))
                }
            }
        };

        match committed {
            Err(err) => {
                drop(phase);
                shared.metrics.record_aborted(started.elapsed());
                tracing::warn!(error = %err, "cycle aborted, state unchanged");
                self.report_error(&err);
                Err(err)
            }
            Ok((sequence, chained, notifications)) => {
                tracing::debug!(%sequence, chained, "cycle committed");
                phase.set(Phase::Notifying);
                deliver(&notifications);
                drop(phase);
                shared.metrics.record_completed(chained, started.elapsed());
                Ok(())
            }
        }
    }

    fn pending_notifications(
        &self,
        current: &Representation,
        previous: &Representation,
    ) -> Vec<Notification> {
        let subscriptions = self.shared.subscriptions.lock();
        if self.shared.config.notify_unchanged {
            subscriptions.notifications(current, None)
        } else {
            let changed = current.changed_since(previous);
            subscriptions.notifications(current, Some(&changed))
        }
    }

    fn report_error(&self, err: &SamError) {
        let callbacks = self.shared.subscriptions.lock().error_callbacks();
        for callback in callbacks {
            callback(err);
        }
    }

    /// Step back one version; false at the oldest version
    pub fn undo(&self) -> bool {
        self.navigate("undo", |history| history.undo().map(State::clone))
    }

    /// Step forward one version; false at the newest version
    pub fn redo(&self) -> bool {
        self.navigate("redo", |history| history.redo().map(State::clone))
    }

    /// Jump to the version with `sequence`; false if it is not in history
    pub fn goto(&self, sequence: Sequence) -> bool {
        self.navigate("goto", |history| {
            let target = history.goto(sequence).cloned();
            // a missing sequence is reported the same way as a history edge
            target.ok_or(HistoryBoundsError::AtNewest)
        })
    }

    /// Substitute the state from history without running acceptors or
    /// predicates, then rebuild the representation and notify
    ///
    /// Navigation is not a cycle and leaves the phase alone.
    fn navigate<F>(&self, op: &'static str, step: F) -> bool
    where
        F: FnOnce(&mut VersionHistory) -> std::result::Result<State, HistoryBoundsError>,
    {
        let notifications = {
            let mut core = self.shared.core.lock();
            let state = match step(&mut core.history) {
                Ok(state) => state,
                Err(bound) => {
                    tracing::debug!(op, %bound, "history navigation is a no-op");
                    return false;
                }
            };
            let representation = self.shared.views.build(&state);
            let previous = std::mem::replace(&mut core.representation, representation);
            tracing::debug!(op, sequence = %core.history.current().sequence, "moved history cursor");
            self.pending_notifications(&core.representation, &previous)
        };

        deliver(&notifications);
        self.shared.metrics.record_navigation();
        true
    }

    /// Subscribe to a view's representation
    pub fn subscribe<F>(&self, view: impl Into<ViewName>, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let view = view.into();
        if !self.shared.views.contains(view.as_str()) {
            return Err(SamError::UnknownView(view));
        }
        Ok(self
            .shared
            .subscriptions
            .lock()
            .subscribe_view(view, Arc::new(callback)))
    }

    /// Subscribe to errors of failed cycles
    pub fn on_error<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SamError) + Send + Sync + 'static,
    {
        self.shared
            .subscriptions
            .lock()
            .subscribe_errors(Arc::new(callback))
    }

    /// Remove a view or error subscription
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.subscriptions.lock().unsubscribe(id)
    }

    /// The current state
    pub fn state(&self) -> State {
        self.shared.core.lock().history.current_state().clone()
    }

    /// The current representation of every view
    pub fn representation(&self) -> Representation {
        self.shared.core.lock().representation.clone()
    }

    /// The current value of one view
    pub fn view(&self, view: &str) -> Option<Arc<Value>> {
        self.shared.core.lock().representation.get(view).cloned()
    }

    /// Sequence numbers and timestamps of every recorded version
    pub fn history_snapshot(&self) -> Vec<VersionSummary> {
        self.shared.core.lock().history.summaries()
    }

    /// Index of the current version within the history snapshot
    pub fn history_cursor(&self) -> usize {
        self.shared.core.lock().history.cursor()
    }

    /// Sequence number of the current version
    pub fn current_sequence(&self) -> Sequence {
        self.shared.core.lock().history.current().sequence
    }

    pub fn can_undo(&self) -> bool {
        self.shared.core.lock().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.shared.core.lock().history.can_redo()
    }

    /// Serialize the history with a host-supplied codec
    pub fn export_history<C: StateCodec + ?Sized>(&self, codec: &C) -> Result<PersistedHistory> {
        Ok(self.shared.core.lock().history.export(codec)?)
    }

    pub fn phase(&self) -> Phase {
        *self.shared.phase.lock()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// Registered action names, sorted
    pub fn actions(&self) -> Vec<&ActionName> {
        self.shared.acceptors.names()
    }
}

impl fmt::Debug for ManagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerHandle")
            .field("acceptors", &self.shared.acceptors)
            .field("predicates", &self.shared.nap.predicates())
            .field("views", &self.shared.views)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Fluent construction of a manager
///
/// Registration errors are collected and the first one is returned from
/// [`ManagerBuilder::build`].
pub struct ManagerBuilder {
    initial: State,
    acceptors: AcceptorRegistry,
    predicates: Vec<Predicate>,
    views: RepresentationBuilder,
    config: ManagerConfig,
    restore: Option<(PersistedHistory, Box<dyn StateCodec>)>,
    error: Option<SamError>,
}

impl ManagerBuilder {
    pub fn new(initial: State) -> Self {
        Self {
            initial,
            acceptors: AcceptorRegistry::new(),
            predicates: Vec::new(),
            views: RepresentationBuilder::new(),
            config: ManagerConfig::default(),
            restore: None,
            error: None,
        }
    }

    fn keep_first_error(&mut self, result: Result<()>) {
        if let Err(err) = result {
            self.error.get_or_insert(err);
        }
    }

    /// Register an acceptor that takes any payload
    pub fn acceptor<F>(mut self, name: impl Into<ActionName>, acceptor: F) -> Self
    where
        F: Fn(&State, &Payload) -> std::result::Result<State, ValidationError>
            + Send
            + Sync
            + 'static,
    {
        let result = self.acceptors.register(name, acceptor);
        self.keep_first_error(result);
        self
    }

    /// Register an acceptor with a payload schema
    pub fn acceptor_with_schema<F>(
        mut self,
        name: impl Into<ActionName>,
        schema: PayloadSchema,
        acceptor: F,
    ) -> Self
    where
        F: Fn(&State, &Payload) -> std::result::Result<State, ValidationError>
            + Send
            + Sync
            + 'static,
    {
        let result = self.acceptors.register_with_schema(name, schema, acceptor);
        self.keep_first_error(result);
        self
    }

    /// Append a next-action predicate; earlier predicates take priority
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Register a representation view
    pub fn view<F>(mut self, name: impl Into<ViewName>, build: F) -> Self
    where
        F: Fn(&State) -> Value + Send + Sync + 'static,
    {
        let result = self.views.register(name, build);
        self.keep_first_error(result);
        self
    }

    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from a persisted history instead of the initial state
    pub fn restore_history<C>(mut self, persisted: PersistedHistory, codec: C) -> Self
    where
        C: StateCodec + 'static,
    {
        self.restore = Some((persisted, Box::new(codec)));
        self
    }

    /// Build the manager
    ///
    /// Without a restored history the initial state becomes version 0.
    pub fn build(self) -> Result<ManagerHandle> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.config
            .validate()
            .map_err(|e| SamError::InvalidConfig(e.to_string()))?;

        let history = match self.restore {
            Some((persisted, codec)) => {
                VersionHistory::restore(&persisted, codec.as_ref(), self.config.history_limit)?
            }
            None => VersionHistory::with_limit(self.initial, self.config.history_limit),
        };

        Ok(ManagerHandle::assemble(
            self.acceptors,
            self.predicates,
            self.views,
            self.config,
            history,
        ))
    }
}

impl fmt::Debug for ManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerBuilder")
            .field("acceptors", &self.acceptors)
            .field("predicates", &self.predicates)
            .field("views", &self.views)
            .field("config", &self.config)
            .field("restoring", &self.restore.is_some())
            .finish_non_exhaustive()
    }
}
