//! Dispatch queue
//!
//! Dispatch is non-reentrant. The first caller to arrive while no cycle is
//! running becomes the drainer: it runs its own action, then every action
//! queued behind it, in arrival order. Anyone dispatching while a drain is
//! in progress only enqueues.
//!
//! A caller on another thread gets a [`Completion`] and blocks on it until
//! the drainer has run its action, so it still sees its own cycle's result.
//! A dispatch from the drainer's own thread (a subscriber callback) cannot
//! wait for itself and returns as soon as it is queued.

use crate::action::Action;
use crate::error::{Result, SamError};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Slot a waiting caller receives its cycle's result through
#[derive(Debug, Default)]
pub struct Completion {
    slot: Mutex<Option<Result<()>>>,
    ready: Condvar,
}

impl Completion {
    pub fn complete(&self, result: Result<()>) {
        *self.slot.lock() = Some(result);
        self.ready.notify_all();
    }

    /// Block until the drainer has run the action
    pub fn wait(&self) -> Result<()> {
        let mut slot = self.slot.lock();
        loop {
            if let Some(result) = slot.take() {
                return result;
            }
            self.ready.wait(&mut slot);
        }
    }
}

/// A queued action and, for callers on other threads, where its result goes
///
/// A pending action dropped before it was finished fails its waiter with
/// [`SamError::Interrupted`].
#[derive(Debug)]
pub struct Pending {
    pub action: Action,
    completion: Option<Arc<Completion>>,
}

impl Pending {
    /// Whether a caller is blocked on this action's result
    pub fn has_waiter(&self) -> bool {
        self.completion.is_some()
    }

    pub fn finish(&mut self, result: Result<()>) {
        if let Some(completion) = self.completion.take() {
            completion.complete(result);
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            let action = self.action.name.clone();
            tracing::warn!(%action, "queued action dropped after interrupted cycle");
            completion.complete(Err(SamError::Interrupted(action)));
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Pending>,
    drainer: Option<ThreadId>,
}

/// FIFO of actions waiting for the running cycle to finish
#[derive(Debug, Default)]
pub struct DispatchQueue {
    state: Mutex<QueueState>,
}

/// Result of offering an action to the queue
#[derive(Debug)]
pub enum Admission<'a> {
    /// No cycle was running; the caller must run `action` and then drain
    Drain(DrainGuard<'a>, Action),
    /// Queued from the drainer's own thread; the result goes to error
    /// subscribers only
    Queued,
    /// Queued from another thread; wait on the completion for the result
    Waiting(Arc<Completion>),
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an action, becoming the drainer if nobody else is
    pub fn admit(&self, action: Action) -> Admission<'_> {
        let current = thread::current().id();
        let mut state = self.state.lock();
        match state.drainer {
            None => {
                state.drainer = Some(current);
                Admission::Drain(
                    DrainGuard {
                        queue: self,
                        finished: false,
                    },
                    action,
                )
            }
            Some(drainer) if drainer == current => {
                state.pending.push_back(Pending {
                    action,
                    completion: None,
                });
                Admission::Queued
            }
            Some(_) => {
                let completion = Arc::new(Completion::default());
                state.pending.push_back(Pending {
                    action,
                    completion: Some(completion.clone()),
                });
                Admission::Waiting(completion)
            }
        }
    }

    /// Actions waiting behind the running cycle
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_draining(&self) -> bool {
        self.state.lock().drainer.is_some()
    }
}

/// Proof of being the single drainer
///
/// Dropping the guard before the queue is empty (when a cycle panics)
/// releases the drainer role and fails every queued action, so no caller
/// stays blocked on a completion nobody will fill.
#[derive(Debug)]
pub struct DrainGuard<'a> {
    queue: &'a DispatchQueue,
    finished: bool,
}

impl DrainGuard<'_> {
    /// Next queued action, or `None` once the queue is empty
    ///
    /// Returning `None` releases the drainer role atomically with the
    /// emptiness check, so no action can be stranded in the queue.
    pub fn next(&mut self) -> Option<Pending> {
        if self.finished {
            return None;
        }
        let mut state = self.queue.state.lock();
        match state.pending.pop_front() {
            Some(pending) => Some(pending),
            None => {
                state.drainer = None;
                self.finished = true;
                None
            }
        }
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let abandoned: Vec<Pending> = {
            let mut state = self.queue.state.lock();
            state.drainer = None;
            state.pending.drain(..).collect()
        };
        // waiters are failed outside the queue lock
        drop(abandoned);
    }
}
