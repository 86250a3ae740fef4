//! Next-action predicates
//!
//! After every accepted action the engine evaluates each registered
//! predicate against the new state, in registration order. The first
//! predicate that proposes an action wins; that action goes onto the
//! cycle's work queue and evaluation starts over from the first predicate
//! once it has been applied.
//!
//! Chaining is bounded twice:
//! - the number of predicate-triggered actions per cycle is capped, and
//!   exceeding the cap aborts the cycle with [`SamError::RunawayPredicate`]
//! - a state whose fingerprint was already evaluated in the same cycle is
//!   not evaluated again, so a predicate cannot fire repeatedly against an
//!   unchanged state

use crate::action::Action;
use crate::error::{Result, SamError};
use crate::model::AcceptorRegistry;
use crate::state::{Fingerprint, State};
use samloop_types::ActionName;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Default cap on predicate-triggered actions per cycle
pub const DEFAULT_MAX_CHAIN_LENGTH: usize = 1000;

type Rule = dyn Fn(&State) -> Option<Action> + Send + Sync;

/// A named, pure rule proposing the next action for a state
#[derive(Clone)]
pub struct Predicate {
    name: String,
    rule: Arc<Rule>,
}

impl Predicate {
    pub fn new<F>(name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&State) -> Option<Action> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            rule: Arc::new(rule),
        }
    }

    /// Fire `action` whenever `condition` holds
    pub fn when<F>(name: impl Into<String>, condition: F, action: Action) -> Self
    where
        F: Fn(&State) -> bool + Send + Sync + 'static,
    {
        Self::new(name, move |state| condition(state).then(|| action.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, state: &State) -> Option<Action> {
        (self.rule)(state)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

/// What caused an action to run inside a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Dispatched by a caller
    External,
    /// Proposed by the named predicate
    Predicate(String),
}

/// One applied action of a resolved cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub action: ActionName,
    pub trigger: Trigger,
}

/// Outcome of running an action and its predicate chain
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Final state once no predicate fires
    pub state: State,
    /// Every applied action, in order
    pub steps: Vec<Step>,
}

impl Resolution {
    /// Number of predicate-triggered actions
    pub fn chained(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.trigger, Trigger::Predicate(_)))
            .count()
    }
}

/// Evaluates predicates and drains the per-cycle work queue
#[derive(Debug, Clone)]
pub struct NapEngine {
    predicates: Vec<Predicate>,
    max_chain_length: usize,
}

impl Default for NapEngine {
    fn default() -> Self {
        Self::new(Vec::new(), DEFAULT_MAX_CHAIN_LENGTH)
    }
}

impl NapEngine {
    pub fn new(predicates: Vec<Predicate>, max_chain_length: usize) -> Self {
        Self {
            predicates,
            max_chain_length,
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn max_chain_length(&self) -> usize {
        self.max_chain_length
    }

    /// First predicate, in registration order, that proposes an action
    pub fn next_action(&self, state: &State) -> Option<(&Predicate, Action)> {
        self.predicates
            .iter()
            .find_map(|p| p.evaluate(state).map(|action| (p, action)))
    }

    /// Apply `action` to `start` and chain predicate-proposed actions until
    /// the state settles
    ///
    /// `start` is never modified. On error the caller keeps `start` as the
    /// current state.
    pub fn resolve(
        &self,
        acceptors: &AcceptorRegistry,
        start: &State,
        action: Action,
    ) -> Result<Resolution> {
        let mut queue = VecDeque::from([(Trigger::External, action)]);
        let mut evaluated: HashSet<Fingerprint> = HashSet::new();
        let mut working = start.clone();
        let mut steps = Vec::new();
        let mut chained = 0usize;

        while let Some((trigger, action)) = queue.pop_front() {
            working = acceptors.apply(&working, &action)?;
            steps.push(Step {
                action: action.name.clone(),
                trigger,
            });

            if !evaluated.insert(working.fingerprint()) {
                tracing::debug!(action = %action.name, "state already evaluated, chain settled");
                continue;
            }

            if let Some((predicate, next)) = self.next_action(&working) {
                chained += 1;
                if chained > self.max_chain_length {
                    return Err(SamError::RunawayPredicate {
                        bound: self.max_chain_length,
                        predicate: predicate.name().to_string(),
                        action: next.name,
                    });
                }
                tracing::debug!(predicate = predicate.name(), next = %next, "predicate fired");
                queue.push_back((Trigger::Predicate(predicate.name().to_string()), next));
            }
        }

        Ok(Resolution {
            state: working,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Payload, PayloadSchema};
    use crate::error::ValidationError;
    use serde_json::json;

    fn counter_acceptors() -> AcceptorRegistry {
        let mut acceptors = AcceptorRegistry::new();
        acceptors
            .register("increment", |s: &State, _: &Payload| {
                Ok(s.with("count", s.require_i64("count")? + 1))
            })
            .unwrap();
        acceptors
            .register_with_schema("add", PayloadSchema::Integer, |s: &State, p: &Payload| {
                Ok(s.with("count", s.require_i64("count")? + p.as_i64()?))
            })
            .unwrap();
        acceptors
            .register("reset", |s: &State, _: &Payload| Ok(s.with("count", 0)))
            .unwrap();
        acceptors
            .register("noop", |s: &State, _: &Payload| {
                Ok::<State, ValidationError>(s.clone())
            })
            .unwrap();
        acceptors
    }

    fn counter(n: i64) -> State {
        State::from_fields([("count", json!(n))])
    }

    fn auto_reset() -> Predicate {
        Predicate::when(
            "auto-reset-at-10",
            |s| s.get_i64("count").unwrap_or(0) >= 10,
            Action::new("reset"),
        )
    }

    #[test]
    fn test_no_predicates() {
        let engine = NapEngine::default();
        let res = engine
            .resolve(&counter_acceptors(), &counter(0), Action::new("increment"))
            .unwrap();
        assert_eq!(res.state.get_i64("count"), Some(1));
        assert_eq!(res.chained(), 0);
    }

    #[test]
    fn test_auto_reset_chain() {
        let engine = NapEngine::new(vec![auto_reset()], DEFAULT_MAX_CHAIN_LENGTH);
        let res = engine
            .resolve(
                &counter_acceptors(),
                &counter(0),
                Action::with_payload("add", json!(15)),
            )
            .unwrap();

        assert_eq!(res.state.get_i64("count"), Some(0));
        assert_eq!(res.chained(), 1);
        assert_eq!(
            res.steps[1],
            Step {
                action: ActionName::new("reset"),
                trigger: Trigger::Predicate("auto-reset-at-10".into()),
            }
        );
    }

    #[test]
    fn test_first_predicate_wins_and_restarts() {
        // "climb" keeps incrementing below 3; "cap" would reset but comes second
        let climb = Predicate::when(
            "climb",
            |s| s.get_i64("count").unwrap_or(0) < 3,
            Action::new("increment"),
        );
        let engine = NapEngine::new(vec![climb, auto_reset()], 10);
        let res = engine
            .resolve(&counter_acceptors(), &counter(0), Action::new("increment"))
            .unwrap();
        assert_eq!(res.state.get_i64("count"), Some(3));
        assert_eq!(res.chained(), 2);
    }

    #[test]
    fn test_runaway_chain_is_bounded() {
        let forever = Predicate::when("forever", |_| true, Action::new("increment"));
        let engine = NapEngine::new(vec![forever], 5);
        let start = counter(0);
        let err = engine
            .resolve(&counter_acceptors(), &start, Action::new("increment"))
            .unwrap_err();

        match err {
            SamError::RunawayPredicate { bound, predicate, action } => {
                assert_eq!(bound, 5);
                assert_eq!(predicate, "forever");
                assert_eq!(action.as_str(), "increment");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(start.get_i64("count"), Some(0));
    }

    #[test]
    fn test_unchanged_state_settles() {
        let spin = Predicate::when("spin", |_| true, Action::new("noop"));
        let engine = NapEngine::new(vec![spin], 100);
        let res = engine
            .resolve(&counter_acceptors(), &counter(0), Action::new("increment"))
            .unwrap();
        assert_eq!(res.state.get_i64("count"), Some(1));
        assert_eq!(res.chained(), 1);
    }

    #[test]
    fn test_chained_unknown_action_fails() {
        let bogus = Predicate::when("bogus", |_| true, Action::new("explode"));
        let engine = NapEngine::new(vec![bogus], 10);
        let err = engine
            .resolve(&counter_acceptors(), &counter(0), Action::new("increment"))
            .unwrap_err();
        assert!(matches!(err, SamError::UnknownAction(name) if name.as_str() == "explode"));
    }
}
