//! Acceptors and the registry that binds them to action names
//!
//! An acceptor is a pure function from the current state and a payload to
//! the next state. Acceptors must not perform I/O; a payload they cannot
//! handle is reported as a [`ValidationError`].

use crate::action::{Action, Payload, PayloadSchema};
use crate::error::{Result, SamError, ValidationError};
use crate::state::State;
use samloop_types::ActionName;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Pure mutation bound to one action name
pub trait Acceptor: Send + Sync {
    /// Produce the next state from the current one
    fn accept(&self, state: &State, payload: &Payload) -> std::result::Result<State, ValidationError>;
}

impl<F> Acceptor for F
where
    F: Fn(&State, &Payload) -> std::result::Result<State, ValidationError> + Send + Sync,
{
    fn accept(&self, state: &State, payload: &Payload) -> std::result::Result<State, ValidationError> {
        self(state, payload)
    }
}

/// A registered acceptor with its payload schema
#[derive(Clone)]
struct Registration {
    schema: PayloadSchema,
    acceptor: Arc<dyn Acceptor>,
}

/// Maps each action name to exactly one acceptor
#[derive(Clone, Default)]
pub struct AcceptorRegistry {
    acceptors: HashMap<ActionName, Registration>,
}

impl AcceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an acceptor function that takes any payload
    pub fn register<F>(&mut self, name: impl Into<ActionName>, acceptor: F) -> Result<()>
    where
        F: Fn(&State, &Payload) -> std::result::Result<State, ValidationError>
            + Send
            + Sync
            + 'static,
    {
        self.register_acceptor(name, PayloadSchema::Any, acceptor)
    }

    /// Register an acceptor function whose payloads are checked against `schema`
    pub fn register_with_schema<F>(
        &mut self,
        name: impl Into<ActionName>,
        schema: PayloadSchema,
        acceptor: F,
    ) -> Result<()>
    where
        F: Fn(&State, &Payload) -> std::result::Result<State, ValidationError>
            + Send
            + Sync
            + 'static,
    {
        self.register_acceptor(name, schema, acceptor)
    }

    /// Register any [`Acceptor`] implementation
    pub fn register_acceptor<A>(
        &mut self,
        name: impl Into<ActionName>,
        schema: PayloadSchema,
        acceptor: A,
    ) -> Result<()>
    where
        A: Acceptor + 'static,
    {
        let name = name.into();
        if self.acceptors.contains_key(&name) {
            return Err(SamError::DuplicateAction(name));
        }
        self.acceptors.insert(
            name,
            Registration {
                schema,
                acceptor: Arc::new(acceptor),
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.acceptors.contains_key(name)
    }

    /// Registered action names, sorted
    pub fn names(&self) -> Vec<&ActionName> {
        let mut names: Vec<_> = self.acceptors.keys().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.acceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acceptors.is_empty()
    }

    /// Validate the payload and run the acceptor for `action`
    pub fn apply(&self, state: &State, action: &Action) -> Result<State> {
        let registration = self
            .acceptors
            .get(&action.name)
            .ok_or_else(|| SamError::UnknownAction(action.name.clone()))?;

        let rejected = |source| SamError::Validation {
            action: action.name.clone(),
            source,
        };

        registration.schema.validate(&action.payload).map_err(rejected)?;
        let next = registration
            .acceptor
            .accept(state, &action.payload)
            .map_err(rejected)?;

        tracing::debug!(action = %action.name, "accepted");
        Ok(next)
    }
}

impl fmt::Debug for AcceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcceptorRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
