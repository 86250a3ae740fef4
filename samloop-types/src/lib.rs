//! Shared types for samloop
//!
//! This crate provides the identifier types used across the samloop
//! workspace: action and view names, history sequence numbers, cycle
//! identifiers and subscription handles.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Name of an action, the key acceptors are registered under
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionName(pub String);

impl ActionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActionName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ActionName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for ActionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Name of a representation view
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewName(pub String);

impl ViewName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ViewName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ViewName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for ViewName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Sequence number of a recorded version
///
/// Sequence numbers increase monotonically within one history and are
/// never reused, even after a branch is truncated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(pub u64);

impl Sequence {
    /// The sequence number of the initial state
    pub const GENESIS: Sequence = Sequence(0);

    pub fn next(self) -> Sequence {
        Sequence(self.0 + 1)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier of one dispatch cycle within a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CycleId(pub u64);

impl CycleId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle:{}", self.0)
    }
}

/// Subscription identifier
///
/// Returned when subscribing to a view or to errors, used to later
/// unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

static SUBSCRIPTION_COUNTER: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    /// Create a new unique subscription ID
    pub fn new() -> Self {
        Self(SUBSCRIPTION_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_name() {
        let name = ActionName::new("increment");
        assert_eq!(name.as_str(), "increment");
        assert_eq!(format!("{}", name), "increment");
        assert_eq!(ActionName::from("increment"), name);
    }

    #[test]
    fn test_sequence_ordering() {
        let s = Sequence::GENESIS;
        assert_eq!(s.next(), Sequence(1));
        assert!(s < s.next());
        assert_eq!(format!("{}", s.next()), "v1");
    }

    #[test]
    fn test_subscription_id_uniqueness() {
        let s1 = SubscriptionId::new();
        let s2 = SubscriptionId::new();
        assert_ne!(s1, s2);
    }

    #[test]
    fn test_borrowed_lookup() {
        let mut map = std::collections::HashMap::new();
        map.insert(ViewName::new("summary"), 1);
        assert_eq!(map.get("summary"), Some(&1));
    }
}
