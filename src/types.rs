//! Core identifiers shared across the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The reserved entry pseudo-node. Never executed.
pub const START: &str = "__start__";
/// The reserved terminal pseudo-node.
pub const END: &str = "__end__";

/// Name of a node, fixed edge endpoint, or frontier entry.
///
/// A thin `String` wrapper rather than a bare `String` so call sites read as
/// intentional graph vocabulary and so `__start__`/`__end__` checks live in
/// one place ([`NodeId::is_start`], [`NodeId::is_end`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn start() -> Self {
        Self(START.to_string())
    }

    pub fn end() -> Self {
        Self(END.to_string())
    }

    pub fn is_start(&self) -> bool {
        self.0 == START
    }

    pub fn is_end(&self) -> bool {
        self.0 == END
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The managed key the engine injects into state during node execution and
/// strips before persistence or observation.
pub const REMAINING_STEPS_KEY: &str = "remaining_steps";
