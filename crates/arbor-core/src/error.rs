//! Error types for the Arbor core.
//!
//! Hooks fail in one of three disjoint ways, unified by [`Halt`]:
//! a user-facing [`SemanticError`] that the walker reports and recovers
//! from, an [`InternalError`] that aborts the pass, or a
//! [`Dependency`] that is not ready yet and makes the pass defer.

use crate::node::NodeKind;
use crate::position::Position;
use crate::scheduler::Dependency;
use thiserror::Error;

/// Result type for operations that can only fail internally.
pub type Result<T> = std::result::Result<T, InternalError>;

/// Result type of hooks.
pub type Step<T> = std::result::Result<T, Halt>;

/// A problem in the analyzed program, reported as a diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct SemanticError {
    pub message: String,
    pub position: Option<Position>,
}

impl SemanticError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }

    pub fn at(message: impl Into<String>, position: &Position) -> Self {
        Self {
            message: message.into(),
            position: Some(position.clone()),
        }
    }
}

/// A broken framework invariant. Never shown as a user diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct InternalError {
    pub message: String,
    pub position: Option<Position>,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }

    /// Attaches `position` unless a more specific one is already known.
    pub fn or_at(mut self, position: &Position) -> Self {
        if self.position.is_none() && position.is_known() {
            self.position = Some(position.clone());
        }
        self
    }
}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.position {
            Some(position) => write!(f, "internal error at {position}: {}", self.message),
            None => write!(f, "internal error: {}", self.message),
        }
    }
}

/// Tree construction rejected by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("{kind} expects {expected} children, found {found}")]
    Arity {
        kind: NodeKind,
        expected: &'static str,
        found: usize,
    },

    #[error("{kind}: child {index} must be {expected}, found {found}")]
    ChildKind {
        kind: NodeKind,
        index: usize,
        expected: &'static str,
        found: NodeKind,
    },

    #[error("{kind} requires attribute `{attr}`")]
    MissingAttr { kind: NodeKind, attr: &'static str },
}

impl From<FactoryError> for InternalError {
    fn from(err: FactoryError) -> Self {
        InternalError::new(format!("tree factory rejected a rewrite: {err}"))
    }
}

/// Why a hook stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Halt {
    Error(SemanticError),
    Defer(Dependency),
    Fatal(InternalError),
}

impl From<SemanticError> for Halt {
    fn from(err: SemanticError) -> Self {
        Halt::Error(err)
    }
}

impl From<InternalError> for Halt {
    fn from(err: InternalError) -> Self {
        Halt::Fatal(err)
    }
}

impl From<FactoryError> for Halt {
    fn from(err: FactoryError) -> Self {
        Halt::Fatal(err.into())
    }
}

impl From<Dependency> for Halt {
    fn from(dep: Dependency) -> Self {
        Halt::Defer(dep)
    }
}
