//! Core of the Arbor semantic-analysis engine.
//!
//! The crate provides the immutable syntax tree ([`node`]), the per-kind
//! hook tables attached to every node ([`delegate`]), the generic
//! override/enter/leave walker ([`traversal`]) and the cooperative
//! [`scheduler`] that retries passes which deferred on a dependency owned
//! by another compilation unit.
//!
//! Language-specific behavior lives elsewhere: a language registers hooks
//! for its node kinds in a [`factory::TreeFactory`] and expresses every
//! pass as a visitor type.

pub mod delegate;
pub mod diagnostics;
pub mod error;
pub mod factory;
pub mod imports;
pub mod naming;
pub mod node;
pub mod position;
pub mod scheduler;
pub mod session;
pub mod symbols;
pub mod traversal;
pub mod types;

pub use naming::{Word, intern, resolve};

/// Re-exports for pass authors.
pub mod prelude {
    pub use crate::delegate::Delegate;
    pub use crate::diagnostics::{Diagnostic, DiagnosticSink, ErrorQueue, Severity};
    pub use crate::error::{Halt, InternalError, SemanticError, Step};
    pub use crate::factory::TreeFactory;
    pub use crate::imports::ImportTable;
    pub use crate::naming::{Word, intern, resolve};
    pub use crate::node::{Attrs, Flags, Literal, Node, NodeKind, NodeRef, NodeRefExt, Operator};
    pub use crate::position::Position;
    pub use crate::scheduler::{Dependency, Goal, Job, JobId, Pass};
    pub use crate::session::Session;
    pub use crate::traversal::{
        ContextVisitor, Descend, Hooks, LeaveHook, Outcome, Visitor, traverse,
    };
    pub use crate::types::{ConstValue, Constant, Type, VarInstance};
}
