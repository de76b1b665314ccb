//! The generic tree walker.
//!
//! A pass is a [`Visitor`] type. For every node the walker asks the node's
//! delegate for the pass's [`Hooks`] and runs override, enter, the
//! children, then leave, rebuilding the node only when a child changed.

pub mod context;
pub mod visitor;
pub mod walker;

pub use context::ContextVisitor;
pub use visitor::{Descend, Hooks, LeaveFn, LeaveHook, Visitor};
pub use walker::{Outcome, traverse};
