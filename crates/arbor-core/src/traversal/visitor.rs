use super::walker;
use crate::diagnostics::DiagnosticSink;
use crate::error::Step;
use crate::node::NodeRef;

/// What an enter hook hands to the walker for the node's subtree.
#[derive(Debug, Clone)]
pub struct Descend<V> {
    /// Replacement for the node being entered; its children are visited.
    pub node: Option<NodeRef>,
    /// Visitor for the children; the current one when `None`.
    pub visitor: Option<V>,
}

impl<V> Default for Descend<V> {
    fn default() -> Self {
        Self {
            node: None,
            visitor: None,
        }
    }
}

impl<V> Descend<V> {
    pub fn with_visitor(visitor: V) -> Self {
        Self {
            node: None,
            visitor: Some(visitor),
        }
    }

    pub fn replacing(node: NodeRef) -> Self {
        Self {
            node: Some(node),
            visitor: None,
        }
    }
}

/// Behavior a node kind supplies for the pass whose visitor is `V`.
///
/// Registered in the kind's delegate as `dyn Hooks<V>`. Every method has
/// the default engine behavior, so implementations override only what
/// they need.
pub trait Hooks<V>: Send + Sync {
    /// Returning `Some` ends the visit of `node`: the value is its result
    /// and the children are not visited.
    fn override_node(
        &self,
        _parent: Option<&NodeRef>,
        _node: &NodeRef,
        _v: &V,
    ) -> Step<Option<NodeRef>> {
        Ok(None)
    }

    fn enter(&self, _parent: Option<&NodeRef>, _node: &NodeRef, _v: &V) -> Step<Descend<V>> {
        Ok(Descend::default())
    }

    /// `old` is the node before the visit; `node` has the visited children.
    /// `v` is the visitor that entered the node, `inner` the one its
    /// children saw.
    fn leave(
        &self,
        _parent: Option<&NodeRef>,
        _old: &NodeRef,
        node: NodeRef,
        _v: &V,
        _inner: &V,
    ) -> Step<NodeRef> {
        Ok(node)
    }
}

/// A traversal participant: one per pass.
///
/// Visitors are cheap to clone and never mutated once built; a visitor
/// that needs different state for a subtree returns a derived copy from
/// `enter`. The default methods dispatch to the node's delegate.
pub trait Visitor: Clone + 'static {
    /// Destination of contained semantic errors. Without a sink such an
    /// error aborts the traversal as an internal error.
    fn sink(&self) -> Option<&dyn DiagnosticSink> {
        None
    }

    fn override_node(&self, parent: Option<&NodeRef>, node: &NodeRef) -> Step<Option<NodeRef>> {
        walker::dispatch_override(self, parent, node)
    }

    fn enter(&self, parent: Option<&NodeRef>, node: &NodeRef) -> Step<Descend<Self>> {
        walker::dispatch_enter(self, parent, node)
    }

    fn leave(
        &self,
        parent: Option<&NodeRef>,
        old: &NodeRef,
        node: NodeRef,
        inner: &Self,
    ) -> Step<NodeRef> {
        walker::dispatch_leave(self, parent, old, node, inner)
    }

    /// Placeholder for a node whose hook reported a semantic error.
    /// `node` is the node as rebuilt so far.
    fn recover(&self, _old: &NodeRef, node: NodeRef) -> NodeRef {
        node
    }
}

/// Signature of a leave-only hook: `(parent, node, v)`.
pub type LeaveFn<V> = fn(Option<&NodeRef>, NodeRef, &V) -> Step<NodeRef>;

/// Adapts a plain function into [`Hooks`] that only act on leave.
pub struct LeaveHook<V: 'static>(pub LeaveFn<V>);

impl<V: 'static> Hooks<V> for LeaveHook<V> {
    fn leave(
        &self,
        parent: Option<&NodeRef>,
        _old: &NodeRef,
        node: NodeRef,
        v: &V,
        _inner: &V,
    ) -> Step<NodeRef> {
        (self.0)(parent, node, v)
    }
}
