use super::visitor::{Descend, Visitor};
use super::walker;
use crate::error::Step;
use crate::node::NodeRef;
use std::rc::Rc;

/// A visitor that threads an immutable context down the tree.
///
/// Each context change produces a new visitor holding the new context and
/// a link to the visitor it was derived from, so the enclosing context is
/// always recoverable with [`pop`](ContextVisitor::pop). Siblings start
/// from their parent's visitor and never observe each other's contexts.
///
/// Implementors route [`Visitor::enter`] to [`descend`](ContextVisitor::descend).
pub trait ContextVisitor: Visitor {
    type Context: Clone;

    fn context(&self) -> &Self::Context;

    fn outer(&self) -> Option<&Rc<Self>>;

    /// A copy of this visitor carrying `context`, linked back to `self`.
    fn push(&self, context: Self::Context) -> Self;

    /// The context in effect for `node` and its subtree, or `None` to keep
    /// the current one.
    fn transition(&self, parent: Option<&NodeRef>, node: &NodeRef) -> Step<Option<Self::Context>>;

    fn pop(&self) -> Option<Self> {
        self.outer().map(|outer| (**outer).clone())
    }

    /// Number of visitors on the chain above this one.
    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.outer();
        while let Some(outer) = cursor {
            depth += 1;
            cursor = outer.outer();
        }
        depth
    }

    /// Runs the kind's enter hook, then applies the context transition to
    /// whatever visitor and node it produced.
    fn descend(&self, parent: Option<&NodeRef>, node: &NodeRef) -> Step<Descend<Self>> {
        let hooked = walker::dispatch_enter(self, parent, node)?;
        let current = hooked.node.clone().unwrap_or_else(|| node.clone());
        let base = hooked.visitor.as_ref().unwrap_or(self);
        let visitor = match base.transition(parent, &current)? {
            Some(context) => Some(base.push(context)),
            None => hooked.visitor.clone(),
        };
        Ok(Descend {
            node: hooked.node,
            visitor,
        })
    }
}
