use super::visitor::{Descend, Hooks, Visitor};
use crate::diagnostics::Diagnostic;
use crate::error::{Halt, InternalError, Step};
use crate::node::{NodeRef, NodeRefExt};
use crate::scheduler::Dependency;
use std::sync::Arc;
use tracing::{debug, trace};

/// Result of one pass over a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Complete(T),
    /// Some nodes could not be finished. `partial` is well formed: every
    /// deferred node is left as it was before the pass.
    Deferred {
        partial: T,
        missing: Vec<Dependency>,
    },
}

impl<T> Outcome<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete(_))
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Complete(value) | Outcome::Deferred { partial: value, .. } => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Outcome::Complete(value) | Outcome::Deferred { partial: value, .. } => value,
        }
    }

    pub fn missing(&self) -> &[Dependency] {
        match self {
            Outcome::Complete(_) => &[],
            Outcome::Deferred { missing, .. } => missing,
        }
    }
}

/// Runs `visitor` over the tree rooted at `root`.
///
/// Semantic errors are reported and recovered from; deferrals leave the
/// node untouched and are collected into [`Outcome::Deferred`]; an
/// internal error aborts the traversal.
pub fn traverse<V: Visitor>(root: &NodeRef, visitor: &V) -> Result<Outcome<NodeRef>, InternalError> {
    let mut walk = Walk::default();
    let tree = walk.visit_edge(None, root, visitor)?;
    trace!(visited = walk.visited, "traversal finished");
    Ok(if walk.missing.is_empty() {
        Outcome::Complete(tree)
    } else {
        Outcome::Deferred {
            partial: tree,
            missing: walk.missing,
        }
    })
}

pub(crate) fn hooks_for<V: Visitor>(node: &NodeRef) -> Option<&Arc<dyn Hooks<V>>> {
    node.delegate().hooks::<dyn Hooks<V>>()
}

pub fn dispatch_override<V: Visitor>(
    v: &V,
    parent: Option<&NodeRef>,
    node: &NodeRef,
) -> Step<Option<NodeRef>> {
    match hooks_for::<V>(node) {
        Some(hooks) => hooks.override_node(parent, node, v),
        None => Ok(None),
    }
}

pub fn dispatch_enter<V: Visitor>(
    v: &V,
    parent: Option<&NodeRef>,
    node: &NodeRef,
) -> Step<Descend<V>> {
    match hooks_for::<V>(node) {
        Some(hooks) => hooks.enter(parent, node, v),
        None => Ok(Descend::default()),
    }
}

pub fn dispatch_leave<V: Visitor>(
    v: &V,
    parent: Option<&NodeRef>,
    old: &NodeRef,
    node: NodeRef,
    inner: &V,
) -> Step<NodeRef> {
    match hooks_for::<V>(old) {
        Some(hooks) => hooks.leave(parent, old, node, v, inner),
        None => Ok(node),
    }
}

#[derive(Default)]
struct Walk {
    missing: Vec<Dependency>,
    visited: usize,
}

impl Walk {
    fn visit_edge<V: Visitor>(
        &mut self,
        parent: Option<&NodeRef>,
        node: &NodeRef,
        v: &V,
    ) -> Result<NodeRef, InternalError> {
        self.visited += 1;

        match v.override_node(parent, node) {
            Ok(Some(result)) => {
                trace!(kind = %node.kind(), "override");
                return Ok(result);
            }
            Ok(None) => {}
            Err(halt) => return self.contain(halt, node, node.clone(), v),
        }

        let Descend {
            node: entered,
            visitor,
        } = match v.enter(parent, node) {
            Ok(descend) => descend,
            Err(halt) => return self.contain(halt, node, node.clone(), v),
        };
        trace!(kind = %node.kind(), "enter");

        let current = entered.unwrap_or_else(|| node.clone());
        let inner = visitor.unwrap_or_else(|| v.clone());
        let rebuilt = self.visit_children(&current, &inner)?;

        trace!(kind = %node.kind(), "leave");
        match v.leave(parent, node, rebuilt.clone(), &inner) {
            Ok(result) => Ok(result),
            Err(halt) => self.contain(halt, node, rebuilt, v),
        }
    }

    fn visit_children<V: Visitor>(&mut self, node: &NodeRef, v: &V) -> Result<NodeRef, InternalError> {
        if node.children().is_empty() {
            return Ok(node.clone());
        }
        let mut changed = false;
        let mut children = Vec::with_capacity(node.children().len());
        for child in node.children() {
            let next = self.visit_edge(Some(node), child, v)?;
            changed |= !Arc::ptr_eq(&next, child);
            children.push(next);
        }
        Ok(if changed {
            node.with_children(children)
        } else {
            node.clone()
        })
    }

    fn contain<V: Visitor>(
        &mut self,
        halt: Halt,
        old: &NodeRef,
        partial: NodeRef,
        v: &V,
    ) -> Result<NodeRef, InternalError> {
        match halt {
            Halt::Error(err) => {
                let Some(sink) = v.sink() else {
                    return Err(InternalError::new(format!(
                        "semantic error without a diagnostic sink: {}",
                        err.message
                    ))
                    .or_at(old.position()));
                };
                let position = err
                    .position
                    .or_else(|| Some(old.position().clone()).filter(|p| p.is_known()));
                debug!(kind = %old.kind(), error = %err.message, "recovered from semantic error");
                sink.report(Diagnostic::error(err.message, position));
                Ok(v.recover(old, partial))
            }
            Halt::Defer(dependency) => {
                debug!(kind = %old.kind(), %dependency, "deferred");
                if !self.missing.contains(&dependency) {
                    self.missing.push(dependency);
                }
                Ok(old.clone())
            }
            Halt::Fatal(err) => Err(err.or_at(old.position())),
        }
    }
}
