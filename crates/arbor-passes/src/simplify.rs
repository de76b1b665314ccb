//! Local simplification of statement structure.
//!
//! Flattens nested blocks into their parent, moves the label of a
//! single-statement block onto that statement, drops the label of a longer
//! block that nothing refers to, and removes statements after an unconditional
//! branch. Every rewrite is local and running the pass twice gives the
//! same tree as running it once.

use crate::env::{PassEnv, run_visitor};
use crate::pipeline::SIMPLIFY;
use arbor_core::diagnostics::DiagnosticSink;
use arbor_core::error::{InternalError, Step};
use arbor_core::factory::TreeFactory;
use arbor_core::naming::Word;
use arbor_core::node::{NodeKind, NodeRef, NodeRefExt};
use arbor_core::scheduler::{Job, Pass};
use arbor_core::session::Session;
use arbor_core::traversal::{Descend, Hooks, LeaveHook, Outcome, Visitor, traverse};
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone)]
pub struct Simplifier {
    env: PassEnv,
}

impl Simplifier {
    pub fn new(env: PassEnv) -> Self {
        Self { env }
    }
}

impl Visitor for Simplifier {
    fn sink(&self) -> Option<&dyn DiagnosticSink> {
        Some(self.env.errors())
    }
}

fn local_names(statements: &[NodeRef]) -> impl Iterator<Item = Word> + '_ {
    statements
        .iter()
        .filter(|c| c.kind() == NodeKind::LocalDecl)
        .filter_map(|c| c.name())
}

/// A nested block is flattened unless one of its locals would clash with a
/// local already placed in the outer block or declared after it there.
fn block(_parent: Option<&NodeRef>, node: NodeRef, _v: &Simplifier) -> Step<NodeRef> {
    let mut statements = Vec::with_capacity(node.children().len());
    let mut placed: HashSet<Word> = HashSet::new();
    for (index, child) in node.children().iter().enumerate() {
        if child.kind() != NodeKind::Block {
            placed.extend(local_names(std::slice::from_ref(child)));
            statements.push(child.clone());
            continue;
        }
        let later = &node.children()[index + 1..];
        let clashes = local_names(child.children())
            .any(|name| placed.contains(&name) || local_names(later).any(|l| l == name));
        if clashes {
            statements.push(child.clone());
        } else {
            placed.extend(local_names(child.children()));
            statements.extend(child.children().iter().cloned());
        }
    }
    if let Some(end) = statements.iter().position(|s| s.kind().is_unconditional_branch()) {
        if end + 1 < statements.len() {
            trace!(dropped = statements.len() - end - 1, "unreachable statements removed");
        }
        statements.truncate(end + 1);
    }
    Ok(node.with_children(statements))
}

/// A labeled single-statement block becomes the labeled statement. A longer
/// block loses its label when nothing inside refers to it.
fn labeled(_parent: Option<&NodeRef>, node: NodeRef, _v: &Simplifier) -> Step<NodeRef> {
    let Some(body) = node.child(0).filter(|b| b.kind() == NodeKind::Block).cloned() else {
        return Ok(node);
    };
    if let [single] = body.children() {
        return Ok(node.with_children(vec![single.clone()]));
    }
    let label = node
        .name()
        .ok_or_else(|| InternalError::new("labeled statement without a label"))?;
    if refers_to(&body, label)? {
        Ok(node)
    } else {
        Ok(body)
    }
}

/// Finds `break` and `continue` statements naming a label.
#[derive(Clone)]
struct LabelRefs {
    label: Word,
    found: Rc<Cell<bool>>,
}

impl Visitor for LabelRefs {
    fn override_node(&self, _parent: Option<&NodeRef>, node: &NodeRef) -> Step<Option<NodeRef>> {
        Ok(self.found.get().then(|| node.clone()))
    }

    fn enter(&self, _parent: Option<&NodeRef>, node: &NodeRef) -> Step<Descend<Self>> {
        if matches!(node.kind(), NodeKind::Break | NodeKind::Continue) && node.name() == Some(self.label) {
            self.found.set(true);
        }
        Ok(Descend::default())
    }
}

fn refers_to(tree: &NodeRef, label: Word) -> Step<bool> {
    let refs = LabelRefs {
        label,
        found: Rc::new(Cell::new(false)),
    };
    traverse(tree, &refs)?;
    Ok(refs.found.get())
}

pub(crate) fn register(factory: &mut TreeFactory) {
    factory.register::<dyn Hooks<Simplifier>>(NodeKind::Block, Arc::new(LeaveHook(block)));
    factory.register::<dyn Hooks<Simplifier>>(NodeKind::Labeled, Arc::new(LeaveHook(labeled)));
}

pub struct SimplifyPass;

impl Pass for SimplifyPass {
    fn name(&self) -> &'static str {
        SIMPLIFY
    }

    fn run(&self, job: &Job, session: &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError> {
        run_visitor(SIMPLIFY, job, &Simplifier::new(PassEnv::new(job, session)))
    }
}
