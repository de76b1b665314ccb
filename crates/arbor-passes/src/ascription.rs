//! Expected-type propagation and narrowing ascription.
//!
//! [`AscriptionVisitor`] threads the type each expression position
//! expects: a declaration's initializer expects the declared type, a
//! simple assignment's right-hand side the target's type, and so on. The
//! parent kind decides through its [`ExpectedTypeHooks`]. What happens at
//! each expression is up to the [`Ascriber`]: [`NarrowingAscriber`]
//! inserts casts, [`LoggingAscriber`] only records what it saw.

use crate::env::{PassEnv, run_visitor};
use crate::pipeline::{ASCRIBE, EXPECTED_TYPES};
use arbor_core::diagnostics::DiagnosticSink;
use arbor_core::error::{InternalError, Step};
use arbor_core::factory::TreeFactory;
use arbor_core::node::{Attrs, NodeKind, NodeRef, Operator};
use arbor_core::position::Position;
use arbor_core::scheduler::{Job, Pass};
use arbor_core::session::Session;
use arbor_core::traversal::{ContextVisitor, Descend, Outcome, Visitor, walker};
use arbor_core::types::{Constant, Type};
use serde::Serialize;
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

/// Context of the expected-type visitor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expected {
    /// Type the current expression position expects.
    pub ty: Option<Type>,
    /// Return type of the enclosing method.
    pub returns: Option<Type>,
}

/// How a node kind constrains the types of its children.
pub trait ExpectedTypeHooks: Send + Sync {
    /// `None` falls back to the child's own type.
    fn child_expected_type(&self, parent: &NodeRef, child: &NodeRef, enclosing: &Expected) -> Option<Type>;
}

struct DeclExpected;

impl ExpectedTypeHooks for DeclExpected {
    fn child_expected_type(&self, parent: &NodeRef, child: &NodeRef, _enclosing: &Expected) -> Option<Type> {
        if parent.index_of(child) != Some(1) {
            return None;
        }
        parent.var().and_then(|var| var.ty()).cloned()
    }
}

struct AssignExpected;

impl ExpectedTypeHooks for AssignExpected {
    fn child_expected_type(&self, parent: &NodeRef, child: &NodeRef, _enclosing: &Expected) -> Option<Type> {
        if parent.op() != Some(Operator::Assign) || parent.index_of(child) != Some(1) {
            return None;
        }
        parent.child(0).and_then(|lhs| lhs.ty()).cloned()
    }
}

struct ArrayInitExpected;

impl ExpectedTypeHooks for ArrayInitExpected {
    fn child_expected_type(&self, parent: &NodeRef, _child: &NodeRef, _enclosing: &Expected) -> Option<Type> {
        parent.ty().and_then(Type::element).cloned()
    }
}

struct ReturnExpected;

impl ExpectedTypeHooks for ReturnExpected {
    fn child_expected_type(&self, _parent: &NodeRef, _child: &NodeRef, enclosing: &Expected) -> Option<Type> {
        enclosing.returns.clone()
    }
}

struct ConditionExpected;

impl ExpectedTypeHooks for ConditionExpected {
    fn child_expected_type(&self, parent: &NodeRef, child: &NodeRef, _enclosing: &Expected) -> Option<Type> {
        (parent.index_of(child) == Some(0)).then_some(Type::Boolean)
    }
}

/// Where an expression sits.
pub struct Site<'a> {
    pub parent: Option<&'a NodeRef>,
    /// The expression before this visit.
    pub old: &'a NodeRef,
    pub expected: &'a Expected,
}

impl Site<'_> {
    /// Index of the expression among its parent's children.
    pub fn slot(&self) -> Option<usize> {
        self.parent.and_then(|p| p.index_of(self.old))
    }

    fn parent_kind(&self) -> Option<NodeKind> {
        self.parent.map(|p| p.kind())
    }
}

/// Per-expression action of an [`AscriptionVisitor`].
pub trait Ascriber: Clone + 'static {
    fn ascribe(&self, site: &Site<'_>, expr: NodeRef, env: &PassEnv) -> Step<NodeRef>;
}

#[derive(Clone)]
pub struct AscriptionVisitor<A> {
    env: PassEnv,
    ascriber: A,
    expected: Expected,
    outer: Option<Rc<AscriptionVisitor<A>>>,
}

impl<A: Ascriber> AscriptionVisitor<A> {
    pub fn new(env: PassEnv, ascriber: A) -> Self {
        Self {
            env,
            ascriber,
            expected: Expected::default(),
            outer: None,
        }
    }

    pub fn expected(&self) -> &Expected {
        &self.expected
    }
}

impl<A: Ascriber> Visitor for AscriptionVisitor<A> {
    fn sink(&self) -> Option<&dyn DiagnosticSink> {
        Some(self.env.errors())
    }

    fn enter(&self, parent: Option<&NodeRef>, node: &NodeRef) -> Step<Descend<Self>> {
        self.descend(parent, node)
    }

    fn leave(&self, parent: Option<&NodeRef>, old: &NodeRef, node: NodeRef, inner: &Self) -> Step<NodeRef> {
        let node = walker::dispatch_leave(self, parent, old, node, inner)?;
        if !old.kind().is_expr() {
            return Ok(node);
        }
        let site = Site {
            parent,
            old,
            expected: &inner.expected,
        };
        self.ascriber.ascribe(&site, node, &self.env)
    }
}

impl<A: Ascriber> ContextVisitor for AscriptionVisitor<A> {
    type Context = Expected;

    fn context(&self) -> &Expected {
        &self.expected
    }

    fn outer(&self) -> Option<&Rc<Self>> {
        self.outer.as_ref()
    }

    fn push(&self, context: Expected) -> Self {
        Self {
            env: self.env.clone(),
            ascriber: self.ascriber.clone(),
            expected: context,
            outer: Some(Rc::new(self.clone())),
        }
    }

    fn transition(&self, parent: Option<&NodeRef>, node: &NodeRef) -> Step<Option<Expected>> {
        if node.kind() == NodeKind::MethodDecl {
            return Ok(Some(Expected {
                ty: None,
                returns: node.child(0).and_then(|t| t.ty()).cloned(),
            }));
        }
        if !node.kind().is_expr() {
            return Ok(None);
        }
        let from_parent = parent.and_then(|p| {
            p.delegate()
                .hooks::<dyn ExpectedTypeHooks>()
                .and_then(|hooks| hooks.child_expected_type(p, node, &self.expected))
        });
        Ok(Some(Expected {
            ty: from_parent.or_else(|| node.ty().cloned()),
            returns: self.expected.returns.clone(),
        }))
    }
}

/// Wraps an integral constant in a narrowing cast where a declaration or
/// simple assignment expects `byte`, `short` or `char`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NarrowingAscriber;

impl NarrowingAscriber {
    fn applies(site: &Site<'_>) -> bool {
        let assigned = match site.parent_kind() {
            Some(NodeKind::LocalDecl | NodeKind::FieldDecl) => true,
            Some(NodeKind::Assign) => site.parent.and_then(|p| p.op()) == Some(Operator::Assign),
            _ => false,
        };
        assigned && site.slot() == Some(1)
    }
}

impl Ascriber for NarrowingAscriber {
    fn ascribe(&self, site: &Site<'_>, expr: NodeRef, env: &PassEnv) -> Step<NodeRef> {
        if !Self::applies(site) {
            return Ok(expr);
        }
        let (Some(target), Some(source), Some(value)) =
            (site.expected.ty.as_ref(), expr.ty(), expr.constant_value())
        else {
            return Ok(expr);
        };
        let narrows = target.is_narrow_integral()
            && source != target
            && matches!(source, Type::Byte | Type::Short | Type::Char | Type::Int)
            && target.numeric_conversion_valid(value);
        if !narrows {
            return Ok(expr);
        }
        let Some(converted) = value.cast_to(target) else {
            return Ok(expr);
        };

        trace!(from = %source, to = %target, "narrowing cast inserted");
        let position = expr.position().clone();
        let factory = env.factory();
        let type_node = factory.leaf(
            NodeKind::TypeNode,
            position.clone(),
            Attrs::named(&target.to_string()).with_type(target.clone()),
        )?;
        let attrs = Attrs::typed(target.clone()).with_constant(Constant::Value(converted));
        Ok(factory.make(NodeKind::Cast, position, attrs, vec![type_node, expr])?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedEntry {
    pub position: Position,
    pub kind: NodeKind,
    pub expected: Option<Type>,
    pub actual: Option<Type>,
}

/// Shared record of the expected types seen by [`ExpectedTypesPass`].
#[derive(Debug, Clone, Default)]
pub struct ExpectedTypeLog {
    entries: Rc<RefCell<Vec<ExpectedEntry>>>,
}

impl ExpectedTypeLog {
    pub fn entries(&self) -> Ref<'_, Vec<ExpectedEntry>> {
        self.entries.borrow()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn push(&self, entry: ExpectedEntry) {
        self.entries.borrow_mut().push(entry);
    }
}

/// Records every expression's expected type and leaves the tree alone.
#[derive(Debug, Clone, Default)]
pub struct LoggingAscriber {
    log: ExpectedTypeLog,
}

impl Ascriber for LoggingAscriber {
    fn ascribe(&self, site: &Site<'_>, expr: NodeRef, _env: &PassEnv) -> Step<NodeRef> {
        self.log.push(ExpectedEntry {
            position: expr.position().clone(),
            kind: expr.kind(),
            expected: site.expected.ty.clone(),
            actual: expr.ty().cloned(),
        });
        Ok(expr)
    }
}

pub(crate) fn register(factory: &mut TreeFactory) {
    factory.register::<dyn ExpectedTypeHooks>(NodeKind::LocalDecl, Arc::new(DeclExpected));
    factory.register::<dyn ExpectedTypeHooks>(NodeKind::FieldDecl, Arc::new(DeclExpected));
    factory.register::<dyn ExpectedTypeHooks>(NodeKind::Assign, Arc::new(AssignExpected));
    factory.register::<dyn ExpectedTypeHooks>(NodeKind::ArrayInit, Arc::new(ArrayInitExpected));
    factory.register::<dyn ExpectedTypeHooks>(NodeKind::Return, Arc::new(ReturnExpected));
    factory.register::<dyn ExpectedTypeHooks>(NodeKind::If, Arc::new(ConditionExpected));
    factory.register::<dyn ExpectedTypeHooks>(NodeKind::While, Arc::new(ConditionExpected));
}

/// Information-only pass; see [`ExpectedTypesPass::log`].
#[derive(Debug, Clone, Default)]
pub struct ExpectedTypesPass {
    log: ExpectedTypeLog,
}

impl ExpectedTypesPass {
    pub fn new(log: ExpectedTypeLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &ExpectedTypeLog {
        &self.log
    }
}

impl Pass for ExpectedTypesPass {
    fn name(&self) -> &'static str {
        EXPECTED_TYPES
    }

    fn run(&self, job: &Job, session: &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError> {
        let ascriber = LoggingAscriber {
            log: self.log.clone(),
        };
        let visitor = AscriptionVisitor::new(PassEnv::new(job, session), ascriber);
        run_visitor(EXPECTED_TYPES, job, &visitor)
    }
}

pub struct AscribePass;

impl Pass for AscribePass {
    fn name(&self) -> &'static str {
        ASCRIBE
    }

    fn run(&self, job: &Job, session: &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError> {
        let visitor = AscriptionVisitor::new(PassEnv::new(job, session), NarrowingAscriber);
        run_visitor(ASCRIBE, job, &visitor)
    }
}
