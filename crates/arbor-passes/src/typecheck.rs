//! Type checking.
//!
//! Attaches a type to every expression and checks assignments, casts,
//! calls, conditions and returned values. A failed check reports a
//! diagnostic and gives the expression the error type, which every later
//! check accepts silently.

use crate::env::{PassEnv, run_visitor};
use crate::pipeline::TYPECHECK;
use crate::scope::{self, Context};
use crate::ts::TypeSystem;
use arbor_core::diagnostics::DiagnosticSink;
use arbor_core::error::{Halt, InternalError, SemanticError, Step};
use arbor_core::factory::TreeFactory;
use arbor_core::node::{Literal, NodeKind, NodeRef, NodeRefExt, Operator};
use arbor_core::scheduler::{Job, Pass};
use arbor_core::session::Session;
use arbor_core::traversal::{
    ContextVisitor, Descend, Hooks, LeaveFn, LeaveHook, Outcome, Visitor, walker,
};
use arbor_core::types::Type;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Clone)]
pub struct TypeChecker {
    env: PassEnv,
    context: Context,
    outer: Option<Rc<TypeChecker>>,
}

impl TypeChecker {
    pub fn new(env: PassEnv) -> Self {
        Self {
            env,
            context: Context::default(),
            outer: None,
        }
    }

    fn ts(&self) -> TypeSystem<'_> {
        self.env.types()
    }

    /// Assignment compatibility of `expr` with `target`, including the
    /// narrowing of an integral constant that fits.
    fn accepts(&self, target: &Type, expr: &NodeRef) -> bool {
        let Some(source) = expr.ty() else {
            return true;
        };
        if self.ts().is_assignable(source, target) {
            return true;
        }
        target.is_narrow_integral()
            && matches!(source, Type::Byte | Type::Short | Type::Char | Type::Int)
            && expr
                .constant_value()
                .is_some_and(|value| target.numeric_conversion_valid(value))
    }
}

impl Visitor for TypeChecker {
    fn sink(&self) -> Option<&dyn DiagnosticSink> {
        Some(self.env.errors())
    }

    fn enter(&self, parent: Option<&NodeRef>, node: &NodeRef) -> Step<Descend<Self>> {
        self.descend(parent, node)
    }

    /// Nodes with an operand left untyped by a deferral are kept as they
    /// are until the retry.
    fn leave(&self, parent: Option<&NodeRef>, old: &NodeRef, node: NodeRef, inner: &Self) -> Step<NodeRef> {
        if node.children().iter().any(|c| c.kind().is_expr() && c.ty().is_none()) {
            return Ok(node);
        }
        let node = walker::dispatch_leave(self, parent, old, node, inner)?;
        if node.kind().is_expr() && node.ty().is_none() {
            return Err(Halt::Fatal(InternalError::new(format!(
                "{} left type checking without a type",
                node.kind()
            ))));
        }
        Ok(node)
    }

    fn recover(&self, old: &NodeRef, node: NodeRef) -> NodeRef {
        if old.kind().is_expr() {
            node.with_type(Type::Error)
        } else {
            node
        }
    }
}

impl ContextVisitor for TypeChecker {
    type Context = Context;

    fn context(&self) -> &Context {
        &self.context
    }

    fn outer(&self) -> Option<&Rc<Self>> {
        self.outer.as_ref()
    }

    fn push(&self, context: Context) -> Self {
        Self {
            env: self.env.clone(),
            context,
            outer: Some(Rc::new(self.clone())),
        }
    }

    fn transition(&self, parent: Option<&NodeRef>, node: &NodeRef) -> Step<Option<Context>> {
        Ok(scope::transition(parent, node, &self.context))
    }
}

fn ty_of(node: Option<&NodeRef>) -> Type {
    node.and_then(|n| n.ty()).cloned().unwrap_or(Type::Error)
}

fn error<T>(message: String) -> Step<T> {
    Err(SemanticError::new(message).into())
}

fn literal(_parent: Option<&NodeRef>, node: NodeRef, _v: &TypeChecker) -> Step<NodeRef> {
    let ty = node.literal().map(Literal::ty).unwrap_or(Type::Error);
    Ok(node.with_type(ty))
}

fn variable(_parent: Option<&NodeRef>, node: NodeRef, _v: &TypeChecker) -> Step<NodeRef> {
    let ty = node.var().and_then(|var| var.ty()).cloned().unwrap_or(Type::Error);
    Ok(node.with_type(ty))
}

/// A name disambiguation could not resolve; already reported.
fn unresolved(_parent: Option<&NodeRef>, node: NodeRef, _v: &TypeChecker) -> Step<NodeRef> {
    Ok(node.with_type(Type::Error))
}

fn unary(_parent: Option<&NodeRef>, node: NodeRef, _v: &TypeChecker) -> Step<NodeRef> {
    let operand = ty_of(node.child(0));
    if operand.is_error() {
        return Ok(node.with_type(Type::Error));
    }
    let ty = match node.op() {
        Some(Operator::Not) if operand.is_boolean() => Some(Type::Boolean),
        Some(Operator::Neg) => operand.unary_promotion(),
        Some(Operator::BitNot) if operand.is_integral() => operand.unary_promotion(),
        _ => None,
    };
    match (ty, node.op()) {
        (Some(ty), _) => Ok(node.with_type(ty)),
        (None, Some(op)) => error(format!("Operator {op} cannot be applied to {operand}")),
        (None, None) => Err(InternalError::new("unary expression without an operator").into()),
    }
}

pub(crate) fn binary_type(ts: &TypeSystem<'_>, op: Operator, l: &Type, r: &Type) -> Option<Type> {
    if l.is_error() || r.is_error() {
        return Some(Type::Error);
    }
    match op {
        Operator::Add if l.is_string() || r.is_string() => Some(Type::string()),
        op if op.is_arithmetic() => l.binary_promotion(r),
        op if op.is_shift() => {
            (l.is_integral() && r.is_integral()).then(|| l.unary_promotion()).flatten()
        }
        op if op.is_bitwise() => {
            if l.is_boolean() && r.is_boolean() {
                Some(Type::Boolean)
            } else if l.is_integral() && r.is_integral() {
                l.binary_promotion(r)
            } else {
                None
            }
        }
        op if op.is_relational() => (l.is_numeric() && r.is_numeric()).then_some(Type::Boolean),
        op if op.is_equality() => {
            let comparable = (l.is_numeric() && r.is_numeric())
                || (l.is_boolean() && r.is_boolean())
                || (l.is_reference() && r.is_reference() && ts.is_cast_valid(l, r));
            comparable.then_some(Type::Boolean)
        }
        op if op.is_logical() => (l.is_boolean() && r.is_boolean()).then_some(Type::Boolean),
        _ => None,
    }
}

fn binary(_parent: Option<&NodeRef>, node: NodeRef, v: &TypeChecker) -> Step<NodeRef> {
    let (l, r) = (ty_of(node.child(0)), ty_of(node.child(1)));
    let op = node
        .op()
        .ok_or_else(|| InternalError::new("binary expression without an operator"))?;
    match binary_type(&v.ts(), op, &l, &r) {
        Some(ty) => Ok(node.with_type(ty)),
        None => error(format!("Operator {op} cannot be applied to {l} and {r}")),
    }
}

fn assign(_parent: Option<&NodeRef>, node: NodeRef, v: &TypeChecker) -> Step<NodeRef> {
    let (Some(lhs), Some(rhs)) = (node.child(0), node.child(1)) else {
        return Err(InternalError::new("assignment without two operands").into());
    };
    let target = ty_of(Some(lhs));
    if target.is_error() {
        return Ok(node.with_type(Type::Error));
    }
    let var = match lhs.kind() {
        NodeKind::Local | NodeKind::Field => lhs.var(),
        kind => return error(format!("Cannot assign to a {kind} expression")),
    };
    if let Some(var) = var.filter(|var| var.is_final()) {
        return error(format!("Cannot assign a value to final variable {}", var.name_str()));
    }
    let source = ty_of(Some(rhs));
    let op = node
        .op()
        .ok_or_else(|| InternalError::new("assignment without an operator"))?;
    let valid = match op.compound_base() {
        None => v.accepts(&target, rhs),
        Some(base) => binary_type(&v.ts(), base, &target, &source)
            .is_some_and(|result| result.is_error() || result.is_string() == target.is_string()),
    };
    if !valid {
        return error(format!("Cannot assign {source} to {target}"));
    }
    Ok(node.with_type(target))
}

fn cast(_parent: Option<&NodeRef>, node: NodeRef, v: &TypeChecker) -> Step<NodeRef> {
    let target = ty_of(node.child(0));
    let source = ty_of(node.child(1));
    if !v.ts().is_cast_valid(&source, &target) {
        return error(format!("Cannot cast {source} to {target}"));
    }
    Ok(node.with_type(target))
}

fn call(_parent: Option<&NodeRef>, node: NodeRef, v: &TypeChecker) -> Step<NodeRef> {
    let (Some(owner), Some(name)) = (node.owner(), node.name()) else {
        return Ok(node.with_type(Type::Error));
    };
    let args: Vec<Type> = node.children().iter().map(|c| ty_of(Some(c))).collect();
    if args.iter().any(Type::is_error) {
        return Ok(node.with_type(Type::Error));
    }
    let sig = v.ts().method(owner, name, &args)?;
    Ok(node.with_type(sig.ret))
}

/// Types an array initializer against `ty`, recursing into nested
/// initializers.
fn settle_array(init: &NodeRef, ty: &Type, v: &TypeChecker) -> Step<NodeRef> {
    if ty.is_error() {
        return Ok(init.with_type(Type::Error));
    }
    let Some(element) = ty.element() else {
        return error(format!("Cannot initialize {ty} with an array initializer"));
    };
    let mut children = Vec::with_capacity(init.children().len());
    for child in init.children() {
        if child.kind() == NodeKind::ArrayInit {
            children.push(settle_array(child, element, v)?);
        } else if v.accepts(element, child) {
            children.push(child.clone());
        } else {
            let found = ty_of(Some(child));
            return Err(SemanticError::at(format!("Cannot assign {found} to {element}"), child.position()).into());
        }
    }
    Ok(init.with_children(children).with_type(ty.clone()))
}

fn array_init(parent: Option<&NodeRef>, node: NodeRef, v: &TypeChecker) -> Step<NodeRef> {
    match parent.map(|p| p.kind()) {
        Some(NodeKind::LocalDecl | NodeKind::FieldDecl) => {
            let declared = parent.and_then(|p| p.var()).and_then(|var| var.ty()).cloned();
            settle_array(&node, &declared.unwrap_or(Type::Error), v)
        }
        // Settled again by the enclosing initializer.
        Some(NodeKind::ArrayInit) => {
            let element = node.child(0).and_then(|c| c.ty()).cloned().unwrap_or(Type::object());
            Ok(node.with_type(Type::array_of(element)))
        }
        _ => error("Array initializers are only allowed in declarations".to_string()),
    }
}

fn var_decl(_parent: Option<&NodeRef>, node: NodeRef, v: &TypeChecker) -> Step<NodeRef> {
    let (Some(declared), Some(init)) = (node.var().and_then(|var| var.ty()), node.child(1)) else {
        return Ok(node);
    };
    if init.kind() != NodeKind::ArrayInit && !v.accepts(declared, init) {
        let found = ty_of(Some(init));
        return error(format!(
            "The type of the variable initializer \"{found}\" does not match that of the declaration \"{declared}\"."
        ));
    }
    Ok(node)
}

fn return_stmt(_parent: Option<&NodeRef>, node: NodeRef, v: &TypeChecker) -> Step<NodeRef> {
    let Some(expected) = v.context.return_type() else {
        return error("Return statement outside a method".to_string());
    };
    let Some(expected) = expected else {
        return Ok(node);
    };
    match node.child(0) {
        Some(_) if expected.is_void() => error("Cannot return a value from a void method".to_string()),
        Some(value) if !v.accepts(expected, value) => error(format!(
            "Cannot return {} from a method returning {expected}",
            ty_of(Some(value))
        )),
        None if !expected.is_void() => error(format!("Missing return value of type {expected}")),
        _ => Ok(node),
    }
}

fn condition(_parent: Option<&NodeRef>, node: NodeRef, _v: &TypeChecker) -> Step<NodeRef> {
    let ty = ty_of(node.child(0));
    if ty.is_boolean() || ty.is_error() {
        Ok(node)
    } else {
        error(format!("Condition must be boolean, found {ty}"))
    }
}

fn throw(_parent: Option<&NodeRef>, node: NodeRef, v: &TypeChecker) -> Step<NodeRef> {
    match ty_of(node.child(0)) {
        Type::Error => Ok(node),
        Type::Class(name) if v.ts().is_subclass(&name, "Throwable") => Ok(node),
        other => error(format!("Can only throw subclasses of Throwable, found {other}")),
    }
}

pub(crate) fn register(factory: &mut TreeFactory) {
    let table: [(NodeKind, LeaveFn<TypeChecker>); 16] = [
        (NodeKind::Literal, literal),
        (NodeKind::Local, variable),
        (NodeKind::Field, variable),
        (NodeKind::Name, unresolved),
        (NodeKind::Unary, unary),
        (NodeKind::Binary, binary),
        (NodeKind::Assign, assign),
        (NodeKind::Cast, cast),
        (NodeKind::Call, call),
        (NodeKind::ArrayInit, array_init),
        (NodeKind::LocalDecl, var_decl),
        (NodeKind::FieldDecl, var_decl),
        (NodeKind::Return, return_stmt),
        (NodeKind::If, condition),
        (NodeKind::While, condition),
        (NodeKind::Throw, throw),
    ];
    for (kind, leave) in table {
        factory.register::<dyn Hooks<TypeChecker>>(kind, Arc::new(LeaveHook(leave)));
    }
}

pub struct TypeCheckPass;

impl Pass for TypeCheckPass {
    fn name(&self) -> &'static str {
        TYPECHECK
    }

    fn run(&self, job: &Job, session: &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError> {
        run_visitor(TYPECHECK, job, &TypeChecker::new(PassEnv::new(job, session)))
    }
}
