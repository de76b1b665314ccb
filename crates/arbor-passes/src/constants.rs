//! Constant checking.
//!
//! Computes the compile-time constant state of every expression, bottom
//! up, and records the constant of each final variable on its declaration
//! instance. An expression whose operands are not known yet (because a
//! final field in another unit has not been checked) is left without a
//! state and the pass defers.

use crate::env::{PassEnv, run_visitor};
use crate::pipeline::CONSTANTS;
use arbor_core::diagnostics::DiagnosticSink;
use arbor_core::error::{Halt, InternalError, Step};
use arbor_core::factory::TreeFactory;
use arbor_core::node::{Literal, NodeKind, NodeRef, NodeRefExt, Operator};
use arbor_core::scheduler::{Dependency, Goal, Job, Pass};
use arbor_core::session::Session;
use arbor_core::traversal::{Hooks, LeaveFn, LeaveHook, Outcome, Visitor};
use arbor_core::types::{ConstValue, Constant, Type, VarKind};
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone)]
pub struct ConstantChecker {
    env: PassEnv,
}

impl ConstantChecker {
    pub fn new(env: PassEnv) -> Self {
        Self { env }
    }
}

impl Visitor for ConstantChecker {
    fn sink(&self) -> Option<&dyn DiagnosticSink> {
        Some(self.env.errors())
    }
}

fn set(node: NodeRef, value: Option<ConstValue>) -> Step<NodeRef> {
    Ok(node.with_constant(value.map_or(Constant::NotConstant, Constant::Value)))
}

fn literal(_parent: Option<&NodeRef>, node: NodeRef, _v: &ConstantChecker) -> Step<NodeRef> {
    let constant = node
        .literal()
        .map(Literal::constant)
        .ok_or_else(|| InternalError::new("literal without a value"))?;
    Ok(node.with_constant(constant))
}

fn not_constant(_parent: Option<&NodeRef>, node: NodeRef, _v: &ConstantChecker) -> Step<NodeRef> {
    Ok(node.with_constant(Constant::NotConstant))
}

fn unary(_parent: Option<&NodeRef>, node: NodeRef, _v: &ConstantChecker) -> Step<NodeRef> {
    let Some(operand) = node.child(0).and_then(|c| c.constant()) else {
        return Ok(node);
    };
    let folded = match (node.op(), operand.value()) {
        (Some(op), Some(value)) => fold_unary(op, value),
        _ => None,
    };
    set(node, folded)
}

fn binary(_parent: Option<&NodeRef>, node: NodeRef, _v: &ConstantChecker) -> Step<NodeRef> {
    let (Some(lhs), Some(rhs)) = (node.child(0), node.child(1)) else {
        return Err(InternalError::new("binary expression without two operands").into());
    };
    let (Some(left), Some(right)) = (lhs.constant(), rhs.constant()) else {
        return Ok(node);
    };
    let folded = match (node.op(), left.value(), right.value()) {
        (Some(Operator::Add), Some(ConstValue::Str(_)), Some(_))
        | (Some(Operator::Add), Some(_), Some(ConstValue::Str(_))) => {
            let joined = text(lhs, left.value()) + &text(rhs, right.value());
            Some(ConstValue::Str(joined.into()))
        }
        (Some(op), Some(l), Some(r)) => fold_binary(op, l, r),
        _ => None,
    };
    set(node, folded)
}

fn cast(_parent: Option<&NodeRef>, node: NodeRef, _v: &ConstantChecker) -> Step<NodeRef> {
    let Some(operand) = node.child(1).and_then(|c| c.constant()) else {
        return Ok(node);
    };
    let target = node.child(0).and_then(|t| t.ty());
    let folded = match (target, operand.value()) {
        (Some(target), Some(value)) => value.cast_to(target),
        _ => None,
    };
    set(node, folded)
}

fn local(_parent: Option<&NodeRef>, node: NodeRef, _v: &ConstantChecker) -> Step<NodeRef> {
    match node.var().and_then(|var| var.constant()).cloned() {
        Some(constant) => Ok(node.with_constant(constant)),
        None => Ok(node),
    }
}

/// A final field's constant may be computed by another unit's run of
/// this pass.
fn field(_parent: Option<&NodeRef>, node: NodeRef, v: &ConstantChecker) -> Step<NodeRef> {
    let var = node
        .var()
        .ok_or_else(|| InternalError::new("field reference without an instance"))?;
    if !var.is_final() {
        return Ok(node.with_constant(Constant::NotConstant));
    }
    if let Some(constant) = var.constant() {
        return Ok(node.with_constant(constant.clone()));
    }
    let owner = node
        .owner()
        .ok_or_else(|| InternalError::new("field reference without an owner"))?;
    let job = v
        .env
        .session()
        .symbols()
        .lookup(owner)
        .map(|entry| entry.job())
        .ok_or_else(|| InternalError::new(format!("owner {owner} of field {} is unknown", var.name_str())))?;
    trace!(field = var.name_str(), %job, "field constant not known yet");
    Err(Halt::Defer(Dependency::Goal(Goal::new(job, CONSTANTS))))
}

fn var_decl(_parent: Option<&NodeRef>, node: NodeRef, _v: &ConstantChecker) -> Step<NodeRef> {
    let var = node
        .var()
        .ok_or_else(|| InternalError::new(format!("{} without an instance", node.kind())))?;
    let constant = if var.kind() == VarKind::Formal || !var.is_final() {
        Constant::NotConstant
    } else {
        match node.child(1) {
            None => Constant::NotConstant,
            Some(init) => match init.constant() {
                None => return Ok(node),
                Some(init) => {
                    let declared = var.ty();
                    let value = init.value().zip(declared).and_then(|(v, ty)| v.cast_to(ty));
                    value.map_or(Constant::NotConstant, Constant::Value)
                }
            },
        }
    };
    if !var.set_constant(constant.clone()) {
        return Err(InternalError::new(format!(
            "constant of {} changed between runs",
            var.name_str()
        ))
        .into());
    }
    Ok(node.with_constant(constant))
}

/// Text a constant contributes to a string concatenation.
fn text(node: &NodeRef, value: Option<&ConstValue>) -> String {
    match value {
        Some(ConstValue::Str(s)) => s.to_string(),
        Some(ConstValue::Int(c)) if is_char(node) => u32::try_from(*c)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default(),
        Some(ConstValue::Double(d)) => format!("{d:?}"),
        Some(ConstValue::Int(i) | ConstValue::Long(i)) => i.to_string(),
        Some(ConstValue::Bool(b)) => b.to_string(),
        None => String::new(),
    }
}

fn is_char(node: &NodeRef) -> bool {
    match node.kind() {
        NodeKind::Literal => matches!(node.literal(), Some(Literal::Char(_))),
        NodeKind::Local | NodeKind::Field => node.var().and_then(|v| v.ty()) == Some(&Type::Char),
        NodeKind::Cast => node.child(0).and_then(|t| t.ty()) == Some(&Type::Char),
        _ => false,
    }
}

fn wrap_int(v: i64) -> ConstValue {
    ConstValue::Int(i64::from(v as i32))
}

pub(crate) fn fold_unary(op: Operator, value: &ConstValue) -> Option<ConstValue> {
    match (op, value) {
        (Operator::Neg, ConstValue::Int(v)) => Some(wrap_int(v.wrapping_neg())),
        (Operator::Neg, ConstValue::Long(v)) => Some(ConstValue::Long(v.wrapping_neg())),
        (Operator::Neg, ConstValue::Double(v)) => Some(ConstValue::Double(-v)),
        (Operator::BitNot, ConstValue::Int(v)) => Some(wrap_int(!v)),
        (Operator::BitNot, ConstValue::Long(v)) => Some(ConstValue::Long(!v)),
        (Operator::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        _ => None,
    }
}

/// Folds a binary operation with the operand promotion rules of the
/// reference language. Division by zero is not a constant.
pub(crate) fn fold_binary(op: Operator, left: &ConstValue, right: &ConstValue) -> Option<ConstValue> {
    use ConstValue::*;

    if let (Bool(l), Bool(r)) = (left, right) {
        return match op {
            Operator::And | Operator::BitAnd => Some(Bool(*l && *r)),
            Operator::Or | Operator::BitOr => Some(Bool(*l || *r)),
            Operator::BitXor | Operator::Ne => Some(Bool(l != r)),
            Operator::Eq => Some(Bool(l == r)),
            _ => None,
        };
    }

    if op.is_shift() {
        let distance = right.as_integral()?;
        return match left {
            Int(l) => {
                let (l, d) = (*l as i32, (distance & 31) as u32);
                Some(Int(i64::from(match op {
                    Operator::Shl => l.wrapping_shl(d),
                    _ => l >> d,
                })))
            }
            Long(l) => {
                let d = (distance & 63) as u32;
                Some(Long(match op {
                    Operator::Shl => l.wrapping_shl(d),
                    _ => l >> d,
                }))
            }
            _ => None,
        };
    }

    if matches!(left, Double(_)) || matches!(right, Double(_)) {
        let (l, r) = (left.as_double()?, right.as_double()?);
        return match op {
            Operator::Add => Some(Double(l + r)),
            Operator::Sub => Some(Double(l - r)),
            Operator::Mul => Some(Double(l * r)),
            Operator::Div => Some(Double(l / r)),
            Operator::Rem => Some(Double(l % r)),
            _ => compare(op, l.partial_cmp(&r)),
        };
    }

    let (l, r) = (left.as_integral()?, right.as_integral()?);
    if matches!(left, Long(_)) || matches!(right, Long(_)) {
        return match op {
            Operator::Add => Some(Long(l.wrapping_add(r))),
            Operator::Sub => Some(Long(l.wrapping_sub(r))),
            Operator::Mul => Some(Long(l.wrapping_mul(r))),
            Operator::Div if r != 0 => Some(Long(l.wrapping_div(r))),
            Operator::Rem if r != 0 => Some(Long(l.wrapping_rem(r))),
            Operator::BitAnd => Some(Long(l & r)),
            Operator::BitOr => Some(Long(l | r)),
            Operator::BitXor => Some(Long(l ^ r)),
            _ => compare(op, Some(l.cmp(&r))),
        };
    }

    let (l, r) = (l as i32, r as i32);
    let int = |v: i32| Some(Int(i64::from(v)));
    match op {
        Operator::Add => int(l.wrapping_add(r)),
        Operator::Sub => int(l.wrapping_sub(r)),
        Operator::Mul => int(l.wrapping_mul(r)),
        Operator::Div if r != 0 => int(l.wrapping_div(r)),
        Operator::Rem if r != 0 => int(l.wrapping_rem(r)),
        Operator::BitAnd => int(l & r),
        Operator::BitOr => int(l | r),
        Operator::BitXor => int(l ^ r),
        _ => compare(op, Some(l.cmp(&r))),
    }
}

fn compare(op: Operator, ordering: Option<std::cmp::Ordering>) -> Option<ConstValue> {
    use std::cmp::Ordering::*;
    let result = match (op, ordering) {
        (Operator::Eq, o) => o == Some(Equal),
        (Operator::Ne, o) => o != Some(Equal),
        (_, None) if op.is_relational() => false,
        (Operator::Lt, Some(o)) => o == Less,
        (Operator::Le, Some(o)) => o != Greater,
        (Operator::Gt, Some(o)) => o == Greater,
        (Operator::Ge, Some(o)) => o != Less,
        _ => return None,
    };
    Some(ConstValue::Bool(result))
}

pub(crate) fn register(factory: &mut TreeFactory) {
    let table: [(NodeKind, LeaveFn<ConstantChecker>); 13] = [
        (NodeKind::Literal, literal),
        (NodeKind::Unary, unary),
        (NodeKind::Binary, binary),
        (NodeKind::Cast, cast),
        (NodeKind::Local, local),
        (NodeKind::Field, field),
        (NodeKind::LocalDecl, var_decl),
        (NodeKind::FieldDecl, var_decl),
        (NodeKind::Formal, var_decl),
        (NodeKind::Assign, not_constant),
        (NodeKind::Call, not_constant),
        (NodeKind::ArrayInit, not_constant),
        (NodeKind::Name, not_constant),
    ];
    for (kind, leave) in table {
        factory.register::<dyn Hooks<ConstantChecker>>(kind, Arc::new(LeaveHook(leave)));
    }
}

pub struct ConstantsPass;

impl Pass for ConstantsPass {
    fn name(&self) -> &'static str {
        CONSTANTS
    }

    fn run(&self, job: &Job, session: &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError> {
        run_visitor(CONSTANTS, job, &ConstantChecker::new(PassEnv::new(job, session)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Operator::Add, ConstValue::Int(i64::from(i32::MAX)), ConstValue::Int(1), ConstValue::Int(i64::from(i32::MIN)))]
    #[case(Operator::Mul, ConstValue::Int(6), ConstValue::Long(7), ConstValue::Long(42))]
    #[case(Operator::Div, ConstValue::Int(7), ConstValue::Int(2), ConstValue::Int(3))]
    #[case(Operator::Rem, ConstValue::Int(-7), ConstValue::Int(2), ConstValue::Int(-1))]
    #[case(Operator::Shl, ConstValue::Int(1), ConstValue::Int(33), ConstValue::Int(2))]
    #[case(Operator::Shl, ConstValue::Long(1), ConstValue::Int(33), ConstValue::Long(1 << 33))]
    #[case(Operator::Shr, ConstValue::Int(-8), ConstValue::Long(1), ConstValue::Int(-4))]
    #[case(Operator::Add, ConstValue::Double(0.5), ConstValue::Int(1), ConstValue::Double(1.5))]
    #[case(Operator::Lt, ConstValue::Int(1), ConstValue::Double(1.5), ConstValue::Bool(true))]
    #[case(Operator::Eq, ConstValue::Long(3), ConstValue::Int(3), ConstValue::Bool(true))]
    #[case(Operator::And, ConstValue::Bool(true), ConstValue::Bool(false), ConstValue::Bool(false))]
    #[case(Operator::BitXor, ConstValue::Int(6), ConstValue::Int(3), ConstValue::Int(5))]
    fn folds_binary_operations(
        #[case] op: Operator,
        #[case] left: ConstValue,
        #[case] right: ConstValue,
        #[case] expected: ConstValue,
    ) {
        assert_eq!(fold_binary(op, &left, &right), Some(expected));
    }

    #[test]
    fn division_by_zero_is_not_constant() {
        assert_eq!(fold_binary(Operator::Div, &ConstValue::Int(1), &ConstValue::Int(0)), None);
        assert_eq!(fold_binary(Operator::Rem, &ConstValue::Long(1), &ConstValue::Long(0)), None);
        assert_eq!(
            fold_binary(Operator::Div, &ConstValue::Double(1.0), &ConstValue::Int(0)),
            Some(ConstValue::Double(f64::INFINITY))
        );
    }

    #[test]
    fn nan_compares_unequal() {
        let nan = ConstValue::Double(f64::NAN);
        assert_eq!(fold_binary(Operator::Eq, &nan, &nan), Some(ConstValue::Bool(false)));
        assert_eq!(fold_binary(Operator::Ne, &nan, &nan), Some(ConstValue::Bool(true)));
        assert_eq!(fold_binary(Operator::Ge, &nan, &nan), Some(ConstValue::Bool(false)));
    }

    #[test]
    fn folds_unary_operations() {
        assert_eq!(
            fold_unary(Operator::Neg, &ConstValue::Int(i64::from(i32::MIN))),
            Some(ConstValue::Int(i64::from(i32::MIN)))
        );
        assert_eq!(fold_unary(Operator::BitNot, &ConstValue::Int(0)), Some(ConstValue::Int(-1)));
        assert_eq!(fold_unary(Operator::Not, &ConstValue::Bool(true)), Some(ConstValue::Bool(false)));
        assert_eq!(fold_unary(Operator::Not, &ConstValue::Int(1)), None);
    }

    #[test]
    fn mixed_kinds_do_not_fold() {
        assert_eq!(fold_binary(Operator::Add, &ConstValue::Bool(true), &ConstValue::Int(1)), None);
        assert_eq!(fold_binary(Operator::Lt, &ConstValue::Bool(true), &ConstValue::Bool(false)), None);
    }
}
