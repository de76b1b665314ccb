//! Validated node construction.
//!
//! Every node, whether produced by a front end or by a rewriting hook, is
//! built through a [`TreeFactory`]. The factory checks the positional child
//! conventions of the kind, attaches the kind's delegate and gives each
//! variable declaration a fresh [`VarInstance`].
//!
//! Delegates are captured when a node is built, so hook registrations must
//! happen before trees are constructed.

use crate::delegate::Delegate;
use crate::error::FactoryError;
use crate::node::{Attrs, Node, NodeKind, NodeRef};
use crate::position::Position;
use crate::types::{VarInstance, VarKind};
use indexmap::IndexMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TreeFactory {
    delegates: IndexMap<NodeKind, Arc<Delegate>>,
}

impl Default for TreeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeFactory {
    /// A factory whose delegates carry no hooks.
    pub fn new() -> Self {
        let delegates = NodeKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(Delegate::new(kind))))
            .collect();
        Self { delegates }
    }

    pub fn delegate(&self, kind: NodeKind) -> Arc<Delegate> {
        self.delegates
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(Delegate::new(kind)))
    }

    /// Registers hook trait `H` for `kind`, replacing any earlier entry.
    pub fn register<H>(&mut self, kind: NodeKind, hook: Arc<H>)
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.extend(kind, |delegate| delegate.set(hook));
    }

    /// Edits the delegate of `kind` in place.
    pub fn extend(&mut self, kind: NodeKind, edit: impl FnOnce(&mut Delegate)) {
        let entry = self
            .delegates
            .entry(kind)
            .or_insert_with(|| Arc::new(Delegate::new(kind)));
        edit(Arc::make_mut(entry));
    }

    pub fn make(
        &self,
        kind: NodeKind,
        position: Position,
        mut attrs: Attrs,
        children: Vec<NodeRef>,
    ) -> Result<NodeRef, FactoryError> {
        check_children(kind, &children)?;
        check_attrs(kind, &attrs)?;
        if kind.is_var_decl() && attrs.var.is_none() {
            let var_kind = match kind {
                NodeKind::FieldDecl => VarKind::Field,
                NodeKind::Formal => VarKind::Formal,
                _ => VarKind::Local,
            };
            if let Some(name) = attrs.name {
                attrs.var = Some(Arc::new(VarInstance::new(
                    name,
                    var_kind,
                    attrs.flags.is_final,
                    position.clone(),
                )));
            }
        }
        Ok(Arc::new(Node::new(
            kind,
            position,
            attrs,
            children,
            self.delegate(kind),
        )))
    }

    pub fn leaf(&self, kind: NodeKind, position: Position, attrs: Attrs) -> Result<NodeRef, FactoryError> {
        self.make(kind, position, attrs, Vec::new())
    }
}

fn is_expr(node: &NodeRef) -> bool {
    node.kind().is_expr()
}

fn is_stmt(node: &NodeRef) -> bool {
    node.kind().is_stmt()
}

fn is_type(node: &NodeRef) -> bool {
    node.kind() == NodeKind::TypeNode
}

fn arity(
    kind: NodeKind,
    children: &[NodeRef],
    range: std::ops::RangeInclusive<usize>,
    expected: &'static str,
) -> Result<(), FactoryError> {
    if range.contains(&children.len()) {
        Ok(())
    } else {
        Err(FactoryError::Arity {
            kind,
            expected,
            found: children.len(),
        })
    }
}

fn expect(
    kind: NodeKind,
    children: &[NodeRef],
    index: usize,
    accept: fn(&NodeRef) -> bool,
    expected: &'static str,
) -> Result<(), FactoryError> {
    match children.get(index) {
        Some(child) if !accept(child) => Err(FactoryError::ChildKind {
            kind,
            index,
            expected,
            found: child.kind(),
        }),
        _ => Ok(()),
    }
}

fn expect_all(
    kind: NodeKind,
    children: &[NodeRef],
    from: usize,
    accept: fn(&NodeRef) -> bool,
    expected: &'static str,
) -> Result<(), FactoryError> {
    (from..children.len()).try_for_each(|i| expect(kind, children, i, accept, expected))
}

fn check_children(kind: NodeKind, children: &[NodeRef]) -> Result<(), FactoryError> {
    use NodeKind::*;
    match kind {
        SourceFile => {
            let mut phase = 0;
            for (index, child) in children.iter().enumerate() {
                let rank = match child.kind() {
                    PackageDecl if index == 0 => 0,
                    Import => 1,
                    ClassDecl => 2,
                    found => {
                        return Err(FactoryError::ChildKind {
                            kind,
                            index,
                            expected: "package declaration, import or class",
                            found,
                        });
                    }
                };
                if rank < phase {
                    return Err(FactoryError::ChildKind {
                        kind,
                        index,
                        expected: "imports before classes",
                        found: child.kind(),
                    });
                }
                phase = rank;
            }
            Ok(())
        }
        PackageDecl | Import | Literal | Name | Local | Field | TypeNode | Break | Continue
        | Empty => arity(kind, children, 0..=0, "no"),
        ClassDecl => {
            arity(kind, children, 1..=2, "1 or 2")?;
            let body = children.len() - 1;
            expect(kind, children, body, |c| c.kind() == ClassBody, "class body")?;
            if body == 1 {
                expect(kind, children, 0, is_type, "superclass type")?;
            }
            Ok(())
        }
        ClassBody => expect_all(kind, children, 0, |c| c.kind().is_member(), "member"),
        FieldDecl | LocalDecl => {
            arity(kind, children, 1..=2, "1 or 2")?;
            expect(kind, children, 0, is_type, "type")?;
            expect(kind, children, 1, is_expr, "initializer expression")
        }
        MethodDecl => {
            arity(kind, children, 1..=usize::MAX, "at least 1")?;
            expect(kind, children, 0, is_type, "return type")?;
            let mut formals_end = children.len();
            if children.len() > 1 && children[children.len() - 1].kind() == Block {
                formals_end -= 1;
            }
            (1..formals_end).try_for_each(|i| {
                expect(kind, children, i, |c| c.kind() == Formal, "formal parameter")
            })
        }
        Formal => {
            arity(kind, children, 1..=1, "1")?;
            expect(kind, children, 0, is_type, "type")
        }
        Block => expect_all(kind, children, 0, is_stmt, "statement"),
        Labeled => {
            arity(kind, children, 1..=1, "1")?;
            expect(kind, children, 0, is_stmt, "statement")
        }
        Eval | Throw | Unary => {
            arity(kind, children, 1..=1, "1")?;
            expect(kind, children, 0, is_expr, "expression")
        }
        Return => {
            arity(kind, children, 0..=1, "0 or 1")?;
            expect(kind, children, 0, is_expr, "expression")
        }
        If => {
            arity(kind, children, 2..=3, "2 or 3")?;
            expect(kind, children, 0, is_expr, "condition")?;
            expect_all(kind, children, 1, is_stmt, "statement")
        }
        While => {
            arity(kind, children, 2..=2, "2")?;
            expect(kind, children, 0, is_expr, "condition")?;
            expect(kind, children, 1, is_stmt, "statement")
        }
        Assign | Binary => {
            arity(kind, children, 2..=2, "2")?;
            expect_all(kind, children, 0, is_expr, "expression")
        }
        Cast => {
            arity(kind, children, 2..=2, "2")?;
            expect(kind, children, 0, is_type, "type")?;
            expect(kind, children, 1, is_expr, "expression")
        }
        Call | ArrayInit => expect_all(kind, children, 0, is_expr, "expression"),
    }
}

fn check_attrs(kind: NodeKind, attrs: &Attrs) -> Result<(), FactoryError> {
    use NodeKind::*;
    let missing = |attr| Err(FactoryError::MissingAttr { kind, attr });
    match kind {
        PackageDecl | Import | ClassDecl | FieldDecl | MethodDecl | Formal | LocalDecl
        | Labeled | Name | Call
            if attrs.name.is_none() =>
        {
            missing("name")
        }
        Local | Field if attrs.name.is_none() || attrs.var.is_none() => missing("var"),
        TypeNode if attrs.name.is_none() && attrs.ty.is_none() => missing("name"),
        Literal if attrs.literal.is_none() => missing("literal"),
        Assign if !attrs.op.is_some_and(|op| op.is_assignment()) => missing("op"),
        Binary if attrs.op.is_none_or(|op| op.is_assignment() || op.is_unary()) => missing("op"),
        Unary if !attrs.op.is_some_and(|op| op.is_unary()) => missing("op"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Literal, Operator};

    fn lit(factory: &TreeFactory, v: i32) -> NodeRef {
        factory
            .leaf(NodeKind::Literal, Position::default(), Attrs::literal(Literal::Int(v)))
            .unwrap()
    }

    #[test]
    fn rejects_wrong_arity() {
        let factory = TreeFactory::new();
        let err = factory
            .make(
                NodeKind::Binary,
                Position::default(),
                Attrs::op(Operator::Add),
                vec![lit(&factory, 1)],
            )
            .unwrap_err();
        assert!(matches!(err, FactoryError::Arity { found: 1, .. }));
    }

    #[test]
    fn rejects_statement_where_expression_expected() {
        let factory = TreeFactory::new();
        let empty = factory
            .leaf(NodeKind::Empty, Position::default(), Attrs::default())
            .unwrap();
        let err = factory
            .make(NodeKind::Eval, Position::default(), Attrs::default(), vec![empty])
            .unwrap_err();
        assert!(matches!(
            err,
            FactoryError::ChildKind {
                found: NodeKind::Empty,
                ..
            }
        ));
    }

    #[test]
    fn rejects_missing_attributes() {
        let factory = TreeFactory::new();
        let err = factory
            .leaf(NodeKind::Literal, Position::default(), Attrs::default())
            .unwrap_err();
        assert_eq!(
            err,
            FactoryError::MissingAttr {
                kind: NodeKind::Literal,
                attr: "literal"
            }
        );
    }

    #[test]
    fn declarations_get_fresh_instances() {
        let factory = TreeFactory::new();
        let ty = factory
            .leaf(NodeKind::TypeNode, Position::default(), Attrs::named("int"))
            .unwrap();
        let a = factory
            .make(NodeKind::LocalDecl, Position::default(), Attrs::named("x"), vec![ty.clone()])
            .unwrap();
        let b = factory
            .make(NodeKind::LocalDecl, Position::default(), Attrs::named("x"), vec![ty])
            .unwrap();
        let (va, vb) = (a.var().unwrap(), b.var().unwrap());
        assert!(!Arc::ptr_eq(va, vb));
        assert_eq!(va.kind(), VarKind::Local);
    }

    #[test]
    fn imports_must_precede_classes() {
        let factory = TreeFactory::new();
        let body = factory
            .make(NodeKind::ClassBody, Position::default(), Attrs::default(), vec![])
            .unwrap();
        let class = factory
            .make(NodeKind::ClassDecl, Position::default(), Attrs::named("A"), vec![body])
            .unwrap();
        let import = factory
            .leaf(NodeKind::Import, Position::default(), Attrs::named("p.B"))
            .unwrap();
        assert!(
            factory
                .make(
                    NodeKind::SourceFile,
                    Position::default(),
                    Attrs::default(),
                    vec![class, import]
                )
                .is_err()
        );
    }

    #[test]
    fn extensions_replace_delegates() {
        let mut factory = TreeFactory::new();
        factory.register::<String>(NodeKind::Block, Arc::new("marker".to_string()));
        let block = factory
            .make(NodeKind::Block, Position::default(), Attrs::default(), vec![])
            .unwrap();
        assert_eq!(
            block.delegate().hooks::<String>().map(|s| s.as_str()),
            Some("marker")
        );
    }
}
