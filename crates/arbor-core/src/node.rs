//! Immutable syntax-tree nodes.
//!
//! Nodes are shared as [`NodeRef`] and never mutated. A rewrite builds a
//! new node that shares every unchanged child with the original, so a
//! pass that changes nothing hands back the very same `Arc`.

use crate::delegate::Delegate;
use crate::imports::ImportTable;
use crate::naming::{Word, resolve};
use crate::position::Position;
use crate::types::{ConstValue, Constant, Type, VarInstance};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub type NodeRef = Arc<Node>;

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    SourceFile,
    PackageDecl,
    Import,
    ClassDecl,
    ClassBody,
    FieldDecl,
    MethodDecl,
    Formal,
    Block,
    Labeled,
    LocalDecl,
    Eval,
    If,
    While,
    Return,
    Throw,
    Break,
    Continue,
    Empty,
    Assign,
    Binary,
    Unary,
    Cast,
    Literal,
    Name,
    Local,
    Field,
    Call,
    ArrayInit,
    TypeNode,
}

impl NodeKind {
    pub const ALL: [NodeKind; 30] = [
        NodeKind::SourceFile,
        NodeKind::PackageDecl,
        NodeKind::Import,
        NodeKind::ClassDecl,
        NodeKind::ClassBody,
        NodeKind::FieldDecl,
        NodeKind::MethodDecl,
        NodeKind::Formal,
        NodeKind::Block,
        NodeKind::Labeled,
        NodeKind::LocalDecl,
        NodeKind::Eval,
        NodeKind::If,
        NodeKind::While,
        NodeKind::Return,
        NodeKind::Throw,
        NodeKind::Break,
        NodeKind::Continue,
        NodeKind::Empty,
        NodeKind::Assign,
        NodeKind::Binary,
        NodeKind::Unary,
        NodeKind::Cast,
        NodeKind::Literal,
        NodeKind::Name,
        NodeKind::Local,
        NodeKind::Field,
        NodeKind::Call,
        NodeKind::ArrayInit,
        NodeKind::TypeNode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::SourceFile => "source-file",
            NodeKind::PackageDecl => "package-decl",
            NodeKind::Import => "import",
            NodeKind::ClassDecl => "class-decl",
            NodeKind::ClassBody => "class-body",
            NodeKind::FieldDecl => "field-decl",
            NodeKind::MethodDecl => "method-decl",
            NodeKind::Formal => "formal",
            NodeKind::Block => "block",
            NodeKind::Labeled => "labeled",
            NodeKind::LocalDecl => "local-decl",
            NodeKind::Eval => "eval",
            NodeKind::If => "if",
            NodeKind::While => "while",
            NodeKind::Return => "return",
            NodeKind::Throw => "throw",
            NodeKind::Break => "break",
            NodeKind::Continue => "continue",
            NodeKind::Empty => "empty",
            NodeKind::Assign => "assign",
            NodeKind::Binary => "binary",
            NodeKind::Unary => "unary",
            NodeKind::Cast => "cast",
            NodeKind::Literal => "literal",
            NodeKind::Name => "name",
            NodeKind::Local => "local",
            NodeKind::Field => "field",
            NodeKind::Call => "call",
            NodeKind::ArrayInit => "array-init",
            NodeKind::TypeNode => "type-node",
        }
    }

    pub fn is_expr(self) -> bool {
        matches!(
            self,
            NodeKind::Assign
                | NodeKind::Binary
                | NodeKind::Unary
                | NodeKind::Cast
                | NodeKind::Literal
                | NodeKind::Name
                | NodeKind::Local
                | NodeKind::Field
                | NodeKind::Call
                | NodeKind::ArrayInit
        )
    }

    pub fn is_stmt(self) -> bool {
        matches!(
            self,
            NodeKind::Block
                | NodeKind::Labeled
                | NodeKind::LocalDecl
                | NodeKind::Eval
                | NodeKind::If
                | NodeKind::While
                | NodeKind::Return
                | NodeKind::Throw
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::Empty
        )
    }

    pub fn is_member(self) -> bool {
        matches!(self, NodeKind::FieldDecl | NodeKind::MethodDecl)
    }

    /// Declarations that own a [`VarInstance`].
    pub fn is_var_decl(self) -> bool {
        matches!(
            self,
            NodeKind::FieldDecl | NodeKind::LocalDecl | NodeKind::Formal
        )
    }

    /// Statements after which control never falls through.
    pub fn is_unconditional_branch(self) -> bool {
        matches!(
            self,
            NodeKind::Return | NodeKind::Throw | NodeKind::Break | NodeKind::Continue
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown node kind `{s}`"))
    }
}

/// Literal tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Literal {
    Int(i32),
    Long(i64),
    Char(u16),
    Bool(bool),
    Double(f64),
    Str(Arc<str>),
    Null,
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Int(_) => Type::Int,
            Literal::Long(_) => Type::Long,
            Literal::Char(_) => Type::Char,
            Literal::Bool(_) => Type::Boolean,
            Literal::Double(_) => Type::Double,
            Literal::Str(_) => Type::string(),
            Literal::Null => Type::Null,
        }
    }

    pub fn constant(&self) -> Constant {
        let value = match self {
            Literal::Int(v) => ConstValue::Int(i64::from(*v)),
            Literal::Long(v) => ConstValue::Long(*v),
            Literal::Char(v) => ConstValue::Int(i64::from(*v)),
            Literal::Bool(v) => ConstValue::Bool(*v),
            Literal::Double(v) => ConstValue::Double(*v),
            Literal::Str(s) => ConstValue::Str(s.clone()),
            Literal::Null => return Constant::NotConstant,
        };
        Constant::Value(value)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Long(v) => write!(f, "{v}L"),
            Literal::Char(v) => match char::from_u32(u32::from(*v)) {
                Some(c) => write!(f, "{c:?}"),
                None => write!(f, "'\\u{v:04x}'"),
            },
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Double(v) => write!(f, "{v:?}"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Null => f.write_str("null"),
        }
    }
}

/// Operators of assignments, binary and unary expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "+=")]
    AddAssign,
    #[serde(rename = "-=")]
    SubAssign,
    #[serde(rename = "*=")]
    MulAssign,
    #[serde(rename = "/=")]
    DivAssign,
    #[serde(rename = "%=")]
    RemAssign,
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Rem,
    #[serde(rename = "<<")]
    Shl,
    #[serde(rename = ">>")]
    Shr,
    #[serde(rename = "&")]
    BitAnd,
    #[serde(rename = "|")]
    BitOr,
    #[serde(rename = "^")]
    BitXor,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "~")]
    BitNot,
    #[serde(rename = "neg")]
    Neg,
}

impl Operator {
    const TABLE: [(Operator, &'static str); 27] = [
        (Operator::Assign, "="),
        (Operator::AddAssign, "+="),
        (Operator::SubAssign, "-="),
        (Operator::MulAssign, "*="),
        (Operator::DivAssign, "/="),
        (Operator::RemAssign, "%="),
        (Operator::Add, "+"),
        (Operator::Sub, "-"),
        (Operator::Mul, "*"),
        (Operator::Div, "/"),
        (Operator::Rem, "%"),
        (Operator::Shl, "<<"),
        (Operator::Shr, ">>"),
        (Operator::BitAnd, "&"),
        (Operator::BitOr, "|"),
        (Operator::BitXor, "^"),
        (Operator::And, "&&"),
        (Operator::Or, "||"),
        (Operator::Lt, "<"),
        (Operator::Le, "<="),
        (Operator::Gt, ">"),
        (Operator::Ge, ">="),
        (Operator::Eq, "=="),
        (Operator::Ne, "!="),
        (Operator::Not, "!"),
        (Operator::BitNot, "~"),
        (Operator::Neg, "neg"),
    ];

    pub fn symbol(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(op, _)| *op == self)
            .map(|(_, s)| *s)
            .unwrap_or("?")
    }

    pub fn is_assignment(self) -> bool {
        self.compound_base().is_some() || self == Operator::Assign
    }

    /// The binary operator applied by a compound assignment.
    pub fn compound_base(self) -> Option<Operator> {
        Some(match self {
            Operator::AddAssign => Operator::Add,
            Operator::SubAssign => Operator::Sub,
            Operator::MulAssign => Operator::Mul,
            Operator::DivAssign => Operator::Div,
            Operator::RemAssign => Operator::Rem,
            _ => return None,
        })
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Rem
        )
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, Operator::BitAnd | Operator::BitOr | Operator::BitXor)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, Operator::Shl | Operator::Shr)
    }

    pub fn is_relational(self) -> bool {
        matches!(self, Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Operator::Eq | Operator::Ne)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Operator::Not | Operator::BitNot | Operator::Neg)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::TABLE
            .iter()
            .find(|(_, sym)| *sym == s)
            .map(|(op, _)| *op)
            .ok_or_else(|| format!("unknown operator `{s}`"))
    }
}

/// Declaration modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flags {
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

/// Kind-specific node payload.
///
/// Parsing fills the syntactic fields (`name`, `literal`, `op`, `flags`);
/// passes fill the semantic ones (`ty`, `constant`, `var`, `owner`,
/// `imports`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attrs {
    pub name: Option<Word>,
    pub literal: Option<Literal>,
    pub op: Option<Operator>,
    pub flags: Flags,
    pub ty: Option<Type>,
    pub constant: Option<Constant>,
    pub var: Option<Arc<VarInstance>>,
    /// Qualified name of the class owning a referenced field or method.
    pub owner: Option<Arc<str>>,
    pub imports: Option<Arc<ImportTable>>,
}

impl Attrs {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(crate::naming::intern(name)),
            ..Default::default()
        }
    }

    pub fn literal(literal: Literal) -> Self {
        Self {
            literal: Some(literal),
            ..Default::default()
        }
    }

    pub fn op(op: Operator) -> Self {
        Self {
            op: Some(op),
            ..Default::default()
        }
    }

    pub fn typed(ty: Type) -> Self {
        Self {
            ty: Some(ty),
            ..Default::default()
        }
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn with_constant(mut self, constant: Constant) -> Self {
        self.constant = Some(constant);
        self
    }

    pub fn with_var(mut self, var: Arc<VarInstance>) -> Self {
        self.var = Some(var);
        self
    }

    pub fn with_owner(mut self, owner: impl Into<Arc<str>>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// An immutable syntax-tree node.
#[derive(Debug)]
pub struct Node {
    kind: NodeKind,
    children: Vec<NodeRef>,
    position: Position,
    attrs: Attrs,
    delegate: Arc<Delegate>,
}

impl Node {
    pub(crate) fn new(
        kind: NodeKind,
        position: Position,
        attrs: Attrs,
        children: Vec<NodeRef>,
        delegate: Arc<Delegate>,
    ) -> Self {
        Self {
            kind,
            children,
            position,
            attrs,
            delegate,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&NodeRef> {
        self.children.get(index)
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn delegate(&self) -> &Arc<Delegate> {
        &self.delegate
    }

    pub fn name(&self) -> Option<Word> {
        self.attrs.name
    }

    pub fn name_str(&self) -> Option<&'static str> {
        self.attrs.name.map(resolve)
    }

    pub fn literal(&self) -> Option<&Literal> {
        self.attrs.literal.as_ref()
    }

    pub fn op(&self) -> Option<Operator> {
        self.attrs.op
    }

    pub fn flags(&self) -> Flags {
        self.attrs.flags
    }

    pub fn ty(&self) -> Option<&Type> {
        self.attrs.ty.as_ref()
    }

    pub fn constant(&self) -> Option<&Constant> {
        self.attrs.constant.as_ref()
    }

    /// The constant value, if constant checking found one.
    pub fn constant_value(&self) -> Option<&ConstValue> {
        self.attrs.constant.as_ref().and_then(Constant::value)
    }

    pub fn var(&self) -> Option<&Arc<VarInstance>> {
        self.attrs.var.as_ref()
    }

    pub fn owner(&self) -> Option<&str> {
        self.attrs.owner.as_deref()
    }

    pub fn imports(&self) -> Option<&Arc<ImportTable>> {
        self.attrs.imports.as_ref()
    }

    /// Index of `child` among this node's children, by identity.
    pub fn index_of(&self, child: &NodeRef) -> Option<usize> {
        self.children.iter().position(|c| Arc::ptr_eq(c, child))
    }
}

/// Structural equality; delegates are not compared.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.position == other.position
            && self.attrs == other.attrs
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| Arc::ptr_eq(a, b) || a == b)
    }
}

/// Copy-on-write rewrites of shared nodes.
///
/// Every method returns the receiver itself (the same `Arc`) when the
/// requested change would not alter the node.
pub trait NodeRefExt {
    fn with_children(&self, children: Vec<NodeRef>) -> NodeRef;
    fn with_attrs(&self, update: impl FnOnce(&mut Attrs)) -> NodeRef;
    fn with_type(&self, ty: Type) -> NodeRef;
    fn with_constant(&self, constant: Constant) -> NodeRef;
    fn with_child(&self, index: usize, child: NodeRef) -> NodeRef;
}

impl NodeRefExt for NodeRef {
    fn with_children(&self, children: Vec<NodeRef>) -> NodeRef {
        let unchanged = children.len() == self.children.len()
            && children
                .iter()
                .zip(&self.children)
                .all(|(a, b)| Arc::ptr_eq(a, b));
        if unchanged {
            return self.clone();
        }
        Arc::new(Node::new(
            self.kind,
            self.position.clone(),
            self.attrs.clone(),
            children,
            self.delegate.clone(),
        ))
    }

    fn with_attrs(&self, update: impl FnOnce(&mut Attrs)) -> NodeRef {
        let mut attrs = self.attrs.clone();
        update(&mut attrs);
        if attrs == self.attrs {
            return self.clone();
        }
        Arc::new(Node::new(
            self.kind,
            self.position.clone(),
            attrs,
            self.children.clone(),
            self.delegate.clone(),
        ))
    }

    fn with_type(&self, ty: Type) -> NodeRef {
        if self.attrs.ty.as_ref() == Some(&ty) {
            return self.clone();
        }
        self.with_attrs(|a| a.ty = Some(ty))
    }

    fn with_constant(&self, constant: Constant) -> NodeRef {
        if self.attrs.constant.as_ref() == Some(&constant) {
            return self.clone();
        }
        self.with_attrs(|a| a.constant = Some(constant))
    }

    fn with_child(&self, index: usize, child: NodeRef) -> NodeRef {
        let mut children = self.children.clone();
        match children.get_mut(index) {
            Some(slot) => *slot = child,
            None => return self.clone(),
        }
        self.with_children(children)
    }
}
