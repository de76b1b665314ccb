//! Lexical scopes.
//!
//! A [`Context`] is an immutable linked list of frames. Entering a node
//! may push frames; the result is a new context that shares the enclosing
//! frames. Contexts are computed from the tree alone (a block derives the
//! locals visible to a statement from the statement's earlier siblings),
//! so nothing computed while visiting one sibling leaks into the next.

use arbor_core::factory::TreeFactory;
use arbor_core::imports::{ImportTable, qualify};
use arbor_core::naming::Word;
use arbor_core::node::{NodeKind, NodeRef};
use arbor_core::types::{Type, VarInstance};
use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Frame {
    /// A compilation unit and its import table.
    Source(Arc<ImportTable>),
    /// A class body, by qualified class name.
    Class(Arc<str>),
    /// A method body and its return type.
    Code(Option<Type>),
    Local(Arc<VarInstance>),
}

#[derive(Debug)]
struct Link {
    frame: Frame,
    next: Option<Rc<Link>>,
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    top: Option<Rc<Link>>,
}

impl Context {
    pub fn push(&self, frame: Frame) -> Context {
        Context {
            top: Some(Rc::new(Link {
                frame,
                next: self.top.clone(),
            })),
        }
    }

    /// Frames from innermost to outermost.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.top.as_deref(), |link| link.next.as_deref()).map(|l| &l.frame)
    }

    pub fn depth(&self) -> usize {
        self.frames().count()
    }

    /// Whether both contexts are the same chain.
    pub fn same(&self, other: &Context) -> bool {
        match (&self.top, &other.top) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn imports(&self) -> Option<&Arc<ImportTable>> {
        self.frames().find_map(|f| match f {
            Frame::Source(table) => Some(table),
            _ => None,
        })
    }

    pub fn package(&self) -> Option<&str> {
        self.imports().and_then(|t| t.package())
    }

    pub fn current_class(&self) -> Option<&Arc<str>> {
        self.frames().find_map(|f| match f {
            Frame::Class(name) => Some(name),
            _ => None,
        })
    }

    /// Return type of the innermost method body, if inside one.
    pub fn return_type(&self) -> Option<Option<&Type>> {
        self.frames()
            .take_while(|f| !matches!(f, Frame::Class(_)))
            .find_map(|f| match f {
                Frame::Code(ret) => Some(ret.as_ref()),
                _ => None,
            })
    }

    /// The innermost local or formal called `name` in the current method.
    pub fn find_local(&self, name: Word) -> Option<&Arc<VarInstance>> {
        self.frames()
            .take_while(|f| !matches!(f, Frame::Class(_)))
            .find_map(|f| match f {
                Frame::Local(var) if var.name() == name => Some(var),
                _ => None,
            })
    }

    /// Qualified name of a class declared in the current unit.
    pub fn qualify(&self, simple: &str) -> String {
        qualify(self.package(), simple)
    }
}

/// Scope changes a node kind makes.
pub trait ScopeHooks: Send + Sync {
    /// Context for `node` itself and its subtree.
    fn enter_scope(&self, _node: &NodeRef, _ctx: &Context) -> Option<Context> {
        None
    }

    /// Context this node gives to one of its children.
    fn enter_child_scope(&self, _parent: &NodeRef, _child: &NodeRef, _ctx: &Context) -> Option<Context> {
        None
    }
}

/// The scope for `node`, given the scope of its parent, or `None` when
/// it does not change.
pub fn transition(parent: Option<&NodeRef>, node: &NodeRef, ctx: &Context) -> Option<Context> {
    let from_parent = parent.and_then(|p| {
        p.delegate()
            .hooks::<dyn ScopeHooks>()
            .and_then(|hooks| hooks.enter_child_scope(p, node, ctx))
    });
    let base = from_parent.as_ref().unwrap_or(ctx);
    let own = node
        .delegate()
        .hooks::<dyn ScopeHooks>()
        .and_then(|hooks| hooks.enter_scope(node, base));
    own.or(from_parent)
}

struct SourceFileScope;

impl ScopeHooks for SourceFileScope {
    fn enter_scope(&self, node: &NodeRef, ctx: &Context) -> Option<Context> {
        let table = node.imports()?;
        Some(ctx.push(Frame::Source(table.clone())))
    }
}

struct ClassScope;

impl ScopeHooks for ClassScope {
    fn enter_child_scope(&self, parent: &NodeRef, child: &NodeRef, ctx: &Context) -> Option<Context> {
        if child.kind() != NodeKind::ClassBody {
            return None;
        }
        let name = ctx.qualify(parent.name_str()?);
        Some(ctx.push(Frame::Class(name.into())))
    }
}

struct MethodScope;

impl ScopeHooks for MethodScope {
    fn enter_child_scope(&self, parent: &NodeRef, child: &NodeRef, ctx: &Context) -> Option<Context> {
        if child.kind() != NodeKind::Block {
            return None;
        }
        let ret = parent.child(0).and_then(|t| t.ty()).cloned();
        let formals = parent
            .children()
            .iter()
            .filter(|c| c.kind() == NodeKind::Formal)
            .filter_map(|c| c.var().cloned());
        Some(formals.fold(ctx.push(Frame::Code(ret)), |ctx, var| {
            ctx.push(Frame::Local(var))
        }))
    }
}

struct BlockScope;

impl ScopeHooks for BlockScope {
    fn enter_child_scope(&self, parent: &NodeRef, child: &NodeRef, ctx: &Context) -> Option<Context> {
        let index = parent.index_of(child)?;
        let earlier = parent.children()[..index]
            .iter()
            .filter(|c| c.kind() == NodeKind::LocalDecl)
            .filter_map(|c| c.var().cloned())
            .collect::<Vec<_>>();
        if earlier.is_empty() {
            return None;
        }
        Some(earlier.into_iter().fold(ctx.clone(), |ctx, var| ctx.push(Frame::Local(var))))
    }
}

pub(crate) fn register(factory: &mut TreeFactory) {
    factory.register::<dyn ScopeHooks>(NodeKind::SourceFile, Arc::new(SourceFileScope));
    factory.register::<dyn ScopeHooks>(NodeKind::ClassDecl, Arc::new(ClassScope));
    factory.register::<dyn ScopeHooks>(NodeKind::MethodDecl, Arc::new(MethodScope));
    factory.register::<dyn ScopeHooks>(NodeKind::Block, Arc::new(BlockScope));
}
