//! Tree-building helpers shared by the pass tests.

#![allow(dead_code)]

use arbor_core::prelude::*;
use arbor_core::scheduler::{Report, Scheduler, SchedulerConfig};
use arbor_passes::jl;
use arbor_passes::standard_passes;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

/// Builds nodes of one unit, giving each a fresh line.
pub struct Builder {
    session: Rc<Session>,
    source: Arc<str>,
    line: Cell<u32>,
}

impl Builder {
    pub fn new(session: &Rc<Session>, source: &str) -> Self {
        Self {
            session: session.clone(),
            source: source.into(),
            line: Cell::new(0),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn pos(&self) -> Position {
        self.line.set(self.line.get() + 1);
        Position::new(self.source.clone(), self.line.get(), 1)
    }

    pub fn make(&self, kind: NodeKind, attrs: Attrs, children: Vec<NodeRef>) -> NodeRef {
        self.session
            .factory()
            .make(kind, self.pos(), attrs, children)
            .unwrap_or_else(|err| panic!("bad test tree: {err}"))
    }

    pub fn unit(&self, package: Option<&str>, imports: &[&str], classes: Vec<NodeRef>) -> NodeRef {
        let mut children = Vec::new();
        if let Some(package) = package {
            children.push(self.make(NodeKind::PackageDecl, Attrs::named(package), vec![]));
        }
        for import in imports {
            children.push(self.make(NodeKind::Import, Attrs::named(import), vec![]));
        }
        children.extend(classes);
        self.make(NodeKind::SourceFile, Attrs::default(), children)
    }

    pub fn class(&self, name: &str, superclass: Option<&str>, members: Vec<NodeRef>) -> NodeRef {
        let body = self.make(NodeKind::ClassBody, Attrs::default(), members);
        let mut children: Vec<NodeRef> = superclass.map(|s| self.ty(s)).into_iter().collect();
        children.push(body);
        self.make(NodeKind::ClassDecl, Attrs::named(name), children)
    }

    pub fn ty(&self, name: &str) -> NodeRef {
        self.make(NodeKind::TypeNode, Attrs::named(name), vec![])
    }

    fn decl(&self, kind: NodeKind, ty: &str, name: &str, flags: Flags, init: Option<NodeRef>) -> NodeRef {
        let mut children = vec![self.ty(ty)];
        children.extend(init);
        self.make(kind, Attrs::named(name).with_flags(flags), children)
    }

    pub fn field(&self, ty: &str, name: &str, init: Option<NodeRef>) -> NodeRef {
        self.decl(NodeKind::FieldDecl, ty, name, Flags::default(), init)
    }

    pub fn final_field(&self, ty: &str, name: &str, init: Option<NodeRef>) -> NodeRef {
        let flags = Flags {
            is_final: true,
            is_static: true,
        };
        self.decl(NodeKind::FieldDecl, ty, name, flags, init)
    }

    pub fn local(&self, ty: &str, name: &str, init: Option<NodeRef>) -> NodeRef {
        self.decl(NodeKind::LocalDecl, ty, name, Flags::default(), init)
    }

    pub fn final_local(&self, ty: &str, name: &str, init: Option<NodeRef>) -> NodeRef {
        let flags = Flags {
            is_final: true,
            is_static: false,
        };
        self.decl(NodeKind::LocalDecl, ty, name, flags, init)
    }

    pub fn method(&self, ret: &str, name: &str, formals: &[(&str, &str)], body: Vec<NodeRef>) -> NodeRef {
        let mut children = vec![self.ty(ret)];
        for (ty, formal) in formals {
            let ty = self.ty(ty);
            children.push(self.make(NodeKind::Formal, Attrs::named(formal), vec![ty]));
        }
        children.push(self.block(body));
        self.make(NodeKind::MethodDecl, Attrs::named(name), children)
    }

    pub fn block(&self, stmts: Vec<NodeRef>) -> NodeRef {
        self.make(NodeKind::Block, Attrs::default(), stmts)
    }

    pub fn labeled(&self, label: &str, stmt: NodeRef) -> NodeRef {
        self.make(NodeKind::Labeled, Attrs::named(label), vec![stmt])
    }

    pub fn eval(&self, expr: NodeRef) -> NodeRef {
        self.make(NodeKind::Eval, Attrs::default(), vec![expr])
    }

    pub fn ret(&self, value: Option<NodeRef>) -> NodeRef {
        self.make(NodeKind::Return, Attrs::default(), value.into_iter().collect())
    }

    pub fn brk(&self, label: Option<&str>) -> NodeRef {
        self.make(NodeKind::Break, label.map(Attrs::named).unwrap_or_default(), vec![])
    }

    pub fn cont(&self, label: Option<&str>) -> NodeRef {
        self.make(NodeKind::Continue, label.map(Attrs::named).unwrap_or_default(), vec![])
    }

    pub fn empty(&self) -> NodeRef {
        self.make(NodeKind::Empty, Attrs::default(), vec![])
    }

    pub fn while_(&self, cond: NodeRef, body: NodeRef) -> NodeRef {
        self.make(NodeKind::While, Attrs::default(), vec![cond, body])
    }

    pub fn if_(&self, cond: NodeRef, then: NodeRef, otherwise: Option<NodeRef>) -> NodeRef {
        let mut children = vec![cond, then];
        children.extend(otherwise);
        self.make(NodeKind::If, Attrs::default(), children)
    }

    pub fn throw(&self, expr: NodeRef) -> NodeRef {
        self.make(NodeKind::Throw, Attrs::default(), vec![expr])
    }

    pub fn int(&self, value: i32) -> NodeRef {
        self.make(NodeKind::Literal, Attrs::literal(Literal::Int(value)), vec![])
    }

    pub fn long(&self, value: i64) -> NodeRef {
        self.make(NodeKind::Literal, Attrs::literal(Literal::Long(value)), vec![])
    }

    pub fn boolean(&self, value: bool) -> NodeRef {
        self.make(NodeKind::Literal, Attrs::literal(Literal::Bool(value)), vec![])
    }

    pub fn string(&self, value: &str) -> NodeRef {
        self.make(NodeKind::Literal, Attrs::literal(Literal::Str(value.into())), vec![])
    }

    pub fn name(&self, name: &str) -> NodeRef {
        self.make(NodeKind::Name, Attrs::named(name), vec![])
    }

    pub fn binary(&self, op: Operator, lhs: NodeRef, rhs: NodeRef) -> NodeRef {
        self.make(NodeKind::Binary, Attrs::op(op), vec![lhs, rhs])
    }

    pub fn assign(&self, lhs: NodeRef, rhs: NodeRef) -> NodeRef {
        self.make(NodeKind::Assign, Attrs::op(Operator::Assign), vec![lhs, rhs])
    }

    pub fn cast(&self, ty: &str, expr: NodeRef) -> NodeRef {
        let ty = self.ty(ty);
        self.make(NodeKind::Cast, Attrs::default(), vec![ty, expr])
    }

    pub fn call(&self, name: &str, args: Vec<NodeRef>) -> NodeRef {
        self.make(NodeKind::Call, Attrs::named(name), args)
    }

    pub fn array(&self, elements: Vec<NodeRef>) -> NodeRef {
        self.make(NodeKind::ArrayInit, Attrs::default(), elements)
    }
}

/// Runs the standard pipeline over `units` and returns the scheduler.
pub fn compile(session: &Rc<Session>, units: Vec<(&str, NodeRef)>) -> (Scheduler, Report) {
    let mut scheduler = Scheduler::new(session.clone(), standard_passes(), SchedulerConfig::default());
    for (source, tree) in units {
        scheduler.add_job(source, tree);
    }
    let report = scheduler.run_to_completion().expect("no internal error");
    (scheduler, report)
}

pub fn session() -> Rc<Session> {
    jl::session()
}

pub fn messages(session: &Session) -> Vec<String> {
    session
        .errors()
        .diagnostics()
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

/// Every node of `tree` in pre-order.
pub fn nodes(tree: &NodeRef) -> Vec<NodeRef> {
    let mut all = vec![tree.clone()];
    for child in tree.children() {
        all.extend(nodes(child));
    }
    all
}

/// The first node of `kind` in pre-order.
pub fn find(tree: &NodeRef, kind: NodeKind) -> NodeRef {
    nodes(tree)
        .into_iter()
        .find(|n| n.kind() == kind)
        .unwrap_or_else(|| panic!("no {kind} node"))
}
