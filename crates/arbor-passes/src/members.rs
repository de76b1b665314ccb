//! Member registration.
//!
//! Installs each class's fields and method signatures in the symbol table
//! once their declared types are known, then marks the class's member
//! list complete. Lookups in other units defer on that mark.

use crate::env::{PassEnv, run_visitor};
use crate::pipeline::MEMBERS;
use arbor_core::diagnostics::DiagnosticSink;
use arbor_core::error::{Halt, InternalError, SemanticError, Step};
use arbor_core::factory::TreeFactory;
use arbor_core::imports::qualify;
use arbor_core::naming::{Word, resolve};
use arbor_core::node::{NodeKind, NodeRef};
use arbor_core::scheduler::{Job, Pass};
use arbor_core::session::Session;
use arbor_core::symbols::{Installed, Member, MethodSig, SymbolError};
use arbor_core::traversal::{Descend, Hooks, LeaveHook, Outcome, Visitor};
use arbor_core::types::Type;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone)]
pub struct MemberRegistrar {
    env: PassEnv,
    package: Option<Arc<str>>,
    class: Option<Arc<str>>,
    /// Method signatures declared so far in this traversal.
    methods: Rc<RefCell<HashSet<(Arc<str>, Word, Vec<Type>)>>>,
}

impl MemberRegistrar {
    pub fn new(env: PassEnv) -> Self {
        Self {
            env,
            package: None,
            class: None,
            methods: Rc::default(),
        }
    }

    fn class(&self) -> Step<&Arc<str>> {
        self.class
            .as_ref()
            .ok_or_else(|| InternalError::new("member outside a class").into())
    }

    fn install(&self, node: &NodeRef, member: Member) -> Step<()> {
        let class = self.class()?;
        let name = member.name();
        let installed = self
            .env
            .session()
            .symbols_mut()
            .install_member(class, member)
            .map_err(|err| symbol_error(err, node))?;
        if installed == Installed::Added {
            trace!(%class, member = resolve(name), "member installed");
        }
        Ok(())
    }
}

fn symbol_error(err: SymbolError, node: &NodeRef) -> Halt {
    match err {
        SymbolError::UnknownClass(_) => InternalError::new(err.to_string()).into(),
        _ => SemanticError::at(err.to_string(), node.position()).into(),
    }
}

impl Visitor for MemberRegistrar {
    fn sink(&self) -> Option<&dyn DiagnosticSink> {
        Some(self.env.errors())
    }
}

struct SourceFileMembers;

impl Hooks<MemberRegistrar> for SourceFileMembers {
    fn enter(
        &self,
        _parent: Option<&NodeRef>,
        node: &NodeRef,
        v: &MemberRegistrar,
    ) -> Step<Descend<MemberRegistrar>> {
        let package = node.imports().and_then(|t| t.package()).map(Arc::from);
        Ok(Descend::with_visitor(MemberRegistrar {
            package,
            ..v.clone()
        }))
    }
}

struct ClassMembers;

impl Hooks<MemberRegistrar> for ClassMembers {
    fn enter(
        &self,
        _parent: Option<&NodeRef>,
        node: &NodeRef,
        v: &MemberRegistrar,
    ) -> Step<Descend<MemberRegistrar>> {
        let name = node
            .name_str()
            .ok_or_else(|| InternalError::new("class without a name"))?;
        Ok(Descend::with_visitor(MemberRegistrar {
            class: Some(qualify(v.package.as_deref(), name).into()),
            ..v.clone()
        }))
    }

    fn leave(
        &self,
        _parent: Option<&NodeRef>,
        _old: &NodeRef,
        node: NodeRef,
        _v: &MemberRegistrar,
        inner: &MemberRegistrar,
    ) -> Step<NodeRef> {
        let class = inner.class()?;
        inner
            .env
            .session()
            .symbols_mut()
            .complete_members(class)
            .map_err(|err| InternalError::new(err.to_string()))?;
        Ok(node)
    }
}

/// Fields whose type failed to resolve are left out; the failure has
/// already been reported.
fn field_decl(_parent: Option<&NodeRef>, node: NodeRef, v: &MemberRegistrar) -> Step<NodeRef> {
    let Some(var) = node.var().filter(|var| var.ty().is_some()) else {
        return Ok(node);
    };
    v.install(&node, Member::Field(var.clone()))?;
    Ok(node)
}

fn method_decl(_parent: Option<&NodeRef>, node: NodeRef, v: &MemberRegistrar) -> Step<NodeRef> {
    let (Some(name), Some(ret)) = (node.name(), node.child(0).and_then(|t| t.ty())) else {
        return Ok(node);
    };
    let params: Option<Vec<Type>> = node
        .children()
        .iter()
        .filter(|c| c.kind() == NodeKind::Formal)
        .map(|c| c.var().and_then(|var| var.ty()).cloned())
        .collect();
    let Some(params) = params else {
        return Ok(node);
    };
    let class = v.class()?;
    if !v.methods.borrow_mut().insert((class.clone(), name, params.clone())) {
        let err = SymbolError::DuplicateMember {
            class: class.clone(),
            member: resolve(name).to_string(),
        };
        return Err(symbol_error(err, &node));
    }
    let sig = MethodSig {
        name,
        params,
        ret: ret.clone(),
        is_static: node.flags().is_static,
        position: node.position().clone(),
    };
    v.install(&node, Member::Method(sig))?;
    Ok(node)
}

pub(crate) fn register(factory: &mut TreeFactory) {
    factory.register::<dyn Hooks<MemberRegistrar>>(NodeKind::SourceFile, Arc::new(SourceFileMembers));
    factory.register::<dyn Hooks<MemberRegistrar>>(NodeKind::ClassDecl, Arc::new(ClassMembers));
    factory.register::<dyn Hooks<MemberRegistrar>>(NodeKind::FieldDecl, Arc::new(LeaveHook(field_decl)));
    factory.register::<dyn Hooks<MemberRegistrar>>(NodeKind::MethodDecl, Arc::new(LeaveHook(method_decl)));
}

pub struct MembersPass;

impl Pass for MembersPass {
    fn name(&self) -> &'static str {
        MEMBERS
    }

    fn run(&self, job: &Job, session: &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError> {
        run_visitor(MEMBERS, job, &MemberRegistrar::new(PassEnv::new(job, session)))
    }
}
