//! Tiered disambiguation.
//!
//! The same visitor runs three times with a widening reach:
//!
//! * [`Tier::Outer`] sees only the unit header and class headers: imports
//!   are validated and superclasses resolved; class members are refused.
//! * [`Tier::Signatures`] adds member headers: field, method and formal
//!   types are resolved and recorded on their declaration instances;
//!   method bodies and field initializers are refused.
//! * [`Tier::Full`] is unrestricted: local types, ambiguous names and
//!   call targets inside code are resolved.

use crate::env::{PassEnv, run_visitor};
use crate::pipeline::{DISAMBIGUATE, DISAMBIGUATE_OUTER, DISAMBIGUATE_SIGNATURES};
use crate::scope::{self, Context};
use arbor_core::diagnostics::DiagnosticSink;
use arbor_core::error::{Halt, InternalError, SemanticError, Step};
use arbor_core::factory::TreeFactory;
use arbor_core::naming::{intern, split_qualified};
use arbor_core::node::{Attrs, NodeKind, NodeRef, NodeRefExt};
use arbor_core::scheduler::{Job, Pass};
use arbor_core::session::Session;
use arbor_core::traversal::{
    ContextVisitor, Descend, Hooks, LeaveFn, LeaveHook, Outcome, Visitor, walker,
};
use arbor_core::types::Type;
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Outer,
    Signatures,
    Full,
}

impl Tier {
    pub fn pass_name(self) -> &'static str {
        match self {
            Tier::Outer => DISAMBIGUATE_OUTER,
            Tier::Signatures => DISAMBIGUATE_SIGNATURES,
            Tier::Full => DISAMBIGUATE,
        }
    }
}

#[derive(Clone)]
pub struct Disambiguator {
    env: PassEnv,
    tier: Tier,
    context: Context,
    outer: Option<Rc<Disambiguator>>,
}

impl Disambiguator {
    pub fn new(env: PassEnv, tier: Tier) -> Self {
        Self {
            env,
            tier,
            context: Context::default(),
            outer: None,
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Whether `node` lies outside this tier's reach.
    fn refuses(&self, parent: Option<&NodeRef>, node: &NodeRef) -> bool {
        match self.tier {
            Tier::Full => false,
            Tier::Outer => node.kind().is_member(),
            Tier::Signatures => parent.is_some_and(|p| match p.kind() {
                NodeKind::MethodDecl => node.kind() == NodeKind::Block,
                NodeKind::FieldDecl => p.index_of(node) == Some(1),
                _ => false,
            }),
        }
    }
}

impl Visitor for Disambiguator {
    fn sink(&self) -> Option<&dyn DiagnosticSink> {
        Some(self.env.errors())
    }

    fn override_node(&self, parent: Option<&NodeRef>, node: &NodeRef) -> Step<Option<NodeRef>> {
        if self.refuses(parent, node) {
            trace!(kind = %node.kind(), tier = ?self.tier, "outside tier");
            return Ok(Some(node.clone()));
        }
        walker::dispatch_override(self, parent, node)
    }

    fn enter(&self, parent: Option<&NodeRef>, node: &NodeRef) -> Step<Descend<Self>> {
        self.descend(parent, node)
    }
}

impl ContextVisitor for Disambiguator {
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
            tier: self.tier,
            context,
            outer: Some(Rc::new(self.clone())),
        }
    }

    fn transition(&self, parent: Option<&NodeRef>, node: &NodeRef) -> Step<Option<Context>> {
        Ok(scope::transition(parent, node, &self.context))
    }
}

fn name_of(node: &NodeRef) -> Step<&'static str> {
    node.name_str().ok_or_else(|| {
        Halt::Fatal(InternalError::new(format!("{} without a name", node.kind())))
    })
}

fn import(_parent: Option<&NodeRef>, node: NodeRef, v: &Disambiguator) -> Step<NodeRef> {
    if v.tier != Tier::Outer {
        return Ok(node);
    }
    let name = name_of(&node)?;
    let ts = v.env.types();
    match name.strip_suffix(".*") {
        Some(package) => ts.check_package(package)?,
        None => {
            ts.resolve_class(name, None)?;
        }
    }
    Ok(node)
}

fn type_node(_parent: Option<&NodeRef>, node: NodeRef, v: &Disambiguator) -> Step<NodeRef> {
    if node.ty().is_some() {
        return Ok(node);
    }
    let name = name_of(&node)?;
    let imports = v.context.imports().map(|t| &**t);
    let ty = v.env.types().resolve_type(name, imports)?;
    Ok(node.with_type(ty))
}

fn class_decl(_parent: Option<&NodeRef>, node: NodeRef, v: &Disambiguator) -> Step<NodeRef> {
    if node.children().len() < 2 {
        return Ok(node);
    }
    let Some(superclass) = node.child(0).and_then(|t| t.ty()) else {
        return Ok(node);
    };
    let Type::Class(superclass) = superclass else {
        return Err(SemanticError::new(format!("Cannot extend non-class type {superclass}")).into());
    };
    let class = v.context.qualify(name_of(&node)?);
    v.env
        .session()
        .symbols_mut()
        .set_superclass(&class, superclass.clone())
        .map_err(|err| InternalError::new(err.to_string()))?;
    Ok(node)
}

/// Records the resolved declared type on the declaration instance.
fn var_decl(_parent: Option<&NodeRef>, node: NodeRef, _v: &Disambiguator) -> Step<NodeRef> {
    let (Some(var), Some(ty)) = (node.var(), node.child(0).and_then(|t| t.ty())) else {
        return Ok(node);
    };
    if !var.set_type(ty.clone()) {
        return Err(InternalError::new(format!(
            "declared type of {} changed between runs",
            var.name_str()
        ))
        .into());
    }
    Ok(node)
}

/// Rewrites an ambiguous name into a local or field reference.
fn name(_parent: Option<&NodeRef>, node: NodeRef, v: &Disambiguator) -> Step<NodeRef> {
    let text = name_of(&node)?;
    let ts = v.env.types();
    let factory = v.env.factory();

    let (owner, member) = match split_qualified(text) {
        (None, simple) => {
            let word = intern(simple);
            if let Some(var) = v.context.find_local(word) {
                let attrs = Attrs::named(simple).with_var(var.clone());
                return Ok(factory.leaf(NodeKind::Local, node.position().clone(), attrs)?);
            }
            let Some(class) = v.context.current_class() else {
                return Err(SemanticError::new(format!("Cannot find symbol {simple}")).into());
            };
            match ts.field(class, word) {
                Ok(found) => found,
                Err(Halt::Error(_)) => {
                    return Err(SemanticError::new(format!("Cannot find symbol {simple}")).into());
                }
                Err(other) => return Err(other),
            }
        }
        (Some(prefix), simple) => {
            let imports = v.context.imports().map(|t| &**t);
            let class = ts.resolve_class(prefix, imports)?;
            ts.field(&class, intern(simple))?
        }
    };
    let attrs = Attrs {
        name: Some(member.name()),
        ..Attrs::default()
    }
    .with_var(member)
    .with_owner(owner);
    Ok(factory.leaf(NodeKind::Field, node.position().clone(), attrs)?)
}

/// Resolves the class a call targets.
fn call(_parent: Option<&NodeRef>, node: NodeRef, v: &Disambiguator) -> Step<NodeRef> {
    if node.owner().is_some() {
        return Ok(node);
    }
    let text = name_of(&node)?;
    let ts = v.env.types();
    let (target, method) = match split_qualified(text) {
        (None, simple) => match v.context.current_class() {
            Some(class) => (class.clone(), simple),
            None => return Err(SemanticError::new(format!("Cannot find method {simple}")).into()),
        },
        (Some(prefix), simple) => {
            let imports = v.context.imports().map(|t| &**t);
            (ts.resolve_class(prefix, imports)?, simple)
        }
    };
    let owner = ts.method_owner(&target, intern(method))?;
    Ok(node.with_attrs(|a| {
        a.name = Some(intern(method));
        a.owner = Some(owner);
    }))
}

pub(crate) fn register(factory: &mut TreeFactory) {
    let table: [(NodeKind, LeaveFn<Disambiguator>); 8] = [
        (NodeKind::Import, import),
        (NodeKind::TypeNode, type_node),
        (NodeKind::ClassDecl, class_decl),
        (NodeKind::FieldDecl, var_decl),
        (NodeKind::LocalDecl, var_decl),
        (NodeKind::Formal, var_decl),
        (NodeKind::Name, name),
        (NodeKind::Call, call),
    ];
    for (kind, leave) in table {
        factory.register::<dyn Hooks<Disambiguator>>(kind, Arc::new(LeaveHook(leave)));
    }
}

pub struct DisambiguatePass {
    tier: Tier,
}

impl DisambiguatePass {
    pub fn new(tier: Tier) -> Self {
        Self { tier }
    }
}

impl Pass for DisambiguatePass {
    fn name(&self) -> &'static str {
        self.tier.pass_name()
    }

    fn run(&self, job: &Job, session: &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError> {
        let visitor = Disambiguator::new(PassEnv::new(job, session), self.tier);
        run_visitor(self.name(), job, &visitor)
    }
}
