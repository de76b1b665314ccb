//! Import and class-table setup, the first pass over every unit.
//!
//! Entering the source file creates the unit's import table; each import
//! is appended in file order as it is left; each class declaration is
//! registered in the symbol table. Leaving the source file freezes the
//! table onto the node, where scope contexts pick it up.

use crate::env::{PassEnv, run_visitor};
use crate::pipeline::IMPORTS;
use arbor_core::diagnostics::DiagnosticSink;
use arbor_core::error::{InternalError, SemanticError, Step};
use arbor_core::factory::TreeFactory;
use arbor_core::imports::{ImportTable, qualify};
use arbor_core::node::{NodeKind, NodeRef, NodeRefExt};
use arbor_core::scheduler::{Job, Pass};
use arbor_core::session::Session;
use arbor_core::symbols::{Installed, SymbolError};
use arbor_core::traversal::{Descend, Hooks, LeaveHook, Outcome, Visitor};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone)]
pub struct ImportSetup {
    env: PassEnv,
    table: Option<Rc<RefCell<ImportTable>>>,
    /// Classes declared so far in this traversal.
    classes: Rc<RefCell<HashSet<Arc<str>>>>,
}

impl ImportSetup {
    pub fn new(env: PassEnv) -> Self {
        Self {
            env,
            table: None,
            classes: Rc::default(),
        }
    }

    fn table(&self) -> Step<&Rc<RefCell<ImportTable>>> {
        self.table
            .as_ref()
            .ok_or_else(|| InternalError::new("import table used outside a source file").into())
    }
}

impl Visitor for ImportSetup {
    fn sink(&self) -> Option<&dyn DiagnosticSink> {
        Some(self.env.errors())
    }
}

struct SourceFileSetup;

impl Hooks<ImportSetup> for SourceFileSetup {
    fn enter(&self, _parent: Option<&NodeRef>, node: &NodeRef, v: &ImportSetup) -> Step<Descend<ImportSetup>> {
        let package = node
            .child(0)
            .filter(|c| c.kind() == NodeKind::PackageDecl)
            .and_then(|c| c.name_str());
        let table = ImportTable::new(package.map(Into::into));
        Ok(Descend::with_visitor(ImportSetup {
            env: v.env.clone(),
            table: Some(Rc::new(RefCell::new(table))),
            classes: v.classes.clone(),
        }))
    }

    fn leave(
        &self,
        _parent: Option<&NodeRef>,
        _old: &NodeRef,
        node: NodeRef,
        _v: &ImportSetup,
        inner: &ImportSetup,
    ) -> Step<NodeRef> {
        let frozen = Arc::new(inner.table()?.borrow().clone());
        Ok(node.with_attrs(|a| a.imports = Some(frozen)))
    }
}

fn import(_parent: Option<&NodeRef>, node: NodeRef, v: &ImportSetup) -> Step<NodeRef> {
    let name = node
        .name_str()
        .ok_or_else(|| InternalError::new("import without a name"))?;
    trace!(import = name, "import registered");
    v.table()?.borrow_mut().add(name);
    Ok(node)
}

fn class_decl(_parent: Option<&NodeRef>, node: NodeRef, v: &ImportSetup) -> Step<NodeRef> {
    let name = node
        .name_str()
        .ok_or_else(|| InternalError::new("class without a name"))?;
    let qualified: Arc<str> = qualify(v.table()?.borrow().package(), name).into();
    if !v.classes.borrow_mut().insert(qualified.clone()) {
        let err = SymbolError::DuplicateClass { name: qualified };
        return Err(SemanticError::at(err.to_string(), node.position()).into());
    }
    let installed = v
        .env
        .session()
        .symbols_mut()
        .install_class(&qualified, v.env.job())
        .map_err(|err| SemanticError::at(err.to_string(), node.position()))?;
    if installed == Installed::Added {
        trace!(class = %qualified, "class registered");
    }
    Ok(node)
}

pub(crate) fn register(factory: &mut TreeFactory) {
    factory.register::<dyn Hooks<ImportSetup>>(NodeKind::SourceFile, Arc::new(SourceFileSetup));
    factory.register::<dyn Hooks<ImportSetup>>(NodeKind::Import, Arc::new(LeaveHook(import)));
    factory.register::<dyn Hooks<ImportSetup>>(NodeKind::ClassDecl, Arc::new(LeaveHook(class_decl)));
}

pub struct ImportsPass;

impl Pass for ImportsPass {
    fn name(&self) -> &'static str {
        IMPORTS
    }

    fn run(&self, job: &Job, session: &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError> {
        run_visitor(IMPORTS, job, &ImportSetup::new(PassEnv::new(job, session)))
    }
}
