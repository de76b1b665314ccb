//! Class resolution and assignability for the reference language.
//!
//! Lookups consult the shared symbol table and turn "not there yet" into
//! a deferral: a class name cannot be declared missing until every unit
//! has registered its classes, and a member cannot be declared missing
//! until the owning class's members are installed.

use crate::env::PassEnv;
use crate::pipeline::{IMPORTS, MEMBERS};
use arbor_core::error::{Halt, SemanticError, Step};
use arbor_core::imports::ImportTable;
use arbor_core::naming::{Word, resolve};
use arbor_core::scheduler::{Dependency, Goal};
use arbor_core::symbols::{ClassEntry, MethodSig, SymbolTable};
use arbor_core::types::{Type, VarInstance};
use std::sync::Arc;

/// Classes every unit can name without importing them.
const BUILTIN_CLASSES: [&str; 3] = ["Object", "String", "Throwable"];

pub struct TypeSystem<'a> {
    env: &'a PassEnv,
}

impl<'a> TypeSystem<'a> {
    pub fn new(env: &'a PassEnv) -> Self {
        Self { env }
    }

    /// Resolves a type name as written in source: a primitive keyword, a
    /// class name, or either followed by `[]`.
    pub fn resolve_type(&self, name: &str, imports: Option<&ImportTable>) -> Step<Type> {
        if let Some(element) = name.strip_suffix("[]") {
            return Ok(Type::array_of(self.resolve_type(element.trim_end(), imports)?));
        }
        if let Some(primitive) = Type::primitive(name) {
            return Ok(primitive);
        }
        Ok(Type::Class(self.resolve_class(name, imports)?))
    }

    /// Resolves a simple or qualified class name to its qualified name.
    pub fn resolve_class(&self, name: &str, imports: Option<&ImportTable>) -> Step<Arc<str>> {
        if BUILTIN_CLASSES.contains(&name) {
            return Ok(name.into());
        }
        let symbols = self.env.session().symbols();
        if name.contains('.') {
            return match symbols.lookup(name) {
                Some(entry) => Ok(entry.name().clone()),
                None => self.missing_class(name),
            };
        }

        let (specific, on_demand) = match imports {
            Some(table) => table.candidates(name),
            None => (vec![name.to_string()], Vec::new()),
        };
        if let Some(entry) = specific.iter().find_map(|c| symbols.lookup(c)) {
            return Ok(entry.name().clone());
        }
        let found: Vec<&ClassEntry> = on_demand.iter().filter_map(|c| symbols.lookup(c)).collect();
        match found.as_slice() {
            [entry] => Ok(entry.name().clone()),
            [] => self.missing_class(name),
            [first, second, ..] => Err(SemanticError::new(format!(
                "Reference to {name} is ambiguous, both {} and {} match",
                first.name(),
                second.name()
            ))
            .into()),
        }
    }

    fn missing_class<T>(&self, name: &str) -> Step<T> {
        if self.env.session().progress().is_settled(IMPORTS) {
            Err(SemanticError::new(format!("Cannot find class {name}")).into())
        } else {
            Err(Halt::Defer(Dependency::AllJobs(IMPORTS)))
        }
    }

    /// Whether some registered class lives in `package`, deferring until
    /// every unit has registered its classes.
    pub fn check_package(&self, package: &str) -> Step<()> {
        if self.env.session().symbols().contains_package(package) {
            return Ok(());
        }
        if self.env.session().progress().is_settled(IMPORTS) {
            Err(SemanticError::new(format!("Package {package} not found")).into())
        } else {
            Err(Halt::Defer(Dependency::AllJobs(IMPORTS)))
        }
    }

    /// Finds field `name` in `class` or its superclasses. Returns the
    /// declaring class and the field's instance.
    pub fn field(&self, class: &str, name: Word) -> Step<(Arc<str>, Arc<VarInstance>)> {
        let symbols = self.env.session().symbols();
        let found = walk_members(&symbols, class, |entry| {
            entry.field(name).map(|var| (entry.name().clone(), var.clone()))
        })?;
        found.ok_or_else(|| {
            SemanticError::new(format!("Cannot find field {} in class {class}", resolve(name))).into()
        })
    }

    /// The class declaring some method called `name`, searching `class`
    /// and its superclasses.
    pub fn method_owner(&self, class: &str, name: Word) -> Step<Arc<str>> {
        let symbols = self.env.session().symbols();
        let found = walk_members(&symbols, class, |entry| {
            entry.methods(name).next().map(|_| entry.name().clone())
        })?;
        found.ok_or_else(|| {
            SemanticError::new(format!("Cannot find method {} in class {class}", resolve(name))).into()
        })
    }

    /// Selects the first method called `name` whose parameters accept
    /// `args`, searching `class` and its superclasses.
    pub fn method(&self, class: &str, name: Word, args: &[Type]) -> Step<MethodSig> {
        let symbols = self.env.session().symbols();
        let found = walk_members(&symbols, class, |entry| {
            entry
                .methods(name)
                .find(|sig| {
                    sig.params.len() == args.len()
                        && args
                            .iter()
                            .zip(&sig.params)
                            .all(|(arg, param)| is_assignable_in(&symbols, arg, param))
                })
                .cloned()
        })?;
        found.ok_or_else(|| {
            let shown: Vec<String> = args.iter().map(Type::to_string).collect();
            SemanticError::new(format!(
                "No method {}({}) in class {class}",
                resolve(name),
                shown.join(", ")
            ))
            .into()
        })
    }

    pub fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        is_subclass_in(&self.env.session().symbols(), sub, sup)
    }

    /// Assignment compatibility, including class subtyping.
    pub fn is_assignable(&self, from: &Type, to: &Type) -> bool {
        is_assignable_in(&self.env.session().symbols(), from, to)
    }

    pub fn is_cast_valid(&self, from: &Type, to: &Type) -> bool {
        if !from.is_cast_valid(to) {
            return false;
        }
        match (from, to) {
            (Type::Class(a), Type::Class(b)) => {
                let symbols = self.env.session().symbols();
                is_subclass_in(&symbols, a, b) || is_subclass_in(&symbols, b, a)
            }
            _ => true,
        }
    }
}

/// Applies `find` to `class` and each superclass in turn. Defers when a
/// class on the chain has not had its members installed.
fn walk_members<T>(
    symbols: &SymbolTable,
    class: &str,
    find: impl Fn(&ClassEntry) -> Option<T>,
) -> Step<Option<T>> {
    let mut current = Some(class.to_string());
    let mut steps = 0;
    while let Some(name) = current {
        let Some(entry) = symbols.lookup(&name) else {
            return Ok(None);
        };
        if !entry.members_complete() {
            return Err(Halt::Defer(Dependency::Goal(Goal::new(entry.job(), MEMBERS))));
        }
        if let Some(found) = find(entry) {
            return Ok(Some(found));
        }
        steps += 1;
        if steps > symbols.len() {
            return Ok(None);
        }
        current = entry.superclass().map(|s| s.to_string());
    }
    Ok(None)
}

fn is_subclass_in(symbols: &SymbolTable, sub: &str, sup: &str) -> bool {
    if sub == sup || sup == "Object" {
        return true;
    }
    let mut current = symbols.lookup(sub).and_then(|e| e.superclass().cloned());
    for _ in 0..symbols.len() {
        match current {
            Some(name) if &*name == sup => return true,
            Some(name) => current = symbols.lookup(&name).and_then(|e| e.superclass().cloned()),
            None => return false,
        }
    }
    false
}

fn is_assignable_in(symbols: &SymbolTable, from: &Type, to: &Type) -> bool {
    if from.is_implicit_cast_valid(to) {
        return true;
    }
    match (from, to) {
        (Type::Class(a), Type::Class(b)) => is_subclass_in(symbols, a, b),
        (Type::Array(a), Type::Array(b)) if a.is_reference() => is_assignable_in(symbols, a, b),
        _ => false,
    }
}
