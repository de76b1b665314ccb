//! The shared class and member store.

use crate::naming::{Word, resolve};
use crate::position::Position;
use crate::scheduler::JobId;
use crate::types::{Type, VarInstance};
use indexmap::IndexMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("Duplicate class {name}")]
    DuplicateClass { name: Arc<str> },

    #[error("Duplicate member {member} in class {class}")]
    DuplicateMember { class: Arc<str>, member: String },

    #[error("Unknown class {0}")]
    UnknownClass(String),
}

/// Outcome of an installation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installed {
    Added,
    /// The same declaration was installed by an earlier run.
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub name: Word,
    pub params: Vec<Type>,
    pub ret: Type,
    pub is_static: bool,
    /// Identifies the declaration, so that a retried installation is
    /// recognized as the same method.
    pub position: Position,
}

impl MethodSig {
    pub fn name_str(&self) -> &'static str {
        resolve(self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Member {
    Field(Arc<VarInstance>),
    Method(MethodSig),
}

impl Member {
    pub fn name(&self) -> Word {
        match self {
            Member::Field(var) => var.name(),
            Member::Method(sig) => sig.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassEntry {
    name: Arc<str>,
    job: JobId,
    superclass: Option<Arc<str>>,
    members: Vec<Member>,
    members_complete: bool,
}

impl ClassEntry {
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// The job whose unit declares this class.
    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn superclass(&self) -> Option<&Arc<str>> {
        self.superclass.as_ref()
    }

    /// Whether member registration has finished for this class.
    pub fn members_complete(&self) -> bool {
        self.members_complete
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn field(&self, name: Word) -> Option<&Arc<VarInstance>> {
        self.members.iter().find_map(|m| match m {
            Member::Field(var) if var.name() == name => Some(var),
            _ => None,
        })
    }

    pub fn methods(&self, name: Word) -> impl Iterator<Item = &MethodSig> {
        self.members.iter().filter_map(move |m| match m {
            Member::Method(sig) if sig.name == name => Some(sig),
            _ => None,
        })
    }
}

/// Classes by qualified name, in installation order.
#[derive(Debug, Default)]
pub struct SymbolTable {
    classes: IndexMap<Arc<str>, ClassEntry>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn lookup(&self, qualified: &str) -> Option<&ClassEntry> {
        self.classes.get(qualified)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassEntry> {
        self.classes.values()
    }

    /// Whether any known class lives in `package`.
    pub fn contains_package(&self, package: &str) -> bool {
        self.classes.keys().any(|name| {
            name.strip_prefix(package)
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    pub fn install_class(&mut self, qualified: &str, job: JobId) -> Result<Installed, SymbolError> {
        if let Some(entry) = self.classes.get(qualified) {
            if entry.job == job {
                return Ok(Installed::AlreadyPresent);
            }
            return Err(SymbolError::DuplicateClass {
                name: entry.name.clone(),
            });
        }
        let name: Arc<str> = qualified.into();
        self.classes.insert(
            name.clone(),
            ClassEntry {
                name,
                job,
                superclass: None,
                members: Vec::new(),
                members_complete: false,
            },
        );
        Ok(Installed::Added)
    }

    pub fn set_superclass(&mut self, class: &str, superclass: Arc<str>) -> Result<(), SymbolError> {
        let entry = self.entry_mut(class)?;
        entry.superclass = Some(superclass);
        Ok(())
    }

    /// Installs a member. Re-installing the same declaration is a no-op;
    /// a different declaration with a clashing signature is an error.
    pub fn install_member(&mut self, class: &str, member: Member) -> Result<Installed, SymbolError> {
        let entry = self.entry_mut(class)?;
        let clash = entry.members.iter().position(|existing| match (existing, &member) {
            (Member::Field(a), Member::Field(b)) => a.name() == b.name(),
            (Member::Method(a), Member::Method(b)) => a.name == b.name && a.params == b.params,
            _ => false,
        });
        let Some(index) = clash else {
            entry.members.push(member);
            return Ok(Installed::Added);
        };
        let same_declaration = match (&entry.members[index], &member) {
            (Member::Field(a), Member::Field(b)) => Arc::ptr_eq(a, b),
            (Member::Method(a), Member::Method(b)) => a.position == b.position,
            _ => false,
        };
        if same_declaration {
            return Ok(Installed::AlreadyPresent);
        }
        Err(SymbolError::DuplicateMember {
            class: entry.name.clone(),
            member: resolve(member.name()).to_string(),
        })
    }

    pub fn complete_members(&mut self, class: &str) -> Result<(), SymbolError> {
        self.entry_mut(class)?.members_complete = true;
        Ok(())
    }

    fn entry_mut(&mut self, class: &str) -> Result<&mut ClassEntry, SymbolError> {
        self.classes
            .get_mut(class)
            .ok_or_else(|| SymbolError::UnknownClass(class.to_string()))
    }
}
