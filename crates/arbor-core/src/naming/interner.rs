use lasso::{Spur, ThreadedRodeo};
use std::sync::OnceLock;

/// Identifier table shared by every session in the process. Nodes are
/// `Send + Sync`, so the table is the thread-safe rodeo.
static NAMES: OnceLock<ThreadedRodeo> = OnceLock::new();

pub fn interner() -> &'static ThreadedRodeo {
    NAMES.get_or_init(ThreadedRodeo::new)
}

/// An interned identifier. Equal names have equal handles.
pub type Word = Spur;

pub fn intern(name: &str) -> Word {
    interner().get_or_intern(name)
}

/// The text of `word`. Interned strings live for the whole process.
pub fn resolve(word: Word) -> &'static str {
    interner().resolve(&word)
}

/// Splits a dotted name at its last segment: `a.b.C` becomes `(Some("a.b"), "C")`.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rfind('.') {
        Some(idx) => (Some(&name[..idx]), &name[idx + 1..]),
        None => (None, name),
    }
}
