//! Interned identifiers.
//!
//! Names in the tree (classes, members, locals, labels) are interned once
//! and compared by handle afterwards.

pub mod interner;

pub use interner::{Word, intern, interner, resolve, split_qualified};
