//! State shared by all jobs of one compilation.

use crate::diagnostics::ErrorQueue;
use crate::factory::TreeFactory;
use crate::scheduler::Progress;
use crate::symbols::SymbolTable;
use std::cell::{Ref, RefCell, RefMut};

/// The symbol store, diagnostics, factory and goal progress of one
/// compilation, shared by `Rc` between the scheduler and the passes.
///
/// Borrows of the interior cells must not be held across a call into
/// another pass or hook.
#[derive(Debug, Default)]
pub struct Session {
    factory: TreeFactory,
    symbols: RefCell<SymbolTable>,
    errors: ErrorQueue,
    progress: RefCell<Progress>,
}

impl Session {
    pub fn new(factory: TreeFactory) -> Self {
        Self {
            factory,
            ..Default::default()
        }
    }

    pub fn factory(&self) -> &TreeFactory {
        &self.factory
    }

    pub fn symbols(&self) -> Ref<'_, SymbolTable> {
        self.symbols.borrow()
    }

    pub fn symbols_mut(&self) -> RefMut<'_, SymbolTable> {
        self.symbols.borrow_mut()
    }

    pub fn errors(&self) -> &ErrorQueue {
        &self.errors
    }

    pub fn progress(&self) -> Ref<'_, Progress> {
        self.progress.borrow()
    }

    pub fn progress_mut(&self) -> RefMut<'_, Progress> {
        self.progress.borrow_mut()
    }
}
