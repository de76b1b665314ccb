//! The reference "JL" language: its node kinds with every standard pass's
//! hooks attached.

use crate::{ascription, constants, disambiguate, imports, members, scope, simplify, typecheck};
use arbor_core::factory::TreeFactory;
use arbor_core::session::Session;
use std::rc::Rc;

/// A factory whose delegates carry the hooks of all standard passes.
pub fn factory() -> TreeFactory {
    let mut factory = TreeFactory::new();
    scope::register(&mut factory);
    imports::register(&mut factory);
    disambiguate::register(&mut factory);
    members::register(&mut factory);
    constants::register(&mut factory);
    typecheck::register(&mut factory);
    ascription::register(&mut factory);
    simplify::register(&mut factory);
    factory
}

/// A fresh compilation session over [`factory`].
pub fn session() -> Rc<Session> {
    Rc::new(Session::new(factory()))
}
