//! Per-kind hook tables.
//!
//! A [`Delegate`] maps a hook *trait* (for instance `dyn Hooks<TypeChecker>`
//! or a language's scope facet) to the implementation a node kind supplies
//! for it. The walker only ever asks "does this kind have hooks of type
//! `H`?"; a missing entry means default behavior.

use crate::node::NodeKind;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Delegate {
    kind: NodeKind,
    hooks: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Delegate {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            hooks: HashMap::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Registers (or replaces) the implementation of hook trait `H`.
    pub fn with<H>(mut self, hook: Arc<H>) -> Self
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.set(hook);
        self
    }

    pub fn set<H>(&mut self, hook: Arc<H>)
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.hooks.insert(TypeId::of::<H>(), Arc::new(hook));
    }

    pub fn remove<H: ?Sized + 'static>(&mut self) -> bool {
        self.hooks.remove(&TypeId::of::<H>()).is_some()
    }

    /// The implementation of hook trait `H`, if this kind supplies one.
    pub fn hooks<H: ?Sized + 'static>(&self) -> Option<&Arc<H>> {
        self.hooks
            .get(&TypeId::of::<H>())
            .and_then(|entry| entry.downcast_ref::<Arc<H>>())
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("kind", &self.kind)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Describe: Send + Sync {
        fn describe(&self) -> &'static str;
    }

    struct Plain;
    impl Describe for Plain {
        fn describe(&self) -> &'static str {
            "plain"
        }
    }

    struct Fancy;
    impl Describe for Fancy {
        fn describe(&self) -> &'static str {
            "fancy"
        }
    }

    #[test]
    fn lookup_by_hook_trait() {
        let delegate = Delegate::new(NodeKind::Block).with::<dyn Describe>(Arc::new(Plain));
        let hook = delegate.hooks::<dyn Describe>().map(|h| h.describe());
        assert_eq!(hook, Some("plain"));
        assert!(delegate.hooks::<String>().is_none());
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut delegate = Delegate::new(NodeKind::Block).with::<dyn Describe>(Arc::new(Plain));
        delegate.set::<dyn Describe>(Arc::new(Fancy));
        assert_eq!(delegate.len(), 1);
        assert_eq!(
            delegate.hooks::<dyn Describe>().map(|h| h.describe()),
            Some("fancy")
        );
        assert!(delegate.remove::<dyn Describe>());
        assert!(delegate.is_empty());
    }
}
