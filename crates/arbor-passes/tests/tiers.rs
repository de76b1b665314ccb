mod common;

use arbor_core::prelude::*;
use arbor_core::scheduler::{Scheduler, SchedulerConfig};
use arbor_passes::disambiguate::{Disambiguator, Tier};
use arbor_passes::{jl, select_passes};
use common::Builder;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<(Tier, NodeKind)>>>;

/// Records every node a disambiguation tier enters, then defers to the
/// hooks it replaced.
struct Recorder {
    inner: Option<Arc<dyn Hooks<Disambiguator>>>,
    log: Log,
}

impl Hooks<Disambiguator> for Recorder {
    fn override_node(
        &self,
        parent: Option<&NodeRef>,
        node: &NodeRef,
        v: &Disambiguator,
    ) -> Step<Option<NodeRef>> {
        match &self.inner {
            Some(inner) => inner.override_node(parent, node, v),
            None => Ok(None),
        }
    }

    fn enter(&self, parent: Option<&NodeRef>, node: &NodeRef, v: &Disambiguator) -> Step<Descend<Disambiguator>> {
        self.log.lock().unwrap().push((v.tier(), node.kind()));
        match &self.inner {
            Some(inner) => inner.enter(parent, node, v),
            None => Ok(Descend::default()),
        }
    }

    fn leave(
        &self,
        parent: Option<&NodeRef>,
        old: &NodeRef,
        node: NodeRef,
        v: &Disambiguator,
        inner_v: &Disambiguator,
    ) -> Step<NodeRef> {
        match &self.inner {
            Some(inner) => inner.leave(parent, old, node, v, inner_v),
            None => Ok(node),
        }
    }
}

fn recording_session(log: &Log) -> Rc<Session> {
    let mut factory = jl::factory();
    for kind in NodeKind::ALL {
        let inner = factory.delegate(kind).hooks::<dyn Hooks<Disambiguator>>().cloned();
        let recorder = Recorder {
            inner,
            log: log.clone(),
        };
        factory.register::<dyn Hooks<Disambiguator>>(kind, Arc::new(recorder));
    }
    Rc::new(Session::new(factory))
}

fn entered(log: &Log, tier: Tier) -> Vec<NodeKind> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|(t, _)| *t == tier)
        .map(|(_, kind)| *kind)
        .collect()
}

#[test]
fn tiers_widen_their_reach() {
    let log = Log::default();
    let session = recording_session(&log);
    let b = Builder::new(&session, "Main.jl");
    let size = b.field("int", "size", Some(b.int(3)));
    let body = vec![b.local("int", "n", Some(b.name("size")))];
    let grow = b.method("int", "grow", &[("int", "by")], body);
    let unit = b.unit(None, &[], vec![b.class("Main", Some("Object"), vec![size, grow])]);

    let passes = select_passes(Some("disambiguate"), &[]).unwrap();
    let mut scheduler = Scheduler::new(session.clone(), passes, SchedulerConfig::default());
    scheduler.add_job("Main.jl", unit);
    let report = scheduler.run_to_completion().unwrap();
    assert!(report.is_success());

    let outer = entered(&log, Tier::Outer);
    assert!(outer.contains(&NodeKind::ClassDecl));
    assert!(outer.contains(&NodeKind::TypeNode));
    for member in [NodeKind::FieldDecl, NodeKind::MethodDecl, NodeKind::Block, NodeKind::Literal] {
        assert!(!outer.contains(&member), "outer tier entered {member}");
    }

    let signatures = entered(&log, Tier::Signatures);
    for kind in [NodeKind::FieldDecl, NodeKind::MethodDecl, NodeKind::Formal] {
        assert!(signatures.contains(&kind), "signature tier skipped {kind}");
    }
    for kind in [NodeKind::Block, NodeKind::LocalDecl, NodeKind::Literal, NodeKind::Name] {
        assert!(!signatures.contains(&kind), "signature tier entered {kind}");
    }

    let full = entered(&log, Tier::Full);
    for kind in [NodeKind::Block, NodeKind::LocalDecl, NodeKind::Literal, NodeKind::Name] {
        assert!(full.contains(&kind), "full tier skipped {kind}");
    }
}

#[test]
fn extensions_keep_the_replaced_behavior() {
    let log = Log::default();
    let session = recording_session(&log);
    let b = Builder::new(&session, "Main.jl");
    let body = vec![b.local("int", "n", Some(b.int(1))), b.eval(b.name("n"))];
    let unit = b.unit(None, &[], vec![b.class("Main", None, vec![b.method("void", "run", &[], body)])]);

    let passes = select_passes(Some("disambiguate"), &[]).unwrap();
    let mut scheduler = Scheduler::new(session.clone(), passes, SchedulerConfig::default());
    let id = scheduler.add_job("Main.jl", unit);
    assert!(scheduler.run_to_completion().unwrap().is_success());

    let tree = scheduler.job(id).unwrap().tree().clone();
    let local = common::find(&tree, NodeKind::Local);
    assert_eq!(local.name_str(), Some("n"));
    assert_eq!(arbor_passes::ambiguity_count(&tree), 0);
}
