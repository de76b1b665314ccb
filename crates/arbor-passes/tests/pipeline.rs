mod common;

use arbor_core::prelude::*;
use arbor_core::scheduler::{JobStatus, Scheduler, SchedulerConfig};
use arbor_core::types::{ConstValue, Type};
use arbor_passes::{ambiguity_count, standard_passes};
use common::{Builder, compile, find, messages, nodes, session};
use std::rc::Rc;

fn narrowing_unit(b: &Builder) -> NodeRef {
    let body = vec![
        b.local("byte", "b", Some(b.int(100))),
        b.final_local("int", "k", Some(b.int(5))),
        b.local("byte", "f", Some(b.name("k"))),
        b.local("short", "s", Some(b.name("b"))),
    ];
    let run = b.method("void", "run", &[], body);
    b.unit(Some("app"), &[], vec![b.class("Main", None, vec![run])])
}

#[test]
fn fitting_constants_are_narrowed() {
    let session = session();
    let b = Builder::new(&session, "Main.jl");
    let (scheduler, report) = compile(&session, vec![("Main.jl", narrowing_unit(&b))]);

    assert!(report.is_success(), "{:?}", messages(&session));
    let tree = scheduler.jobs().next().unwrap().tree().clone();
    let casts: Vec<NodeRef> = nodes(&tree)
        .into_iter()
        .filter(|n| n.kind() == NodeKind::Cast)
        .collect();
    assert_eq!(casts.len(), 2);

    let literal = &casts[0];
    assert_eq!(literal.ty(), Some(&Type::Byte));
    assert_eq!(literal.constant_value(), Some(&ConstValue::Int(100)));
    assert_eq!(literal.child(1).unwrap().literal(), Some(&Literal::Int(100)));

    let local = &casts[1];
    assert_eq!(local.child(1).unwrap().kind(), NodeKind::Local);
    assert_eq!(local.constant_value(), Some(&ConstValue::Int(5)));
}

#[test]
fn resolved_trees_have_no_ambiguities_left() {
    let session = session();
    let b = Builder::new(&session, "Main.jl");
    let unit = narrowing_unit(&b);
    assert_eq!(ambiguity_count(&unit), 7);

    let (scheduler, _) = compile(&session, vec![("Main.jl", unit)]);
    let tree = scheduler.jobs().next().unwrap().tree().clone();
    assert_eq!(ambiguity_count(&tree), 0);
}

#[test]
fn non_constant_initializers_are_left_alone() {
    let session = session();
    let b = Builder::new(&session, "Main.jl");
    let body = vec![
        b.local("int", "i", Some(b.int(5))),
        b.local("byte", "bad", Some(b.name("i"))),
    ];
    let unit = b.unit(None, &[], vec![b.class("Main", None, vec![b.method("void", "run", &[], body)])]);

    let config = SchedulerConfig {
        halt_on_error: false,
        ..SchedulerConfig::default()
    };
    let mut scheduler = Scheduler::new(session.clone(), standard_passes(), config);
    scheduler.add_job("Main.jl", unit);
    let report = scheduler.run_to_completion().unwrap();

    assert_eq!(report.finished.len(), 1);
    assert_eq!(
        messages(&session),
        vec![r#"The type of the variable initializer "int" does not match that of the declaration "byte"."#]
    );
    let tree = scheduler.jobs().next().unwrap().tree().clone();
    assert!(nodes(&tree).iter().all(|n| n.kind() != NodeKind::Cast));
}

#[test]
fn unknown_names_fail_the_job() {
    let session = session();
    let b = Builder::new(&session, "Main.jl");
    let missing = b.name("y");
    let line = missing.position().line;
    let body = vec![b.local("int", "x", Some(missing))];
    let unit = b.unit(None, &[], vec![b.class("Main", None, vec![b.method("void", "run", &[], body)])]);

    let (scheduler, report) = compile(&session, vec![("Main.jl", unit)]);

    assert_eq!(report.failed, vec![JobId(0)]);
    assert_eq!(scheduler.status(JobId(0)), Some(JobStatus::Failed));
    let diagnostics = session.errors().diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message, "Cannot find symbol y");
    assert_eq!(diagnostics[0].position.as_ref().map(|p| p.line), Some(line));
}

/// `app.Main` reads a constant of `lib.Config`, which is registered by a
/// unit scheduled after it.
#[test]
fn cross_unit_references_converge() {
    let session = session();
    let a = Builder::new(&session, "Main.jl");
    let body = vec![a.local("byte", "v", Some(a.name("lib.Config.LIMIT")))];
    let main = a.unit(
        Some("app"),
        &["lib.*"],
        vec![a.class("Main", None, vec![a.method("void", "run", &[], body)])],
    );

    let b = Builder::new(&session, "Config.jl");
    let limit = b.final_field("int", "LIMIT", Some(b.int(42)));
    let config = b.unit(Some("lib"), &[], vec![b.class("Config", None, vec![limit])]);

    let (scheduler, report) = compile(&session, vec![("Main.jl", main), ("Config.jl", config)]);

    assert!(report.is_success(), "{:?}", messages(&session));
    assert_eq!(report.rounds, 2);
    let tree = scheduler.job(JobId(0)).unwrap().tree().clone();
    let field = find(&tree, NodeKind::Field);
    assert_eq!(field.owner(), Some("lib.Config"));
    let cast = find(&tree, NodeKind::Cast);
    assert_eq!(cast.constant_value(), Some(&ConstValue::Int(42)));
}

#[test]
fn cyclic_constants_are_reported() {
    let session = session();
    let a = Builder::new(&session, "A.jl");
    let x = a.final_field("int", "X", Some(a.name("b.B.Y")));
    let unit_a = a.unit(Some("a"), &[], vec![a.class("A", None, vec![x])]);

    let b = Builder::new(&session, "B.jl");
    let y = b.final_field("int", "Y", Some(b.name("a.A.X")));
    let unit_b = b.unit(Some("b"), &[], vec![b.class("B", None, vec![y])]);

    let (_, report) = compile(&session, vec![("A.jl", unit_a), ("B.jl", unit_b)]);

    assert_eq!(report.failed, vec![JobId(0), JobId(1)]);
    assert_eq!(report.rounds, 3);
    assert_eq!(
        messages(&session),
        vec![
            "Unresolved dependency: pass `constants` needs pass `constants` of B.jl",
            "Unresolved dependency: pass `constants` needs pass `constants` of A.jl",
        ]
    );
}

#[test]
fn superclass_fields_are_found() {
    let session = session();
    let b = Builder::new(&session, "Shapes.jl");
    let base = b.class("Shape", None, vec![b.field("int", "sides", None)]);
    let body = vec![b.eval(b.assign(b.name("sides"), b.int(4)))];
    let square = b.class("Square", Some("Shape"), vec![b.method("void", "init", &[], body)]);
    let unit = b.unit(Some("geo"), &[], vec![base, square]);

    let (scheduler, report) = compile(&session, vec![("Shapes.jl", unit)]);

    assert!(report.is_success(), "{:?}", messages(&session));
    let tree = scheduler.jobs().next().unwrap().tree().clone();
    let field = find(&tree, NodeKind::Field);
    assert_eq!(field.owner(), Some("geo.Shape"));
    assert_eq!(find(&tree, NodeKind::Assign).ty(), Some(&Type::Int));
}

fn order_units(session: &Rc<Session>, reader_first: bool) -> Vec<(&'static str, NodeRef)> {
    let a = Builder::new(session, "A.jl");
    let body = vec![
        a.local("int", "x", Some(a.name("missing"))),
        a.local("int", "z", Some(a.name("b.B.f"))),
    ];
    let reader = a.unit(Some("a"), &[], vec![a.class("A", None, vec![a.method("void", "run", &[], body)])]);

    let b = Builder::new(session, "B.jl");
    let owner = b.unit(Some("b"), &[], vec![b.class("B", None, vec![b.field("int", "f", None)])]);

    if reader_first {
        vec![("A.jl", reader), ("B.jl", owner)]
    } else {
        vec![("B.jl", owner), ("A.jl", reader)]
    }
}

/// An error reported before a deferral still fails the job once the
/// retried pass completes.
#[test]
fn errors_before_a_deferral_fail_the_job() {
    let direct = session();
    let (scheduler, _) = compile(&direct, order_units(&direct, false));
    assert_eq!(scheduler.status(JobId(1)), Some(JobStatus::Failed));

    let retried = session();
    let (scheduler, report) = compile(&retried, order_units(&retried, true));
    assert_eq!(scheduler.status(JobId(0)), Some(JobStatus::Failed));
    assert_eq!(report.failed, vec![JobId(0)]);
    assert_eq!(messages(&retried), messages(&direct));
    assert_eq!(messages(&retried), vec!["Cannot find symbol missing"]);
}
