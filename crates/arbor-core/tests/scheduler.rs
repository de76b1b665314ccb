use arbor_core::diagnostics::{Diagnostic, DiagnosticSink};
use arbor_core::error::InternalError;
use arbor_core::prelude::*;
use arbor_core::scheduler::{JobStatus, Scheduler, SchedulerConfig};
use std::cell::RefCell;
use std::rc::Rc;

type Body = dyn Fn(&Job, &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError>;

struct FnPass {
    name: &'static str,
    body: Box<Body>,
}

impl Pass for FnPass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, job: &Job, session: &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError> {
        (self.body)(job, session)
    }
}

fn pass(
    name: &'static str,
    body: impl Fn(&Job, &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError> + 'static,
) -> Rc<dyn Pass> {
    Rc::new(FnPass {
        name,
        body: Box::new(body),
    })
}

fn complete(job: &Job) -> Result<Outcome<NodeRef>, InternalError> {
    Ok(Outcome::Complete(job.tree().clone()))
}

/// Completes once `dependency` is reached, deferring until then.
fn wait_for(job: &Job, session: &Rc<Session>, dependency: Dependency) -> Result<Outcome<NodeRef>, InternalError> {
    if session.progress().is_satisfied(&dependency) {
        complete(job)
    } else {
        Ok(Outcome::Deferred {
            partial: job.tree().clone(),
            missing: vec![dependency],
        })
    }
}

fn empty_tree(session: &Session) -> NodeRef {
    session
        .factory()
        .make(NodeKind::SourceFile, Position::default(), Attrs::default(), vec![])
        .unwrap()
}

fn scheduler(passes: Vec<Rc<dyn Pass>>, units: usize) -> Scheduler {
    let session = Rc::new(Session::new(TreeFactory::new()));
    let mut scheduler = Scheduler::new(session.clone(), passes, SchedulerConfig::default());
    for i in 0..units {
        scheduler.add_job(format!("U{i}.jl"), empty_tree(&session));
    }
    scheduler
}

#[test]
fn cross_unit_dependency_is_retried_in_the_next_round() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let trace = log.clone();
    let passes = vec![
        pass("register", |job, _| complete(job)),
        pass("link", move |job, session| {
            trace.borrow_mut().push(job.id());
            let other = JobId(1 - job.id().0);
            wait_for(job, session, Dependency::Goal(Goal::new(other, "register")))
        }),
    ];

    let mut scheduler = scheduler(passes, 2);
    let report = scheduler.run_to_completion().unwrap();

    assert!(report.is_success());
    assert_eq!(report.rounds, 2);
    assert_eq!(report.finished, vec![JobId(0), JobId(1)]);
    assert_eq!(*log.borrow(), vec![JobId(0), JobId(1), JobId(0)]);
}

#[test]
fn all_jobs_dependency_waits_for_every_unit() {
    let passes = vec![
        pass("declare", |job, _| complete(job)),
        pass("resolve", |job, session| {
            wait_for(job, session, Dependency::AllJobs("declare"))
        }),
    ];

    let mut scheduler = scheduler(passes, 3);
    let report = scheduler.run_to_completion().unwrap();
    assert!(report.is_success());
    assert_eq!(report.finished.len(), 3);
}

#[test]
fn cycle_is_reported_after_a_round_without_progress() {
    let passes = vec![pass("constants", |job, session| {
        let other = JobId(1 - job.id().0);
        wait_for(job, session, Dependency::Goal(Goal::new(other, "constants")))
    })];

    let mut scheduler = scheduler(passes, 2);
    let report = scheduler.run_to_completion().unwrap();

    assert_eq!(report.failed, vec![JobId(0), JobId(1)]);
    assert_eq!(report.rounds, 1);
    let diagnostics = scheduler.session().errors().diagnostics();
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(
        diagnostics[0].message,
        "Unresolved dependency: pass `constants` needs pass `constants` of U1.jl"
    );
    assert_eq!(diagnostics[0].position, Some(Position::unit("U0.jl")));
}

#[test]
fn round_limit_is_a_hard_ceiling() {
    // Each retry reports one fewer missing dependency, which counts as
    // progress, but the limit stops it.
    let attempts = Rc::new(RefCell::new(100usize));
    let counter = attempts.clone();
    let passes = vec![pass("start", |job, _| complete(job)), pass("slow", move |job, _| {
        let mut left = counter.borrow_mut();
        *left -= 1;
        Ok(Outcome::Deferred {
            partial: job.tree().clone(),
            missing: (0..*left).map(|i| Dependency::Goal(Goal::new(JobId(i), "x"))).collect(),
        })
    })];

    let session = Rc::new(Session::new(TreeFactory::new()));
    let config = SchedulerConfig {
        halt_on_error: true,
        max_rounds: 3,
    };
    let mut scheduler = Scheduler::new(session.clone(), passes, config);
    let id = scheduler.add_job("Slow.jl", empty_tree(&session));

    let report = scheduler.run_to_completion().unwrap();
    assert_eq!(report.rounds, 3);
    assert_eq!(scheduler.status(id), Some(JobStatus::Failed));
    assert_eq!(*attempts.borrow(), 97);
}

#[test]
fn errors_stop_the_job_when_halting() {
    let ran_second = Rc::new(RefCell::new(false));
    let flag = ran_second.clone();
    let passes = vec![
        pass("check", |job, session| {
            session
                .errors()
                .report(Diagnostic::error("bad", Some(Position::unit(job.source().clone()))));
            complete(job)
        }),
        pass("emit", move |job, _| {
            *flag.borrow_mut() = true;
            complete(job)
        }),
    ];

    let mut scheduler = scheduler(passes, 1);
    let report = scheduler.run_to_completion().unwrap();
    assert_eq!(report.failed, vec![JobId(0)]);
    assert!(!*ran_second.borrow());
    assert!(scheduler.session().progress().is_settled("emit"));
}

#[test]
fn internal_errors_propagate_with_unit_position() {
    let passes = vec![pass("broken", |_, _| Err(InternalError::new("bad state")))];
    let mut scheduler = scheduler(passes, 1);
    let err = scheduler.run_to_completion().unwrap_err();
    assert_eq!(err.position, Some(Position::unit("U0.jl")));
}
