//! Goals, jobs and the cooperative scheduler.
//!
//! A job is one compilation unit moving through an ordered list of
//! passes. The scheduler runs jobs in rounds; within a round each pending
//! job advances until a pass defers. A deferred pass is re-run on its
//! partial tree in a later round.
//!
//! A round makes progress when some goal is reached or some deferred
//! goal reports fewer missing dependencies than on its previous attempt.
//! After a round without progress (or when `max_rounds` is exhausted)
//! every job still waiting has its dependencies reported as unresolved
//! and is failed.

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::InternalError;
use crate::node::NodeRef;
use crate::position::Position;
use crate::session::Session;
use crate::traversal::Outcome;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A (job, pass) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Goal {
    pub job: JobId,
    pub pass: &'static str,
}

impl Goal {
    pub fn new(job: JobId, pass: &'static str) -> Self {
        Self { job, pass }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pass, self.job)
    }
}

/// What a deferred hook is waiting for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    Goal(Goal),
    /// The named pass must have run on every job.
    AllJobs(&'static str),
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Goal(goal) => write!(f, "{goal}"),
            Dependency::AllJobs(pass) => write!(f, "{pass}@*"),
        }
    }
}

/// One compilation unit and its current tree.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    source: Arc<str>,
    tree: NodeRef,
}

impl Job {
    pub fn new(id: JobId, source: impl Into<Arc<str>>, tree: NodeRef) -> Self {
        Self {
            id,
            source: source.into(),
            tree,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn source(&self) -> &Arc<str> {
        &self.source
    }

    pub fn tree(&self) -> &NodeRef {
        &self.tree
    }
}

/// A named traversal over one job's tree.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn run(&self, job: &Job, session: &Rc<Session>) -> Result<Outcome<NodeRef>, InternalError>;
}

/// Which goals have been reached, and which jobs were given up.
#[derive(Debug, Default)]
pub struct Progress {
    jobs: usize,
    reached: HashSet<Goal>,
    failed: HashSet<JobId>,
}

impl Progress {
    pub fn register_job(&mut self) -> JobId {
        self.jobs += 1;
        JobId(self.jobs - 1)
    }

    pub fn job_count(&self) -> usize {
        self.jobs
    }

    pub fn reach(&mut self, goal: Goal) {
        self.reached.insert(goal);
    }

    pub fn fail(&mut self, job: JobId) {
        self.failed.insert(job);
    }

    pub fn is_reached(&self, goal: &Goal) -> bool {
        self.reached.contains(goal)
    }

    pub fn is_failed(&self, job: JobId) -> bool {
        self.failed.contains(&job)
    }

    /// Whether `pass` is done everywhere it will ever be: reached by
    /// every job that has not failed.
    pub fn is_settled(&self, pass: &'static str) -> bool {
        (0..self.jobs)
            .map(JobId)
            .all(|job| self.is_failed(job) || self.is_reached(&Goal::new(job, pass)))
    }

    pub fn is_satisfied(&self, dependency: &Dependency) -> bool {
        match dependency {
            Dependency::Goal(goal) => self.is_reached(goal),
            Dependency::AllJobs(pass) => self.is_settled(pass),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Stop a job after the first pass that reports an error.
    pub halt_on_error: bool,
    pub max_rounds: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            halt_on_error: true,
            max_rounds: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub rounds: usize,
    pub finished: Vec<JobId>,
    pub failed: Vec<JobId>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct JobState {
    job: Job,
    next: usize,
    status: JobStatus,
    waiting: Option<Vec<Dependency>>,
    /// Error count when the current goal was first attempted. Kept across
    /// deferrals so errors reported before a retry still fail the job.
    errors_baseline: Option<usize>,
}

pub struct Scheduler {
    session: Rc<Session>,
    passes: Vec<Rc<dyn Pass>>,
    jobs: Vec<JobState>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(session: Rc<Session>, passes: Vec<Rc<dyn Pass>>, config: SchedulerConfig) -> Self {
        Self {
            session,
            passes,
            jobs: Vec::new(),
            config,
        }
    }

    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn add_job(&mut self, source: impl Into<Arc<str>>, tree: NodeRef) -> JobId {
        let id = self.session.progress_mut().register_job();
        self.jobs.push(JobState {
            job: Job::new(id, source, tree),
            next: 0,
            status: JobStatus::Pending,
            waiting: None,
            errors_baseline: None,
        });
        id
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(id.0).map(|state| &state.job)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().map(|state| &state.job)
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.jobs.get(id.0).map(|state| state.status)
    }

    /// Runs every job through every pass, retrying deferred passes until
    /// all jobs finish or fail.
    pub fn run_to_completion(&mut self) -> Result<Report, InternalError> {
        let mut rounds = 0;
        while self.jobs.iter().any(|s| s.status == JobStatus::Pending) {
            if rounds == self.config.max_rounds {
                warn!(rounds, "round limit reached");
                self.fail_waiting_jobs();
                break;
            }
            rounds += 1;
            let span = info_span!("round", round = rounds);
            let _guard = span.enter();

            let mut progressed = false;
            for index in 0..self.jobs.len() {
                if self.jobs[index].status == JobStatus::Pending {
                    progressed |= self.advance(index)?;
                }
            }
            if !progressed && self.jobs.iter().any(|s| s.status == JobStatus::Pending) {
                info!("no progress in a full round");
                self.fail_waiting_jobs();
            }
        }

        let by_status = |status| {
            self.jobs
                .iter()
                .filter(|s| s.status == status)
                .map(|s| s.job.id)
                .collect::<Vec<_>>()
        };
        Ok(Report {
            rounds,
            finished: by_status(JobStatus::Finished),
            failed: by_status(JobStatus::Failed),
        })
    }

    /// Runs passes on one job until it finishes, fails or defers.
    fn advance(&mut self, index: usize) -> Result<bool, InternalError> {
        let mut progressed = false;
        let state = &mut self.jobs[index];
        while let Some(pass) = self.passes.get(state.next).cloned() {
            let goal = Goal::new(state.job.id, pass.name());
            let errors_now = self.session.errors().error_count();
            let errors_before = *state.errors_baseline.get_or_insert(errors_now);
            debug!(%goal, source = %state.job.source, "running pass");

            let outcome = pass
                .run(&state.job, &self.session)
                .map_err(|err| err.or_at(&Position::unit(state.job.source.clone())))?;
            match outcome {
                Outcome::Complete(tree) => {
                    state.job.tree = tree;
                    state.next += 1;
                    state.waiting = None;
                    state.errors_baseline = None;
                    self.session.progress_mut().reach(goal);
                    progressed = true;
                    if self.config.halt_on_error && self.session.errors().error_count() > errors_before
                    {
                        info!(pass = pass.name(), source = %state.job.source, "job failed");
                        state.status = JobStatus::Failed;
                        self.session.progress_mut().fail(state.job.id);
                        return Ok(progressed);
                    }
                }
                Outcome::Deferred { partial, missing } => {
                    state.job.tree = partial;
                    if state.waiting.as_ref().is_some_and(|prev| missing.len() < prev.len()) {
                        progressed = true;
                    }
                    debug!(%goal, missing = missing.len(), "pass deferred");
                    state.waiting = Some(missing);
                    return Ok(progressed);
                }
            }
        }
        state.status = JobStatus::Finished;
        Ok(progressed)
    }

    fn fail_waiting_jobs(&mut self) {
        let sources: Vec<Arc<str>> = self.jobs.iter().map(|s| s.job.source.clone()).collect();
        let describe = |dependency: &Dependency| match dependency {
            Dependency::Goal(goal) => {
                let source = sources.get(goal.job.0).map(|s| &**s).unwrap_or("?");
                format!("pass `{}` of {}", goal.pass, source)
            }
            Dependency::AllJobs(pass) => format!("pass `{pass}` of every unit"),
        };

        for state in self.jobs.iter_mut().filter(|s| s.status == JobStatus::Pending) {
            let pass = self.passes.get(state.next).map(|p| p.name()).unwrap_or("?");
            for dependency in state.waiting.iter().flatten() {
                self.session.errors().report(Diagnostic::error(
                    format!(
                        "Unresolved dependency: pass `{pass}` needs {}",
                        describe(dependency)
                    ),
                    Some(Position::unit(state.job.source.clone())),
                ));
            }
            state.status = JobStatus::Failed;
            self.session.progress_mut().fail(state.job.id);
        }
    }
}
