use crate::ts::TypeSystem;
use arbor_core::diagnostics::ErrorQueue;
use arbor_core::error::InternalError;
use arbor_core::factory::TreeFactory;
use arbor_core::node::NodeRef;
use arbor_core::scheduler::{Job, JobId};
use arbor_core::session::Session;
use arbor_core::traversal::{Outcome, Visitor, traverse};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, debug_span};

/// What every pass visitor carries: the job being processed and the
/// compilation's shared session.
#[derive(Debug, Clone)]
pub struct PassEnv {
    job: JobId,
    source: Arc<str>,
    session: Rc<Session>,
}

impl PassEnv {
    pub fn new(job: &Job, session: &Rc<Session>) -> Self {
        Self {
            job: job.id(),
            source: job.source().clone(),
            session: session.clone(),
        }
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn source(&self) -> &Arc<str> {
        &self.source
    }

    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }

    pub fn factory(&self) -> &TreeFactory {
        self.session.factory()
    }

    pub fn errors(&self) -> &ErrorQueue {
        self.session.errors()
    }

    pub fn types(&self) -> TypeSystem<'_> {
        TypeSystem::new(self)
    }
}

/// Runs one pass visitor over a job's tree.
pub(crate) fn run_visitor<V: Visitor>(
    pass: &'static str,
    job: &Job,
    visitor: &V,
) -> Result<Outcome<NodeRef>, InternalError> {
    let span = debug_span!("pass", pass, unit = %job.source());
    let _guard = span.enter();
    let outcome = traverse(job.tree(), visitor)?;
    if let Outcome::Deferred { missing, .. } = &outcome {
        debug!(missing = missing.len(), "pass deferred");
    }
    Ok(outcome)
}
