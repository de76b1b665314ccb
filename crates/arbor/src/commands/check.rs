//! Check command: runs the semantic passes over syntax documents

use crate::config::{AnalysisSection, ArborConfig};
use crate::document::load_units;
use crate::output::{CheckOutput, OutputFormat, UnitResult, render};
use anyhow::Context;
use arbor_core::node::NodeRef;
use arbor_core::scheduler::{JobStatus, Scheduler};
use arbor_core::session::Session;
use arbor_passes::{jl, select_passes};
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use tracing::info;

/// Command-line settings of `arbor check`; unset options fall back to the
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct CheckArgs {
    pub files: Vec<PathBuf>,
    pub until: Option<String>,
    pub skip: Vec<String>,
    pub format: Option<OutputFormat>,
    pub no_halt: bool,
    pub max_rounds: Option<usize>,
    pub color: bool,
}

impl CheckArgs {
    /// Overlays the command-line options onto `config`.
    pub fn apply(&self, config: &mut ArborConfig) {
        if let Some(until) = &self.until {
            config.analysis.until = Some(until.clone());
        }
        config.analysis.skip.extend(self.skip.iter().cloned());
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.no_halt {
            config.analysis.halt_on_error = false;
        }
        if let Some(max_rounds) = self.max_rounds {
            config.analysis.max_rounds = max_rounds;
        }
    }
}

/// Runs the selected passes over every unit of `units` in one session.
pub fn analyze(
    session: &Rc<Session>,
    analysis: &AnalysisSection,
    units: Vec<(Arc<str>, NodeRef)>,
) -> anyhow::Result<CheckOutput> {
    let passes = select_passes(analysis.until.as_deref(), &analysis.skip)?;
    let mut scheduler = Scheduler::new(session.clone(), passes, analysis.scheduler());
    info!(passes = ?scheduler.pass_names(), units = units.len(), "starting analysis");

    let ids: Vec<_> = units
        .into_iter()
        .map(|(name, tree)| scheduler.add_job(name, tree))
        .collect();
    let report = scheduler.run_to_completion().context("Analysis aborted")?;
    info!(
        rounds = report.rounds,
        finished = report.finished.len(),
        failed = report.failed.len(),
        "analysis finished"
    );

    let units = ids
        .into_iter()
        .filter_map(|id| {
            let job = scheduler.job(id)?;
            Some(UnitResult {
                name: job.source().clone(),
                status: scheduler.status(id).unwrap_or(JobStatus::Pending),
                tree: job.tree().clone(),
            })
        })
        .collect();
    Ok(CheckOutput {
        rounds: report.rounds,
        diagnostics: session.errors().diagnostics(),
        units,
    })
}

/// Run the check command, writing the rendered result to `out`.
///
/// Returns whether every unit finished without errors.
pub fn run_check(args: &CheckArgs, mut config: ArborConfig, out: &mut impl Write) -> anyhow::Result<bool> {
    anyhow::ensure!(!args.files.is_empty(), "No syntax documents given");
    args.apply(&mut config);

    let session = jl::session();
    let units = load_units(&args.files, session.factory()).context("Failed to load syntax documents")?;
    let output = analyze(&session, &config.analysis, units)?;

    let rendered = render(&output, config.output.format, args.color)?;
    writeln!(out, "{}", rendered.trim_end()).context("Failed to write output")?;
    Ok(output.is_success())
}
