//! Passes command: lists the pass pipeline

use crate::config::ArborConfig;
use anyhow::Context;
use arbor_passes::pipeline::PASS_ORDER;
use arbor_passes::select_passes;
use owo_colors::OwoColorize;
use std::io::Write;

#[derive(Debug, Clone, Default)]
pub struct PassesArgs {
    pub until: Option<String>,
    pub skip: Vec<String>,
    pub color: bool,
}

/// Run the passes command: prints every pass in scheduling order, marking
/// those the configuration leaves out.
pub fn run_passes(args: &PassesArgs, config: &ArborConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let until = args.until.as_deref().or(config.analysis.until.as_deref());
    let mut skip = config.analysis.skip.clone();
    skip.extend(args.skip.iter().cloned());

    let selected: Vec<&'static str> = select_passes(until, &skip)?
        .iter()
        .map(|pass| pass.name())
        .collect();
    for (index, name) in PASS_ORDER.iter().enumerate() {
        let line = if selected.contains(name) {
            format!("{:>2}. {name}", index + 1)
        } else if args.color {
            format!("{:>2}. {} (skipped)", index + 1, name.dimmed())
        } else {
            format!("{:>2}. {name} (skipped)", index + 1)
        };
        writeln!(out, "{line}").context("Failed to write output")?;
    }
    Ok(())
}
