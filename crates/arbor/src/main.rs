use anyhow::Context;
use arbor::commands::{CheckArgs, PassesArgs, run_check, run_passes};
use arbor::config::load_config;
use arbor::{OutputFormat, logging};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

/// Arbor CLI - semantic analysis over JL syntax trees
#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Runs Arbor's semantic passes over JSON syntax documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to an arbor.toml (discovered from the working directory by default)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Subcommand)]
enum Commands {
    /// Analyze syntax documents and print diagnostics and resulting trees
    Check {
        /// JSON syntax documents
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Last pass to run
        #[arg(short, long)]
        until: Option<String>,
        /// Passes to leave out (repeatable or comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        skip: Vec<String>,
        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
        /// Keep running later passes of a unit after it reports errors
        #[arg(long)]
        no_halt: bool,
        /// Maximum number of scheduling rounds
        #[arg(long)]
        max_rounds: Option<usize>,
    },
    /// List the passes in scheduling order
    Passes {
        /// Last pass to run
        #[arg(short, long)]
        until: Option<String>,
        /// Passes to leave out (repeatable or comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        skip: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stdout().is_terminal();
    match run(cli, color) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            if color {
                eprintln!("{} {err:#}", "error:".red().bold());
            } else {
                eprintln!("error: {err:#}");
            }
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli, color: bool) -> anyhow::Result<bool> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = load_config(cli.config.as_deref(), &cwd).context("Failed to load configuration")?;
    logging::init(&config.log)?;

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Commands::Check {
            files,
            until,
            skip,
            format,
            no_halt,
            max_rounds,
        } => {
            let args = CheckArgs {
                files,
                until,
                skip,
                format,
                no_halt,
                max_rounds,
                color,
            };
            run_check(&args, config, &mut stdout)
        }
        Commands::Passes { until, skip } => {
            let args = PassesArgs { until, skip, color };
            run_passes(&args, &config, &mut stdout)?;
            Ok(true)
        }
    }
}
