//! Arbor CLI Library
//!
//! This library exposes the CLI's document loading, configuration and
//! rendering for programmatic use and testing.

pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod output;

pub use config::ArborConfig;
pub use error::CliError;
pub use output::OutputFormat;
