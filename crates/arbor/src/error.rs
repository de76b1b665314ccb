//! Errors raised before analysis starts.

use arbor_core::error::FactoryError;
use arbor_core::position::Position;
use arbor_passes::PipelineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse syntax document {}", .path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid tree at {position}: {source}")]
    InvalidTree {
        position: Position,
        #[source]
        source: FactoryError,
    },

    #[error("Compilation unit `{0}` is defined more than once")]
    DuplicateUnit(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
