//! `arbor.toml` loading.
//!
//! Every section and field is optional; a missing file behaves like an
//! empty one.

use crate::output::OutputFormat;
use arbor_core::scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "arbor.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Root configuration from arbor.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArborConfig {
    pub analysis: AnalysisSection,
    pub output: OutputSection,
    pub log: LogSection,
}

/// [analysis] section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSection {
    /// Last pass to run
    pub until: Option<String>,
    /// Stop a unit after the first pass that reports an error
    pub halt_on_error: bool,
    pub max_rounds: usize,
    /// Passes to leave out
    pub skip: Vec<String>,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            until: None,
            halt_on_error: scheduler.halt_on_error,
            max_rounds: scheduler.max_rounds,
            skip: Vec::new(),
        }
    }
}

impl AnalysisSection {
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            halt_on_error: self.halt_on_error,
            max_rounds: self.max_rounds,
        }
    }
}

/// [output] section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub format: OutputFormat,
}

/// [log] section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    /// Filter directive used when `ARBOR_LOG` is unset
    pub level: String,
    /// Emit log records as JSON lines
    pub json: bool,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl ArborConfig {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }
}

/// Walk up directory tree to find arbor.toml
pub fn discover_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    None
}

/// Loads `explicit` if given, else the nearest arbor.toml above
/// `start_dir`, else the defaults.
pub fn load_config(explicit: Option<&Path>, start_dir: &Path) -> Result<ArborConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match discover_config(start_dir) {
            Some(path) => path,
            None => {
                tracing::debug!(dir = %start_dir.display(), "no arbor.toml found, using defaults");
                return Ok(ArborConfig::default());
            }
        },
    };
    tracing::debug!(path = %path.display(), "loading configuration");
    ArborConfig::load(&path)
}
