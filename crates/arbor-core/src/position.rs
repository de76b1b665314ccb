use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Source location of a node.
///
/// Line and column are 1-based; `0` means unknown. Generated nodes (for
/// example casts inserted by ascription) reuse the position of the node
/// they wrap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Arc<str>>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl Position {
    pub fn new(source: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            source: Some(source.into()),
            line,
            column,
        }
    }

    /// A position naming only the compilation unit.
    pub fn unit(source: impl Into<Arc<str>>) -> Self {
        Self::new(source, 0, 0)
    }

    pub fn is_known(&self) -> bool {
        self.source.is_some() || self.line > 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self.source.as_deref().unwrap_or("<unknown>");
        match (self.line, self.column) {
            (0, _) => write!(f, "{source}"),
            (line, 0) => write!(f, "{source}:{line}"),
            (line, column) => write!(f, "{source}:{line}:{column}"),
        }
    }
}
