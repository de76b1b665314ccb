//! The JSON syntax document the CLI reads.
//!
//! ```json
//! { "units": [ { "name": "Main.jl", "tree": { "kind": "source-file", "children": [] } } ] }
//! ```
//!
//! Tree nodes carry only syntactic attributes. Semantic attributes are
//! filled in by the passes, so kinds that only passes create (`local`,
//! `field`) are rejected by the factory.

use crate::error::{CliError, Result};
use arbor_core::factory::TreeFactory;
use arbor_core::naming::intern;
use arbor_core::node::{Attrs, Flags, Literal, NodeKind, NodeRef, Operator};
use arbor_core::position::Position;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    pub units: Vec<UnitSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitSpec {
    pub name: String,
    pub tree: NodeSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<Operator>,
    #[serde(default, rename = "final", skip_serializing_if = "std::ops::Not::not")]
    pub is_final: bool,
    #[serde(default, rename = "static", skip_serializing_if = "std::ops::Not::not")]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl NodeSpec {
    /// Builds the node and its subtree through `factory`, attributing
    /// positions to `source`.
    pub fn build(&self, factory: &TreeFactory, source: &Arc<str>) -> Result<NodeRef> {
        let children = self
            .children
            .iter()
            .map(|child| child.build(factory, source))
            .collect::<Result<Vec<_>>>()?;
        let attrs = Attrs {
            name: self.name.as_deref().map(intern),
            literal: self.literal.clone(),
            op: self.op,
            flags: Flags {
                is_final: self.is_final,
                is_static: self.is_static,
            },
            ..Attrs::default()
        };
        let position = Position::new(
            source.clone(),
            self.line.unwrap_or(0),
            self.column.unwrap_or(0),
        );
        factory
            .make(self.kind, position.clone(), attrs, children)
            .map_err(|source| CliError::InvalidTree { position, source })
    }
}

impl Document {
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| CliError::Document {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Builds every unit's tree, in document order.
    pub fn build(&self, factory: &TreeFactory) -> Result<Vec<(Arc<str>, NodeRef)>> {
        self.units
            .iter()
            .map(|unit| {
                let source: Arc<str> = unit.name.as_str().into();
                let tree = unit.tree.build(factory, &source)?;
                Ok((source, tree))
            })
            .collect()
    }
}

/// Loads every document and builds its units, rejecting unit names that
/// occur more than once across all of them.
pub fn load_units(paths: &[impl AsRef<Path>], factory: &TreeFactory) -> Result<Vec<(Arc<str>, NodeRef)>> {
    let mut seen = HashSet::new();
    let mut units = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let document = Document::load(path)?;
        tracing::debug!(path = %path.display(), units = document.units.len(), "loaded syntax document");
        for (name, tree) in document.build(factory)? {
            if !seen.insert(name.clone()) {
                return Err(CliError::DuplicateUnit(name.to_string()));
            }
            units.push((name, tree));
        }
    }
    Ok(units)
}
