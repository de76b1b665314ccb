//! Per-unit import tables.

use crate::naming::split_qualified;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The import environment of one compilation unit.
///
/// Built once per unit while the import declarations are visited in file
/// order; entries are only ever appended. Once the unit's setup pass
/// completes, the table is frozen behind an `Arc` on the source-file node
/// and shared by every declaration subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTable {
    package: Option<Arc<str>>,
    class_imports: Vec<Arc<str>>,
    package_imports: Vec<Arc<str>>,
}

impl ImportTable {
    pub fn new(package: Option<Arc<str>>) -> Self {
        Self {
            package,
            ..Default::default()
        }
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Adds `a.b.C` or, for `a.b.*`, the package `a.b`. Duplicate entries
    /// are ignored.
    pub fn add(&mut self, import: &str) {
        match import.strip_suffix(".*") {
            Some(package) => self.add_package_import(package),
            None => self.add_class_import(import),
        }
    }

    pub fn add_class_import(&mut self, class: &str) {
        if !self.class_imports.iter().any(|c| &**c == class) {
            self.class_imports.push(class.into());
        }
    }

    pub fn add_package_import(&mut self, package: &str) {
        if !self.package_imports.iter().any(|p| &**p == package) {
            self.package_imports.push(package.into());
        }
    }

    pub fn class_imports(&self) -> &[Arc<str>] {
        &self.class_imports
    }

    pub fn package_imports(&self) -> &[Arc<str>] {
        &self.package_imports
    }

    /// Qualified names a simple class name may denote. The first group
    /// (single-type imports, then the unit's own package) shadows the
    /// second (on-demand imports).
    pub fn candidates(&self, simple: &str) -> (Vec<String>, Vec<String>) {
        let mut specific: Vec<String> = self
            .class_imports
            .iter()
            .filter(|c| split_qualified(c).1 == simple)
            .map(|c| c.to_string())
            .collect();
        specific.push(qualify(self.package(), simple));
        let on_demand = self
            .package_imports
            .iter()
            .map(|p| format!("{p}.{simple}"))
            .collect();
        (specific, on_demand)
    }
}

/// Joins a package and a simple name.
pub fn qualify(package: Option<&str>, simple: &str) -> String {
    match package {
        Some(package) if !package.is_empty() => format!("{package}.{simple}"),
        _ => simple.to_string(),
    }
}
