//! Rendering of analysis results.

use arbor_core::diagnostics::{Diagnostic, Severity};
use arbor_core::node::{Literal, NodeKind, NodeRef, Operator};
use arbor_core::scheduler::JobStatus;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented tree outline with human-readable diagnostics
    #[default]
    Outline,
    /// One JSON object holding diagnostics and trees
    Json,
}

/// A finished (or failed) compilation unit.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub name: Arc<str>,
    pub status: JobStatus,
    pub tree: NodeRef,
}

/// Serialized view of an analyzed node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDump {
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<Literal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<Operator>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDump>,
}

impl NodeDump {
    pub fn of(node: &NodeRef) -> Self {
        Self {
            kind: node.kind(),
            name: node.name_str(),
            literal: node.literal().cloned(),
            op: node.op(),
            ty: node.ty().map(ToString::to_string),
            constant: node.constant().map(ToString::to_string),
            owner: node.owner().map(str::to_string),
            line: Some(node.position().line).filter(|line| *line > 0),
            children: node.children().iter().map(NodeDump::of).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct UnitDump {
    name: String,
    status: JobStatus,
    tree: NodeDump,
}

#[derive(Debug, Serialize)]
struct CheckDump<'a> {
    success: bool,
    rounds: usize,
    diagnostics: &'a [Diagnostic],
    units: Vec<UnitDump>,
}

/// Everything a `check` run produces.
#[derive(Debug, Clone)]
pub struct CheckOutput {
    pub rounds: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub units: Vec<UnitResult>,
}

impl CheckOutput {
    pub fn is_success(&self) -> bool {
        self.units.iter().all(|u| u.status == JobStatus::Finished)
            && !self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

pub fn render(output: &CheckOutput, format: OutputFormat, color: bool) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => render_json(output),
        OutputFormat::Outline => Ok(render_outline(output, color)),
    }
}

fn render_json(output: &CheckOutput) -> anyhow::Result<String> {
    let dump = CheckDump {
        success: output.is_success(),
        rounds: output.rounds,
        diagnostics: &output.diagnostics,
        units: output
            .units
            .iter()
            .map(|unit| UnitDump {
                name: unit.name.to_string(),
                status: unit.status,
                tree: NodeDump::of(&unit.tree),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&dump)?)
}

fn render_outline(output: &CheckOutput, color: bool) -> String {
    let mut out = String::new();
    for diagnostic in &output.diagnostics {
        out.push_str(&format_diagnostic(diagnostic, color));
        out.push('\n');
    }
    for unit in &output.units {
        let status = match unit.status {
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
            JobStatus::Pending => "pending",
        };
        let header = format!("{} ({status})", unit.name);
        if color {
            let _ = writeln!(out, "{}", header.bold());
        } else {
            let _ = writeln!(out, "{header}");
        }
        outline_node(&mut out, &unit.tree, 1);
    }
    let failed = output
        .units
        .iter()
        .filter(|u| u.status != JobStatus::Finished)
        .count();
    let errors = output.diagnostics.iter().filter(|d| d.is_error()).count();
    let _ = writeln!(
        out,
        "{} unit(s), {failed} failed, {errors} error(s) in {} round(s)",
        output.units.len(),
        output.rounds
    );
    out
}

fn outline_node(out: &mut String, node: &NodeRef, depth: usize) {
    let _ = write!(out, "{:indent$}{}", "", node.kind(), indent = depth * 2);
    if let Some(name) = node.name_str() {
        let _ = write!(out, " {name}");
    }
    if let Some(op) = node.op() {
        let _ = write!(out, " {op}");
    }
    if let Some(literal) = node.literal() {
        let _ = write!(out, " {literal}");
    }
    if let Some(owner) = node.owner() {
        let _ = write!(out, " in {owner}");
    }
    if let Some(ty) = node.ty() {
        let _ = write!(out, " : {ty}");
    }
    if let Some(value) = node.constant_value() {
        let _ = write!(out, " = {value}");
    }
    out.push('\n');
    for child in node.children() {
        outline_node(out, child, depth + 1);
    }
}

pub fn format_diagnostic(diagnostic: &Diagnostic, color: bool) -> String {
    let label = diagnostic.severity.to_string();
    let label = match (color, diagnostic.severity) {
        (false, _) => label,
        (true, Severity::Error) => label.red().bold().to_string(),
        (true, Severity::Warning) => label.yellow().bold().to_string(),
    };
    match &diagnostic.position {
        Some(position) if color => format!("{}: {label}: {}", position.dimmed(), diagnostic.message),
        Some(position) => format!("{position}: {label}: {}", diagnostic.message),
        None => format!("{label}: {}", diagnostic.message),
    }
}
