//! Drives the `check` command over documents written to a temp dir.

use arbor::commands::{CheckArgs, run_check};
use arbor::config::ArborConfig;
use arbor::OutputFormat;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

fn ty(name: &str) -> Value {
    json!({ "kind": "type-node", "name": name })
}

fn int(value: i32) -> Value {
    json!({ "kind": "literal", "literal": { "int": value } })
}

fn local(ty_name: &str, name: &str, init: Value) -> Value {
    json!({ "kind": "local-decl", "name": name, "children": [ty(ty_name), init] })
}

fn unit(name: &str, package: &str, imports: &[&str], class: &str, members: Vec<Value>) -> Value {
    let mut children = vec![json!({ "kind": "package-decl", "name": package })];
    children.extend(imports.iter().map(|i| json!({ "kind": "import", "name": i })));
    children.push(json!({
        "kind": "class-decl",
        "name": class,
        "children": [{ "kind": "class-body", "children": members }]
    }));
    json!({ "name": name, "tree": { "kind": "source-file", "children": children } })
}

fn method(name: &str, body: Vec<Value>) -> Value {
    json!({
        "kind": "method-decl",
        "name": name,
        "children": [ty("void"), { "kind": "block", "children": body }]
    })
}

fn write_document(dir: &Path, file: &str, units: Vec<Value>) -> anyhow::Result<PathBuf> {
    let path = dir.join(file);
    std::fs::write(&path, serde_json::to_string_pretty(&json!({ "units": units }))?)?;
    Ok(path)
}

fn check_json(args: CheckArgs, config: ArborConfig) -> anyhow::Result<(bool, Value)> {
    let args = CheckArgs {
        format: Some(OutputFormat::Json),
        ..args
    };
    let mut out = Vec::new();
    let success = run_check(&args, config, &mut out)?;
    Ok((success, serde_json::from_slice(&out)?))
}

fn collect<'a>(node: &'a Value, kind: &str, found: &mut Vec<&'a Value>) {
    if node["kind"] == kind {
        found.push(node);
    }
    if let Some(children) = node["children"].as_array() {
        for child in children {
            collect(child, kind, found);
        }
    }
}

fn nodes_of<'a>(tree: &'a Value, kind: &str) -> Vec<&'a Value> {
    let mut found = Vec::new();
    collect(tree, kind, &mut found);
    found
}

#[test]
fn test_narrowing_casts_in_json_output() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let body = vec![local("byte", "b", int(100))];
    let main = unit("Main.jl", "app", &[], "Main", vec![method("run", body)]);
    let path = write_document(dir.path(), "main.json", vec![main])?;

    let args = CheckArgs {
        files: vec![path],
        ..CheckArgs::default()
    };
    let (success, output) = check_json(args, ArborConfig::default())?;

    assert!(success, "{output}");
    assert_eq!(output["rounds"], 1);
    assert_eq!(output["units"][0]["status"], "finished");
    let casts = nodes_of(&output["units"][0]["tree"], "cast");
    assert_eq!(casts.len(), 1);
    assert_eq!(casts[0]["type"], "byte");
    assert_eq!(casts[0]["constant"], "100");
    Ok(())
}

#[test]
fn test_until_stops_before_ascription() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let body = vec![local("byte", "b", int(100))];
    let main = unit("Main.jl", "app", &[], "Main", vec![method("run", body)]);
    let path = write_document(dir.path(), "main.json", vec![main])?;

    let args = CheckArgs {
        files: vec![path],
        until: Some("typecheck".into()),
        ..CheckArgs::default()
    };
    let (success, output) = check_json(args, ArborConfig::default())?;

    assert!(success);
    let tree = &output["units"][0]["tree"];
    assert!(nodes_of(tree, "cast").is_empty());
    assert_eq!(nodes_of(tree, "literal")[0]["type"], "int");
    Ok(())
}

#[test]
fn test_units_from_separate_documents_share_a_session() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let body = vec![local("byte", "v", json!({ "kind": "name", "name": "lib.Config.LIMIT" }))];
    let main = unit("Main.jl", "app", &["lib.*"], "Main", vec![method("run", body)]);
    let limit = json!({
        "kind": "field-decl", "name": "LIMIT", "final": true, "static": true,
        "children": [ty("int"), int(42)]
    });
    let config = unit("Config.jl", "lib", &[], "Config", vec![limit]);
    let first = write_document(dir.path(), "main.json", vec![main])?;
    let second = write_document(dir.path(), "lib.json", vec![config])?;

    let args = CheckArgs {
        files: vec![first, second],
        ..CheckArgs::default()
    };
    let (success, output) = check_json(args, ArborConfig::default())?;

    assert!(success, "{output}");
    assert_eq!(output["rounds"], 2);
    let tree = &output["units"][0]["tree"];
    assert_eq!(nodes_of(tree, "field")[0]["owner"], "lib.Config");
    assert_eq!(nodes_of(tree, "cast")[0]["constant"], "42");
    Ok(())
}

#[test]
fn test_unknown_symbol_fails_with_positioned_diagnostic() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let missing = json!({ "kind": "name", "name": "y", "line": 5, "column": 17 });
    let main = unit("Main.jl", "app", &[], "Main", vec![method("run", vec![local("int", "x", missing)])]);
    let path = write_document(dir.path(), "main.json", vec![main])?;

    let args = CheckArgs {
        files: vec![path],
        ..CheckArgs::default()
    };
    let (success, output) = check_json(args, ArborConfig::default())?;

    assert!(!success);
    assert_eq!(output["success"], false);
    assert_eq!(output["units"][0]["status"], "failed");
    let diagnostics = output["diagnostics"].as_array().cloned().unwrap_or_default();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["message"], "Cannot find symbol y");
    assert_eq!(diagnostics[0]["severity"], "error");
    assert_eq!(diagnostics[0]["position"]["source"], "Main.jl");
    assert_eq!(diagnostics[0]["position"]["line"], 5);
    Ok(())
}

#[test]
fn test_outline_output_and_config_format() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let body = vec![local("byte", "b", int(100))];
    let main = unit("Main.jl", "app", &[], "Main", vec![method("run", body)]);
    let path = write_document(dir.path(), "main.json", vec![main])?;

    let config = ArborConfig::parse(
        "[analysis]\nskip = [\"ascribe\"]\n[output]\nformat = \"outline\"\n",
        Path::new("arbor.toml"),
    )?;
    let args = CheckArgs {
        files: vec![path],
        ..CheckArgs::default()
    };
    let mut out = Vec::new();
    assert!(run_check(&args, config, &mut out)?);

    let text = String::from_utf8(out)?;
    assert!(text.starts_with("Main.jl (finished)\n"), "{text}");
    assert!(text.contains("      local-decl b"), "{text}");
    assert!(text.contains("literal 100 : int = 100"), "{text}");
    assert!(!text.contains("cast"), "{text}");
    assert!(text.trim_end().ends_with("1 unit(s), 0 failed, 0 error(s) in 1 round(s)"), "{text}");
    Ok(())
}

#[test]
fn test_missing_document_is_an_error() {
    let args = CheckArgs {
        files: vec![PathBuf::from("/nonexistent/arbor/main.json")],
        ..CheckArgs::default()
    };
    let err = run_check(&args, ArborConfig::default(), &mut Vec::new()).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read /nonexistent/arbor/main.json"));
}
