use std::fs;
use std::path::{Path, PathBuf};

use enkan::config::EnkanConfig;
use enkan::tooling::cli::{CliContext, Commands};
use tempfile::TempDir;

fn picture_dirs(root: &Path) -> (PathBuf, PathBuf) {
    let a = root.join("a");
    let b = root.join("b");
    fs::create_dir_all(&a).unwrap();
    fs::create_dir_all(&b).unwrap();
    fs::write(a.join("1.jpg"), b"").unwrap();
    fs::write(a.join("2.jpg"), b"").unwrap();
    fs::write(b.join("1.jpg"), b"").unwrap();
    (a, b)
}

fn build_command(inputs: Vec<PathBuf>, mode: Option<&str>, format: &str) -> Commands {
    Commands::Build {
        inputs,
        mode: mode.map(str::to_string),
        output_list: None,
        output_tree: None,
        summary: true,
        sequential: true,
        format: format.to_string(),
    }
}

#[test]
fn build_json_contract_has_required_fields() {
    let temp_dir = TempDir::new().unwrap();
    let (a, b) = picture_dirs(temp_dir.path());

    let cli = CliContext::with_config(EnkanConfig::default());
    let output = cli
        .execute(&build_command(vec![a, b], None, "json"))
        .unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert!(parsed.get("mode").and_then(|v| v.as_str()).is_some());
    assert_eq!(parsed.get("leaves").and_then(|v| v.as_u64()), Some(3));
    let total = parsed.get("total").and_then(|v| v.as_f64()).unwrap();
    assert!((total - 1.0).abs() < 1e-9);
    let fingerprint = parsed.get("fingerprint").and_then(|v| v.as_str()).unwrap();
    assert_eq!(fingerprint.len(), 64);
    let warnings = parsed.get("warnings").and_then(|v| v.as_array()).unwrap();
    assert!(warnings
        .iter()
        .any(|w| w.get("kind").and_then(|k| k.as_str()) == Some("DegradedDeterminism")));
}

#[test]
fn build_text_output_lists_sources_and_summary() {
    let temp_dir = TempDir::new().unwrap();
    let (a, _) = picture_dirs(temp_dir.path());

    let cli = CliContext::with_config(EnkanConfig::default());
    let output = cli
        .execute(&build_command(vec![a.clone()], Some("b1"), "text"))
        .unwrap();

    assert!(output.contains("Sources"));
    assert!(output.contains("Rung shares"));
    assert!(output.contains(&a.display().to_string()));
    assert!(output.contains("Mode: b1"));
    assert!(output.contains("Leaves: 2"));
}

#[test]
fn mode_from_config_applies_without_flag() {
    let temp_dir = TempDir::new().unwrap();
    let (a, b) = picture_dirs(temp_dir.path());

    let config = EnkanConfig {
        mode: Some("w1".to_string()),
        ..EnkanConfig::default()
    };
    let cli = CliContext::with_config(config);
    let output = cli
        .execute(&build_command(vec![a, b], None, "json"))
        .unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed.get("mode").and_then(|v| v.as_str()), Some("w1"));
    let warnings = parsed.get("warnings").and_then(|v| v.as_array()).unwrap();
    assert!(warnings.is_empty());
}

#[test]
fn invalid_inputs_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let (a, _) = picture_dirs(temp_dir.path());
    let cli = CliContext::with_config(EnkanConfig::default());

    assert!(cli
        .execute(&build_command(vec![a.clone()], None, "yaml"))
        .is_err());
    assert!(cli
        .execute(&build_command(vec![a], Some("q9"), "text"))
        .is_err());
}

#[test]
fn written_list_feeds_a_later_build() {
    let temp_dir = TempDir::new().unwrap();
    let (a, _) = picture_dirs(temp_dir.path());
    let list = temp_dir.path().join("out").join("weights.lst");

    let cli = CliContext::with_config(EnkanConfig::default());
    cli.execute(&Commands::Build {
        inputs: vec![a],
        mode: None,
        output_list: Some(list.clone()),
        output_tree: None,
        summary: false,
        sequential: true,
        format: "text".to_string(),
    })
    .unwrap();

    let output = cli
        .execute(&build_command(vec![list], None, "json"))
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed.get("leaves").and_then(|v| v.as_u64()), Some(2));
}
