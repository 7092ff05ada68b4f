//! Integration tests for Ripple
//!
//! These tests drive the library and the `ripple` binary on snapshot
//! documents stored on disk.

use std::path::{Path, PathBuf};
use std::process::Command;

use ripple_core::{ElementId, SnapshotDocument, WeightTable};
use tempfile::TempDir;

fn demos() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos")
}

fn ripple(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_ripple"))
        .args(args)
        .output()
        .expect("Failed to execute ripple")
}

fn load(path: &Path) -> ripple_core::Snapshot {
    SnapshotDocument::load(path).unwrap().into_snapshot().unwrap()
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_invocation() {
    let output = ripple(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Change impact analysis"));

    let output = ripple(&["version"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Ripple v"));
}

/// Test the library on the demo snapshots
#[test]
fn test_demo_comparison_through_library() {
    let previous = load(&demos().join("previous.json"));
    let current = load(&demos().join("current.json"));
    let config = ripple_core::ImpactConfig::load(&demos().join(ripple_core::CONFIG_FILE)).unwrap();

    let result = ripple_core::compare_with("demo", &previous, &current, &config).unwrap();
    let deposit = current.find("bank.Account.deposit(long)").unwrap().id();
    let record = current.find("bank.Ledger.record(bank.Account)").unwrap().id();
    let check = current.find("bank.Audit.check(bank.Ledger)").unwrap().id();
    let report = current.find("bank.Report").unwrap().id();

    assert_eq!(result.changed(), &[(deposit, deposit)]);
    assert_eq!(result.added(), &[report]);
    assert!(result.removed().is_empty());

    let scores = result.impact_scores();
    assert!((scores[record.index()] - 0.6).abs() < 1e-9);
    assert!((scores[check.index()] - 0.36).abs() < 1e-9);
    assert_eq!(result.most_impacted(5).first().map(|&(id, _)| id), Some(record));
}

/// Test the JSON report of the compare command
#[test]
fn test_compare_command_json() {
    let output = ripple(&[
        "compare",
        demos().join("previous.json").to_str().unwrap(),
        demos().join("current.json").to_str().unwrap(),
        "--json",
        "--top",
        "1",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["changed"], 1);
    assert_eq!(report["summary"]["added"], 1);
    assert_eq!(report["summary"]["impacted"], 2);
    assert_eq!(report["added"][0], "bank.Report");
    let top = report["most_impacted"].as_array().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0]["unique_name"], "bank.Ledger.record(bank.Account)");
}

/// Test that an explicit config overrides the one next to the snapshots
#[test]
fn test_compare_command_with_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("zero.toml");
    std::fs::write(&config, "[weights]\ninvocation = 0.0\nuse = 0.0\n").unwrap();

    let output = ripple(&[
        "compare",
        demos().join("previous.json").to_str().unwrap(),
        demos().join("current.json").to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--json",
    ]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["impacted"], 0);
    assert_eq!(report["most_impacted"].as_array().unwrap().len(), 0);
}

/// Test the text report and the inspect command
#[test]
fn test_text_output() {
    let output = ripple(&[
        "compare",
        demos().join("previous.json").to_str().unwrap(),
        demos().join("current.json").to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 changed"));
    assert!(stdout.contains("~ bank.Account.deposit(long)"));
    assert!(stdout.contains("+ bank.Report"));

    let output = ripple(&["inspect", demos().join("current.json").to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("bank-1.1"));
    assert!(stdout.contains("elements:     10"));

    let kinds: Vec<Vec<&str>> = stdout
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .filter(|words| words.len() == 2 && !words[0].ends_with(':') && words[1].parse::<usize>().is_ok())
        .collect();
    assert_eq!(
        kinds,
        vec![
            vec!["Root", "1"],
            vec!["Package", "1"],
            vec!["Class", "4"],
            vec!["Method", "3"],
            vec!["Field", "1"],
        ]
    );
}

/// Test that broken documents fail with a readable error
#[test]
fn test_invalid_document_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let broken = temp_dir.path().join("broken.json");
    std::fs::write(
        &broken,
        r#"{ "name": "broken", "elements": [{ "kind": "class", "qualified_name": "A", "parent": 5 }] }"#,
    )
    .unwrap();

    let output = ripple(&["inspect", broken.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid snapshot document"));

    let missing = temp_dir.path().join("missing.json");
    let output = ripple(&["inspect", missing.to_str().unwrap()]);
    assert!(!output.status.success());
}

/// Test that documents written by the library load back unchanged
#[test]
fn test_document_round_trip_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let original = load(&demos().join("previous.json"));
    let path = temp_dir.path().join("copy.json");
    std::fs::write(
        &path,
        SnapshotDocument::from_snapshot(&original).to_json_string().unwrap(),
    )
    .unwrap();

    let copy = load(&path);
    let result = ripple_core::compare("copy", &original, &copy, &WeightTable::default()).unwrap();
    assert!(!result.has_changes());
    assert_eq!(result.counterpart(ElementId(4)), Some(ElementId(4)));
}
