//! CLI command implementations

use anyhow::Context;
use ripple_core::{
    CONFIG_FILE, DiffResult, DiffSummary, ElementId, ElementKind, ImpactConfig, Snapshot,
    SnapshotDocument,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct CompareReport {
    name: String,
    summary: DiffSummary,
    removed: Vec<String>,
    added: Vec<String>,
    changed: Vec<String>,
    most_impacted: Vec<ImpactEntry>,
}

#[derive(Debug, Serialize)]
struct ImpactEntry {
    id: ElementId,
    unique_name: String,
    score: f64,
}

pub fn compare(
    previous: &Path,
    current: &Path,
    config: Option<&Path>,
    top: usize,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(current, config)?;
    let previous = load_snapshot(previous)?;
    let current = load_snapshot(current)?;

    let name = format!("{} -> {}", previous.name(), current.name());
    let result = ripple_core::compare_with(&name, &previous, &current, &config)
        .with_context(|| format!("Failed to compare '{}'", name))?;

    let report = build_report(&result, &previous, &current, top);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

pub fn inspect(path: &Path) -> anyhow::Result<()> {
    let snapshot = load_snapshot(path)?;

    let kinds: Vec<(ElementKind, usize)> = ElementKind::ALL
        .into_iter()
        .map(|kind| (kind, snapshot.nodes_of_kind(kind).count()))
        .filter(|&(_, count)| count > 0)
        .collect();
    let declarations = snapshot
        .elements()
        .filter(|e| e.kind.is_type_declaration())
        .count();
    let members = snapshot.elements().filter(|e| e.kind.is_member()).count();

    println!("Snapshot '{}'", snapshot.name());
    println!("  elements:     {}", snapshot.len());
    println!("  declarations: {}", declarations);
    println!("  members:      {}", members);
    println!("  dependencies: {}", snapshot.dependency_count());
    println!("  types:        {}", snapshot.type_count());
    println!("  annotations:  {}", snapshot.annotation_count());
    for (kind, count) in kinds {
        println!("    {:<16} {}", format!("{:?}", kind), count);
    }
    Ok(())
}

fn load_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let document = SnapshotDocument::load(path)
        .with_context(|| format!("Failed to read snapshot document {}", path.display()))?;
    let snapshot = document
        .into_snapshot()
        .with_context(|| format!("Invalid snapshot document {}", path.display()))?;
    tracing::info!(
        "Loaded snapshot '{}' ({} elements, {} dependencies)",
        snapshot.name(),
        snapshot.len(),
        snapshot.dependency_count()
    );
    Ok(snapshot)
}

/// Explicit `--config` must exist; otherwise `ripple.toml` beside the
/// current snapshot is used when present.
fn load_config(current: &Path, explicit: Option<&Path>) -> anyhow::Result<ImpactConfig> {
    let path: PathBuf = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = current
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(CONFIG_FILE);
            if !candidate.is_file() {
                tracing::debug!("No {} found, using default weights", CONFIG_FILE);
                return Ok(ImpactConfig::default());
            }
            candidate
        }
    };
    let config = ImpactConfig::load(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    tracing::info!("Using impact config {}", path.display());
    Ok(config)
}

fn build_report(result: &DiffResult, previous: &Snapshot, current: &Snapshot, top: usize) -> CompareReport {
    let name_of = |snapshot: &Snapshot, id: ElementId| {
        snapshot
            .element(id)
            .map(|e| display_name(e.kind, &e.unique_name))
            .unwrap_or_else(|| id.to_string())
    };

    CompareReport {
        name: result.name().to_string(),
        summary: result.summary(),
        removed: result.removed().iter().map(|&id| name_of(previous, id)).collect(),
        added: result.added().iter().map(|&id| name_of(current, id)).collect(),
        changed: result.changed().iter().map(|&(_, id)| name_of(current, id)).collect(),
        most_impacted: result
            .most_impacted(top)
            .into_iter()
            .map(|(id, score)| ImpactEntry {
                id,
                unique_name: name_of(current, id),
                score,
            })
            .collect(),
    }
}

fn display_name(kind: ElementKind, unique_name: &str) -> String {
    if kind == ElementKind::Root {
        "<root>".to_string()
    } else {
        unique_name.to_string()
    }
}

fn print_report(report: &CompareReport) {
    let summary = &report.summary;
    println!("Comparison {}", report.name);
    println!(
        "  {} removed, {} added, {} changed, {} unchanged",
        summary.removed, summary.added, summary.changed, summary.unchanged
    );
    for (label, names) in [
        ("-", &report.removed),
        ("+", &report.added),
        ("~", &report.changed),
    ] {
        for name in names {
            println!("  {} {}", label, name);
        }
    }

    if report.most_impacted.is_empty() {
        println!("No element is impacted by the changes");
        return;
    }
    println!(
        "Most impacted ({} of {} impacted, max {:.4}):",
        report.most_impacted.len(),
        summary.impacted,
        summary.max_impact
    );
    for entry in &report.most_impacted {
        println!("  {:.4}  {}", entry.score, entry.unique_name);
    }
}
