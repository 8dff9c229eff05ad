//! Text output for build results.

use crate::diagnostics::{Diagnostics, Severity};
use crate::mode::{skew_exponent, ModeTable, Policy};
use crate::orchestrator::BuildOutcome;
use crate::tree::Tree;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Section heading in bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// One line per warning, severity colored.
pub fn format_warnings(warnings: &Diagnostics) -> String {
    let mut out = String::new();
    for warning in warnings.iter() {
        let line = warning.to_string();
        let colored = match warning.severity {
            Severity::Error => line.red().to_string(),
            Severity::Warning => line.yellow().to_string(),
            Severity::Info => line.dimmed().to_string(),
        };
        out.push_str(&colored);
        out.push('\n');
    }
    out
}

/// Weighted branches at the lowest rung, heaviest first.
pub fn format_rung_table(tree: &Tree) -> String {
    let rung = tree.lowest_balanced_rung().unwrap_or(1) as i64;
    let mut rows: Vec<(String, usize, f64)> = tree
        .preorder()
        .into_iter()
        .filter(|id| {
            let node = tree.node(*id);
            !node.is_leaf() && node.resolved_weight > 0.0 && tree.effective_depth(*id) == rung
        })
        .map(|id| {
            let node = tree.node(id);
            (
                node.canonical_path.to_string(),
                tree.leaves_under(id).len(),
                node.resolved_weight,
            )
        })
        .collect();
    rows.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Leaves", "Share"]);
    for (path, leaves, weight) in rows {
        table.add_row(vec![path, leaves.to_string(), format!("{:.2}%", weight * 100.0)]);
    }
    table.to_string()
}

/// Build summary: sources, fold steps, totals, warnings.
pub fn format_build_text(outcome: &BuildOutcome, fingerprint: &str, summary: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Sources")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Source", "Mode", "Offset", "Added", "Updated", "Aborted"]);
    for (provenance, step) in outcome.sources.iter().zip(&outcome.steps) {
        let mode = provenance
            .effective_mode()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            step.index.to_string(),
            provenance.path.display().to_string(),
            mode,
            step.offset.to_string(),
            step.added.to_string(),
            step.updated.to_string(),
            step.aborted.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n\n", table));

    if summary {
        out.push_str(&format!("{}\n\n", format_section_heading("Rung shares")));
        out.push_str(&format!("{}\n\n", format_rung_table(&outcome.tree)));
    }

    out.push_str(&format!("  Mode: {}\n", outcome.tree.mode_table));
    out.push_str(&format!("  Leaves: {}\n", outcome.report.weighted_leaves));
    out.push_str(&format!("  Total weight: {:.6}\n", outcome.report.total));
    out.push_str(&format!("  Fingerprint: {}\n", fingerprint));

    if !outcome.warnings.is_empty() {
        out.push_str(&format!("\n{}\n\n", format_section_heading("Warnings")));
        out.push_str(&format_warnings(&outcome.warnings));
    }
    out
}

/// Level-by-level explanation of a mode table.
pub fn format_mode_table(table: &ModeTable) -> String {
    let mut out = Table::new();
    out.load_preset(UTF8_BORDERS_ONLY);
    out.set_header(vec!["Level", "Policy", "Skew", "Exponent"]);
    for (level, policy) in table.iter() {
        let row = match policy {
            Policy::Balanced => vec![
                level.to_string(),
                "balanced".to_string(),
                "-".to_string(),
                "-".to_string(),
            ],
            Policy::Weighted { skew } => vec![
                level.to_string(),
                "weighted".to_string(),
                skew.to_string(),
                format!("{:.3}", skew_exponent(skew)),
            ],
        };
        out.add_row(row);
    }
    format!(
        "{}\nLowest rung: {}\n",
        out,
        table
            .lowest_rung()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string())
    )
}
