//! Flat-list builder
//!
//! One file per line, either `path,weight` or a bare `path`. The directory
//! structure is rebuilt from the path segments, and explicit weights travel on
//! the leaves so every branch weighs the sum of its descendants. Lists declare
//! no mode of their own; the builder infers a single weighted level and reports
//! how sure it is.

use super::{BuildContext, BuiltSource, InferredMode, Provenance, SourceKind};
use crate::diagnostics::{Warning, WarningKind};
use crate::error::SourceError;
use crate::mode::ModeTable;
use crate::tree::{CanonicalPath, LeafPayload, Tree};
use std::path::Path;
use tracing::info;

/// One parsed list line
#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub path: String,
    /// `None` for bare paths
    pub weight: Option<f64>,
    /// The weight column was present but zero or negative
    pub clamped: bool,
}

/// Parse one line. Comments and blank lines yield `None`.
///
/// The weight column is split off the last comma; when it does not parse as a
/// number the comma belongs to the file name and the line is a bare path.
pub fn parse_list_line(raw: &str) -> Option<ListEntry> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.trim_matches('"');
    let bare = ListEntry {
        path: line.to_string(),
        weight: None,
        clamped: false,
    };
    let Some((path, weight)) = line.rsplit_once(',') else {
        return Some(bare);
    };
    match weight.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Some(ListEntry {
            path: path.trim().trim_matches('"').to_string(),
            weight: Some(value),
            clamped: false,
        }),
        Ok(value) if value.is_finite() => Some(ListEntry {
            path: path.trim().trim_matches('"').to_string(),
            weight: Some(1.0),
            clamped: true,
        }),
        _ => Some(bare),
    }
}

/// Share of inference-supporting lines turned into a confidence score
pub fn inference_confidence(weighted: usize, total: usize) -> f64 {
    if total == 0 || weighted == total {
        return 1.0;
    }
    0.5 + 0.5 * (weighted as f64 / total as f64)
}

pub fn build(path: &Path, ctx: &BuildContext<'_>) -> Result<BuiltSource, SourceError> {
    ctx.check_cancelled()?;
    let contents = ctx.read_to_string(path)?;
    Ok(build_from_str(path, &contents, ctx))
}

pub fn build_from_str(origin: &Path, contents: &str, ctx: &BuildContext<'_>) -> BuiltSource {
    let mut provenance = Provenance::new(SourceKind::FlatList, origin);
    let mut tree = Tree::new();
    let mut total = 0usize;
    let mut weighted = 0usize;

    for (index, raw) in contents.lines().enumerate() {
        let Some(entry) = parse_list_line(raw) else {
            continue;
        };
        total += 1;
        if entry.weight.is_some() {
            weighted += 1;
        }
        if entry.clamped {
            provenance.warnings.push(
                Warning::warn(
                    WarningKind::InvalidWeight,
                    format!("Non-positive weight on line {} replaced by 1", index + 1),
                )
                .with_path(entry.path.clone()),
            );
        }

        let file = CanonicalPath::new(&entry.path);
        let dir = file.parent().unwrap_or_else(CanonicalPath::root);
        let parent = tree.ensure_branch(&dir);
        let mut payload = LeafPayload::new(entry.path, dir);
        payload.explicit_weight = entry.weight;
        tree.insert_leaf(parent, payload);
    }

    let confidence = inference_confidence(weighted, total);
    let inferred = InferredMode {
        table: ModeTable::weighted_single_level(),
        confidence,
    };
    if confidence < 1.0 && ctx.settings.mode_hint.is_none() {
        provenance.warnings.push(
            Warning::warn(
                WarningKind::LowConfidenceMode,
                format!(
                    "Mode {} inferred from {} of {} weighted lines (confidence {:.2})",
                    inferred.table, weighted, total, confidence
                ),
            )
            .with_path(origin.display().to_string()),
        );
    }
    if total == 0 {
        provenance.warnings.push(
            Warning::warn(WarningKind::EmptySource, "List has no entries")
                .with_path(origin.display().to_string()),
        );
    }

    tree.mode_table = inferred.table.clone();
    provenance.inferred_mode = Some(inferred);
    info!(path = %origin.display(), entries = total, weighted, "Built flat-list source");
    BuiltSource { tree, provenance }
}
