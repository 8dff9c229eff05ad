//! Integration tests for building, merging and weighting selection trees

mod cli_contracts;
mod end_to_end;
mod merge_order;
mod snapshot_fallback;

use enkan::concurrency::CancellationToken;
use enkan::source::fs::SourceFs;
use enkan::source::BuildSettings;
use enkan::{build_all, BuildOutcome, BuildRequest, ModeTable};
use std::path::PathBuf;

pub const EPS: f64 = 1e-9;

/// Build `sources` in order with default settings
pub fn build(fs: &dyn SourceFs, sources: &[&str], mode: Option<&str>) -> BuildOutcome {
    let request = BuildRequest::new(sources.iter().map(PathBuf::from).collect())
        .with_mode(mode.map(|m| ModeTable::parse(m).unwrap()));
    build_all(
        &request,
        fs,
        &BuildSettings::default(),
        &CancellationToken::new(),
    )
    .unwrap()
}

pub fn weight(outcome: &BuildOutcome, path: &str) -> f64 {
    let id = outcome
        .tree
        .lookup_str(path)
        .unwrap_or_else(|| panic!("{} not in tree", path));
    outcome.tree.node(id).resolved_weight
}
