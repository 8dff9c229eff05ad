//! Multi-Source Orchestrator
//!
//! Builds every source independently (optionally in parallel), picks the target
//! mode table, folds the trees left to right through the merger and weights
//! the result once. Warnings from every stage come back as one attributed,
//! deduplicated list.

use crate::concurrency::{run_indexed, CancellationToken};
use crate::diagnostics::{Diagnostics, Warning, WarningKind};
use crate::error::{BuildError, SourceError};
use crate::merge::merge;
use crate::mode::ModeTable;
use crate::source::fs::SourceFs;
use crate::source::{build_source, BuildContext, BuildSettings, BuiltSource, Provenance};
use crate::tree::Tree;
use crate::types::SourceIndex;
use crate::weights::{calculate_weights, WeightReport};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What to build
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Sources in fold order
    pub sources: Vec<PathBuf>,
    /// Mode that overrides every source's own
    pub mode_override: Option<ModeTable>,
    /// Build independent sources on separate threads
    pub parallel: bool,
}

impl BuildRequest {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: Option<ModeTable>) -> Self {
        self.mode_override = mode;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// One fold step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldStep {
    pub index: SourceIndex,
    pub offset: i32,
    pub added: usize,
    pub updated: usize,
    pub aborted: usize,
}

/// Final tree with everything learned while building it
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub tree: Tree,
    /// Mode every source was aligned to, if one was known
    pub target_mode: Option<ModeTable>,
    /// Per-source provenance; warnings have been moved into `warnings`
    pub sources: Vec<Provenance>,
    pub steps: Vec<FoldStep>,
    pub report: WeightReport,
    pub warnings: Diagnostics,
}

/// Build, align, merge and weight every source of `request`
pub fn build_all(
    request: &BuildRequest,
    fs: &dyn SourceFs,
    settings: &BuildSettings,
    cancel: &CancellationToken,
) -> Result<BuildOutcome, BuildError> {
    if request.sources.is_empty() {
        return Err(BuildError::NoSources);
    }

    let mut settings = settings.clone();
    if request.mode_override.is_some() {
        settings.mode_hint = request.mode_override.clone();
    }
    let ctx = BuildContext::new(fs, &settings, cancel);

    info!(
        sources = request.sources.len(),
        parallel = request.parallel,
        "Building sources"
    );
    let results = run_indexed(request.sources.len(), request.parallel, |index| {
        debug!(source_index = index, path = %request.sources[index].display(), "Building source");
        build_source(&request.sources[index], &ctx)
    });

    let mut built = Vec::with_capacity(results.len());
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(source) => built.push(source),
            Err(SourceError::Cancelled) => return Err(BuildError::Cancelled),
            Err(error) => {
                return Err(BuildError::Source {
                    index,
                    path: request.sources[index].clone(),
                    error,
                })
            }
        }
    }
    if cancel.is_cancelled() {
        return Err(BuildError::Cancelled);
    }

    Ok(fold(built, request.mode_override.clone()))
}

/// Fold already-built sources left to right and weight the result
pub fn fold(built: Vec<BuiltSource>, mode_override: Option<ModeTable>) -> BuildOutcome {
    let target_mode = mode_override.or_else(|| {
        built
            .iter()
            .find_map(|source| source.provenance.native_mode.clone())
    });
    let target_rung = target_mode.as_ref().and_then(ModeTable::lowest_rung);
    let final_mode = target_mode
        .clone()
        .or_else(|| {
            built
                .first()
                .and_then(|source| source.provenance.effective_mode().cloned())
        })
        .unwrap_or_else(ModeTable::balanced_default);

    let mut warnings = Diagnostics::new();
    if target_mode.is_none() && built.len() > 1 {
        warnings.push(Warning::warn(
            WarningKind::DegradedDeterminism,
            "No source declares a global mode; sources merged at their native levels",
        ));
    }

    let mut tree = Tree::new();
    let mut sources = Vec::with_capacity(built.len());
    let mut steps = Vec::with_capacity(built.len());

    for (index, source) in built.into_iter().enumerate() {
        let BuiltSource {
            tree: incoming,
            mut provenance,
        } = source;
        let mut step_warnings = std::mem::take(&mut provenance.warnings);

        if let (Some(target), Some(own)) = (target_mode.as_ref(), provenance.effective_mode()) {
            if own != target {
                step_warnings.push(
                    Warning::warn(
                        WarningKind::ModeMismatch,
                        format!("Source mode {} aligned to target mode {}", own, target),
                    )
                    .with_path(provenance.path.display().to_string()),
                );
            }
        }

        let offset = match (target_rung, provenance.native_lowest_rung()) {
            (Some(target), Some(own)) => target as i32 - own as i32,
            _ => 0,
        };
        let outcome = merge(tree, &incoming, offset);
        tree = outcome.tree;
        step_warnings.extend(outcome.warnings);
        step_warnings.attribute(index);
        warnings.extend(step_warnings);

        info!(
            source_index = index,
            path = %provenance.path.display(),
            offset,
            added = outcome.added,
            updated = outcome.updated,
            aborted = outcome.aborted,
            "Folded source"
        );
        steps.push(FoldStep {
            index,
            offset,
            added: outcome.added,
            updated: outcome.updated,
            aborted: outcome.aborted,
        });
        sources.push(provenance);
    }

    tree.mode_table = final_mode;
    let report = calculate_weights(&mut tree);
    for path in &report.saturated {
        warnings.push(
            Warning::warn(
                WarningKind::ReservationSaturated,
                "Reservations take the whole pool; unreserved siblings get nothing",
            )
            .with_path(path.to_string()),
        );
    }
    warnings.dedup();
    if warnings.has_errors() {
        warn!(warnings = warnings.len(), "Build finished with errors");
    }
    info!(
        leaves = report.weighted_leaves,
        total = report.total,
        mode = %tree.mode_table,
        "Build complete"
    );

    BuildOutcome {
        tree,
        target_mode,
        sources,
        steps,
        report,
        warnings,
    }
}
