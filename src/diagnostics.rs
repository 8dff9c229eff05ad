//! Build diagnostics
//!
//! Non-fatal issues raised by builders, the merger and the orchestrator. They are
//! accumulated instead of thrown, each tagged with the source that caused it, and
//! surfaced to the caller as one list once the whole build completes.

use crate::types::SourceIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// Cached snapshot was stale or unreadable and the sibling source was rebuilt
    StaleSnapshot,
    /// Mode table was inferred rather than declared
    LowConfidenceMode,
    /// Incoming tree declares a different mode table than the merge target
    ModeMismatch,
    /// A graft would place content above the first meaningful level
    GraftRungViolation,
    /// No global mode anywhere; sources merged at their native levels
    DegradedDeterminism,
    /// Reservations consumed the whole pool
    ReservationSaturated,
    /// Every file beneath a branch was filtered away
    FilteredEmpty,
    /// Entity removed by an exact-path exclusion
    Excluded,
    /// Path on a source line does not exist
    MissingPath,
    /// Nested source reference refers back to a file already being expanded
    NestedCycle,
    /// Modifiers written on a line where they have no effect
    IgnoredModifier,
    /// Flat-list line with an unusable weight column
    InvalidWeight,
    /// Source produced no leaves at all
    EmptySource,
    /// A path is a leaf in one merged tree and a branch in the other
    PathConflict,
}

/// One attributed diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_index: Option<SourceIndex>,
}

impl Warning {
    pub fn new(kind: WarningKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            path: None,
            source_index: None,
        }
    }

    pub fn warn(kind: WarningKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    pub fn error(kind: WarningKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, message)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach the originating source unless one is already recorded
    pub fn with_source(mut self, index: SourceIndex) -> Self {
        if self.source_index.is_none() {
            self.source_index = Some(index);
        }
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.source_index {
            Some(index) => write!(f, "[{}] source {}: {}", level, index, self.message)?,
            None => write!(f, "[{}] {}", level, self.message)?,
        }
        if let Some(ref path) = self.path {
            write!(f, " ({})", path)?;
        }
        Ok(())
    }
}

/// Ordered warning accumulator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        self.warnings.extend(warnings);
    }

    /// Tag every warning that has no source yet
    pub fn attribute(&mut self, index: SourceIndex) {
        for warning in &mut self.warnings {
            if warning.source_index.is_none() {
                warning.source_index = Some(index);
            }
        }
    }

    /// Drop exact repeats, keeping the first occurrence
    pub fn dedup(&mut self) {
        let mut seen = HashSet::new();
        self.warnings.retain(|w| seen.insert(w.clone()));
    }

    pub fn has_errors(&self) -> bool {
        self.warnings.iter().any(|w| w.severity == Severity::Error)
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.warnings
    }
}

impl IntoIterator for Diagnostics {
    type Item = Warning;
    type IntoIter = std::vec::IntoIter<Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.warnings.into_iter()
    }
}
