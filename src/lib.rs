//! Enkan: weighted selection trees
//!
//! Builds one hierarchical, weighted selection tree from structured-text
//! source files, flat path/weight lists and cached snapshots. Each source is
//! built on its own, aligned to a common mode frame, merged left to right and
//! weighted once; extraction then yields the `(path, weight)` sequence a
//! sampler draws from.

pub mod concurrency;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod logging;
pub mod merge;
pub mod mode;
pub mod orchestrator;
pub mod source;
pub mod tooling;
pub mod tree;
pub mod types;
pub mod weights;

pub use diagnostics::{Diagnostics, Severity, Warning, WarningKind};
pub use error::{BuildError, ConfigError, SourceError};
pub use extract::{extract, Extraction};
pub use mode::{ModeTable, Policy};
pub use orchestrator::{build_all, BuildOutcome, BuildRequest};
pub use tree::Tree;
pub use weights::calculate_weights;
