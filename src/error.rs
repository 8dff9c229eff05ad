//! Error types
//!
//! Only fatal conditions are errors. Everything recoverable is reported as a
//! [`crate::diagnostics::Warning`] and travels alongside the result instead.

use crate::types::SourceIndex;
use std::path::PathBuf;
use thiserror::Error;

/// Mode string could not be parsed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModeError {
    #[error("Empty mode string")]
    Empty,

    #[error("Invalid mode token '{token}' in '{input}'")]
    InvalidToken { input: String, token: String },

    #[error("Mode level must be at least 1, got {0}")]
    LevelZero(u32),
}

/// A bracket modifier that matches no known token
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unrecognised modifier '[{modifier}]' at line {line} ({text})")]
pub struct DirectiveError {
    pub line: usize,
    pub modifier: String,
    pub text: String,
}

/// Snapshot envelope failures
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot decode error: {0}")]
    Decode(String),

    #[error("Snapshot magic mismatch")]
    BadMagic,

    #[error("Snapshot format version {found} does not match current version {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Snapshot checksum mismatch (expected {expected}, computed {computed})")]
    ChecksumMismatch { expected: String, computed: String },

    #[error("Snapshot encode error: {0}")]
    Encode(String),
}

/// Failures while building a single source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Unable to read source '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed directive in '{path}': {error}")]
    Directive {
        path: PathBuf,
        #[source]
        error: DirectiveError,
    },

    #[error("Unsupported source '{0}'")]
    Unsupported(PathBuf),

    #[error("Source build cancelled")]
    Cancelled,
}

/// Pipeline-fatal orchestrator errors
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("No sources supplied")]
    NoSources,

    #[error("Source {index} ('{path}') failed: {error}")]
    Source {
        index: SourceIndex,
        path: PathBuf,
        #[source]
        error: SourceError,
    },

    #[error("Build cancelled")]
    Cancelled,
}

/// Configuration and logging setup errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}
