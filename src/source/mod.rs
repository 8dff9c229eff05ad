//! Source Builders
//!
//! Each builder turns one external source into a standalone [`Tree`] plus the
//! provenance the orchestrator needs for alignment: the source's declared
//! mode (if any), a mode inferred from its shape (if any), and the warnings
//! raised while building. Builders share nothing mutable; everything they
//! consult arrives through a [`BuildContext`].

pub mod directive;
pub mod filters;
pub mod fs;
pub mod list;
pub mod snapshot;
pub mod text;

use crate::concurrency::CancellationToken;
use crate::diagnostics::Diagnostics;
use crate::error::SourceError;
use crate::mode::ModeTable;
use crate::tree::Tree;
use crate::types::Level;
use fs::SourceFs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Which builder handles a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// `.txt` files and bare directories
    StructuredText,
    /// `.lst` path/weight lists
    FlatList,
    /// `.tree` cached snapshots
    Snapshot,
}

impl SourceKind {
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(SourceKind::StructuredText),
            "lst" => Some(SourceKind::FlatList),
            "tree" => Some(SourceKind::Snapshot),
            _ => None,
        }
    }
}

/// Mode derived from a source's shape rather than declared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredMode {
    pub table: ModeTable,
    /// 1.0 when every input line supported the inference
    pub confidence: f64,
}

/// What a builder learned about its source
#[derive(Debug, Clone)]
pub struct Provenance {
    pub kind: SourceKind,
    pub path: PathBuf,
    /// Mode declared by the source itself
    pub native_mode: Option<ModeTable>,
    pub inferred_mode: Option<InferredMode>,
    pub warnings: Diagnostics,
}

impl Provenance {
    pub fn new(kind: SourceKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            native_mode: None,
            inferred_mode: None,
            warnings: Diagnostics::new(),
        }
    }

    /// Declared mode, falling back to the inferred one
    pub fn effective_mode(&self) -> Option<&ModeTable> {
        self.native_mode
            .as_ref()
            .or(self.inferred_mode.as_ref().map(|inferred| &inferred.table))
    }

    /// Alignment anchor of this source in its own frame
    pub fn native_lowest_rung(&self) -> Option<Level> {
        self.effective_mode().and_then(ModeTable::lowest_rung)
    }
}

/// Output of one builder
#[derive(Debug, Clone)]
pub struct BuiltSource {
    pub tree: Tree,
    pub provenance: Provenance,
}

impl BuiltSource {
    /// Placeholder for a source that produced nothing usable
    pub fn empty(provenance: Provenance) -> Self {
        Self {
            tree: Tree::new(),
            provenance,
        }
    }
}

/// Media classification of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

/// Options every builder receives
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSettings {
    /// Lower-case extensions without the dot
    pub image_extensions: BTreeSet<String>,
    pub video_extensions: BTreeSet<String>,
    /// Whether videos become leaves when neither a line nor a global directive says
    pub include_video: bool,
    pub mute: bool,
    /// Mode supplied by the caller; suppresses low-confidence inference warnings
    pub mode_hint: Option<ModeTable>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            image_extensions: owned(&["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"]),
            video_extensions: owned(&["mp4", "webm", "mkv", "mov", "avi", "m4v"]),
            include_video: false,
            mute: true,
            mode_hint: None,
        }
    }
}

impl BuildSettings {
    pub fn classify(&self, path: &Path) -> MediaKind {
        let Some(ext) = path.extension() else {
            return MediaKind::Other;
        };
        let ext = ext.to_string_lossy().to_ascii_lowercase();
        if self.image_extensions.contains(&ext) {
            MediaKind::Image
        } else if self.video_extensions.contains(&ext) {
            MediaKind::Video
        } else {
            MediaKind::Other
        }
    }
}

/// Collaborators and options shared by every builder of one pipeline
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub fs: &'a dyn SourceFs,
    pub settings: &'a BuildSettings,
    pub cancel: &'a CancellationToken,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        fs: &'a dyn SourceFs,
        settings: &'a BuildSettings,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            fs,
            settings,
            cancel,
        }
    }

    pub fn check_cancelled(&self) -> Result<(), SourceError> {
        if self.cancel.is_cancelled() {
            Err(SourceError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) fn read_to_string(&self, path: &Path) -> Result<String, SourceError> {
        self.fs
            .read_to_string(path)
            .map_err(|source| SourceError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Build one source, choosing the builder by extension; directories are read
/// as a one-line structured-text source
pub fn build_source(path: &Path, ctx: &BuildContext<'_>) -> Result<BuiltSource, SourceError> {
    ctx.check_cancelled()?;
    if ctx.fs.is_dir(path) {
        let line = path.to_string_lossy().to_string();
        return text::build_from_str(path, &line, ctx);
    }
    match SourceKind::from_extension(path) {
        Some(SourceKind::StructuredText) => text::build(path, ctx),
        Some(SourceKind::FlatList) => list::build(path, ctx),
        Some(SourceKind::Snapshot) => snapshot::load(path, ctx),
        None => Err(SourceError::Unsupported(path.to_path_buf())),
    }
}
