//! Cached-snapshot loader and writer
//!
//! A snapshot is a serialized tree inside a small envelope:
//!
//! ```text
//! magic "ENKT" | format version (u32 LE) | blake3 checksum (32 bytes) | bincode payload
//! ```
//!
//! Loading checks all three header fields before decoding. Any failure is
//! recovered by rebuilding from the sibling `.lst`, then the sibling `.txt`,
//! with a [`WarningKind::StaleSnapshot`] naming the fallback.

use super::{list, text, BuildContext, BuiltSource, Provenance, SourceKind};
use crate::diagnostics::{Diagnostics, Warning, WarningKind};
use crate::error::{SnapshotError, SourceError};
use crate::mode::ModeTable;
use crate::tree::Tree;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MAGIC: &[u8; 4] = b"ENKT";
pub const FORMAT_VERSION: u32 = 3;
const HEADER_LEN: usize = 4 + 4 + 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub tree: Tree,
    /// Mode declared by the source the tree was built from
    pub native_mode: Option<ModeTable>,
    /// RFC 3339 creation time
    pub created_at: String,
}

pub fn encode(payload: &SnapshotPayload) -> Result<Vec<u8>, SnapshotError> {
    let body = bincode::serialize(payload).map_err(|e| SnapshotError::Encode(e.to_string()))?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(blake3::hash(&body).as_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<SnapshotPayload, SnapshotError> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let found = u32::from_le_bytes(version);
    if found != FORMAT_VERSION {
        return Err(SnapshotError::VersionMismatch {
            found,
            expected: FORMAT_VERSION,
        });
    }
    let expected = &bytes[8..HEADER_LEN];
    let body = &bytes[HEADER_LEN..];
    let computed = blake3::hash(body);
    if computed.as_bytes() != expected {
        return Err(SnapshotError::ChecksumMismatch {
            expected: hex::encode(expected),
            computed: computed.to_hex().to_string(),
        });
    }
    bincode::deserialize(body).map_err(|e| SnapshotError::Decode(e.to_string()))
}

/// Serialize `tree` to `path`
pub fn write_snapshot(
    path: &Path,
    tree: &Tree,
    native_mode: Option<&ModeTable>,
) -> Result<(), SnapshotError> {
    let payload = SnapshotPayload {
        tree: tree.clone(),
        native_mode: native_mode.cloned(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    let bytes = encode(&payload)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)?;
    info!(path = %path.display(), nodes = tree.node_count(), "Wrote snapshot");
    Ok(())
}

/// Load a snapshot, rebuilding from a sibling source when it is unusable
pub fn load(path: &Path, ctx: &BuildContext<'_>) -> Result<BuiltSource, SourceError> {
    load_chained(path, ctx, &[])
}

pub(crate) fn load_chained(
    path: &Path,
    ctx: &BuildContext<'_>,
    chain: &[PathBuf],
) -> Result<BuiltSource, SourceError> {
    ctx.check_cancelled()?;
    let failure = match ctx.fs.read_bytes(path) {
        Ok(bytes) => match decode(&bytes) {
            Ok(payload) => {
                let mut provenance = Provenance::new(SourceKind::Snapshot, path);
                provenance.native_mode = payload.native_mode;
                info!(path = %path.display(), created_at = %payload.created_at, "Loaded snapshot");
                return Ok(BuiltSource {
                    tree: payload.tree,
                    provenance,
                });
            }
            Err(error) => error,
        },
        Err(error) => SnapshotError::Io(error),
    };
    warn!(path = %path.display(), error = %failure, "Snapshot unusable, rebuilding");

    for extension in ["lst", "txt"] {
        let sibling = path.with_extension(extension);
        if !ctx.fs.is_file(&sibling) {
            continue;
        }
        let mut built = if extension == "lst" {
            list::build(&sibling, ctx)?
        } else {
            text::build_chained(&sibling, ctx, chain)?
        };
        let mut warnings = Diagnostics::new();
        warnings.push(
            Warning::warn(
                WarningKind::StaleSnapshot,
                format!("{}; rebuilt from {}", failure, sibling.display()),
            )
            .with_path(path.display().to_string()),
        );
        warnings.extend(std::mem::take(&mut built.provenance.warnings));
        built.provenance.warnings = warnings;
        return Ok(built);
    }

    let mut provenance = Provenance::new(SourceKind::Snapshot, path);
    provenance.warnings.push(
        Warning::warn(
            WarningKind::StaleSnapshot,
            format!("{}; no sibling .lst or .txt to rebuild from", failure),
        )
        .with_path(path.display().to_string()),
    );
    provenance.warnings.push(
        Warning::warn(WarningKind::EmptySource, "Source produced no leaves")
            .with_path(path.display().to_string()),
    );
    Ok(BuiltSource::empty(provenance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::CancellationToken;
    use crate::source::fs::MemoryFs;
    use crate::source::BuildSettings;
    use crate::tree::hasher::fingerprint;
    use crate::tree::{CanonicalPath, LeafPayload};
    use tempfile::TempDir;

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        let dir = CanonicalPath::new("/pics/a");
        let parent = tree.ensure_branch(&dir);
        let mut payload = LeafPayload::new("/pics/a/1.jpg", dir.clone());
        payload.repeat = Some(2);
        tree.insert_leaf(parent, payload);
        tree.insert_leaf(parent, LeafPayload::new("/pics/a/2.jpg", dir));
        tree.mode_table = ModeTable::parse("b2").unwrap();
        tree
    }

    fn payload() -> SnapshotPayload {
        SnapshotPayload {
            tree: sample_tree(),
            native_mode: Some(ModeTable::parse("b2").unwrap()),
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_envelope_preserves_tree() {
        let bytes = encode(&payload()).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(fingerprint(&decoded.tree), fingerprint(&sample_tree()));
        assert_eq!(decoded.native_mode, Some(ModeTable::parse("b2").unwrap()));
    }

    #[test]
    fn test_envelope_rejections() {
        let bytes = encode(&payload()).unwrap();

        assert!(matches!(decode(b"nope"), Err(SnapshotError::BadMagic)));

        let mut wrong_version = bytes.clone();
        wrong_version[4..8].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        assert!(matches!(
            decode(&wrong_version),
            Err(SnapshotError::VersionMismatch { found, .. }) if found == FORMAT_VERSION + 1
        ));

        let mut corrupted = bytes;
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xff;
        assert!(matches!(
            decode(&corrupted),
            Err(SnapshotError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_load_valid_snapshot() {
        let mut fs = MemoryFs::new();
        fs.add_file("/cache/set.tree", encode(&payload()).unwrap());
        let settings = BuildSettings::default();
        let cancel = CancellationToken::new();
        let ctx = BuildContext::new(&fs, &settings, &cancel);

        let built = load(Path::new("/cache/set.tree"), &ctx).unwrap();
        assert_eq!(built.provenance.kind, SourceKind::Snapshot);
        assert!(built.provenance.warnings.is_empty());
        assert_eq!(built.provenance.native_lowest_rung(), Some(2));
        assert_eq!(built.tree.leaf_count(), 2);
    }

    #[test]
    fn test_stale_snapshot_falls_back_to_list() {
        let mut fs = MemoryFs::new();
        fs.add_file("/cache/set.tree", b"ENKT\x01\x00\x00\x00".to_vec());
        fs.add_file("/cache/set.lst", "/pics/a/1.jpg,2\n");
        fs.add_file("/cache/set.txt", "/pics/b\n");
        let settings = BuildSettings::default();
        let cancel = CancellationToken::new();
        let ctx = BuildContext::new(&fs, &settings, &cancel);

        let built = load(Path::new("/cache/set.tree"), &ctx).unwrap();
        assert_eq!(built.provenance.kind, SourceKind::FlatList);
        assert_eq!(built.provenance.warnings.count(WarningKind::StaleSnapshot), 1);
        assert!(built.tree.lookup_str("/pics/a/1.jpg").is_some());
    }

    #[test]
    fn test_stale_snapshot_falls_back_to_text() {
        let mut fs = MemoryFs::with_files(["/pics/b/1.jpg"]);
        fs.add_file("/cache/set.txt", "/pics/b\n");
        let settings = BuildSettings::default();
        let cancel = CancellationToken::new();
        let ctx = BuildContext::new(&fs, &settings, &cancel);

        let built = load(Path::new("/cache/set.tree"), &ctx).unwrap();
        assert_eq!(built.provenance.kind, SourceKind::StructuredText);
        assert_eq!(built.provenance.warnings.count(WarningKind::StaleSnapshot), 1);
        assert_eq!(built.tree.leaf_count(), 1);
    }

    #[test]
    fn test_missing_everything_yields_empty_source() {
        let fs = MemoryFs::new();
        let settings = BuildSettings::default();
        let cancel = CancellationToken::new();
        let ctx = BuildContext::new(&fs, &settings, &cancel);

        let built = load(Path::new("/cache/none.tree"), &ctx).unwrap();
        assert_eq!(built.tree.leaf_count(), 0);
        assert_eq!(built.provenance.warnings.count(WarningKind::StaleSnapshot), 1);
        assert_eq!(built.provenance.warnings.count(WarningKind::EmptySource), 1);
    }

    #[test]
    fn test_write_then_load_from_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("set.tree");
        let tree = sample_tree();
        write_snapshot(&path, &tree, tree.defaults.mode.as_ref()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(fingerprint(&decoded.tree), fingerprint(&tree));
        assert!(chrono::DateTime::parse_from_rfc3339(&decoded.created_at).is_ok());
    }
}
