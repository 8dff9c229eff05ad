//! Structured-text builder
//!
//! Works in three phases. Phase one reads every line, following nested
//! `.txt` references through an explicit stack, and gathers entries, filters,
//! globals and groups. Phase two expands each entry against the filesystem,
//! one directory at a time. Phase three folds in nested `.lst` and `.tree`
//! sources. Only the outermost file's `*` lines are honoured.

use super::directive::{parse_line, Directive, Modifier, Target};
use super::filters::{Filters, Verdict};
use super::{list, snapshot, BuildContext, BuiltSource, MediaKind, Provenance, SourceKind};
use crate::diagnostics::{Diagnostics, Severity, Warning, WarningKind};
use crate::error::SourceError;
use crate::merge;
use crate::mode::ModeTable;
use crate::tree::{CanonicalPath, GroupBundle, LeafPayload, MediaFlags, Tree, TreeDefaults};
use crate::types::NodeId;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A path line waiting for expansion
#[derive(Debug, Clone)]
struct PendingEntry {
    path: PathBuf,
    modifiers: Vec<Modifier>,
}

/// A nested `.lst` / `.tree` reference and the files open when it was seen
#[derive(Debug, Clone)]
struct NestedSource {
    path: PathBuf,
    chain: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct Collected {
    entries: Vec<PendingEntry>,
    nested: Vec<NestedSource>,
    filters: Filters,
    groups: BTreeMap<String, GroupBundle>,
    defaults: TreeDefaults,
}

struct Frame {
    path: PathBuf,
    lines: Vec<String>,
    next: usize,
    top_level: bool,
}

impl Frame {
    fn new(path: PathBuf, contents: &str, top_level: bool) -> Self {
        Self {
            path,
            lines: contents.lines().map(str::to_string).collect(),
            next: 0,
            top_level,
        }
    }
}

/// Build a tree from a structured-text file
pub fn build(path: &Path, ctx: &BuildContext<'_>) -> Result<BuiltSource, SourceError> {
    build_chained(path, ctx, &[])
}

/// Build from in-memory contents; relative paths resolve against `origin`
pub fn build_from_str(
    origin: &Path,
    contents: &str,
    ctx: &BuildContext<'_>,
) -> Result<BuiltSource, SourceError> {
    let provenance = Provenance::new(SourceKind::StructuredText, origin);
    build_inner(origin, contents, ctx, &[], provenance)
}

/// Build while `chain` lists the structured-text files already being expanded
pub(crate) fn build_chained(
    path: &Path,
    ctx: &BuildContext<'_>,
    chain: &[PathBuf],
) -> Result<BuiltSource, SourceError> {
    let mut provenance = Provenance::new(SourceKind::StructuredText, path);
    if chain.iter().any(|open| open == path) {
        provenance.warnings.push(
            Warning::warn(WarningKind::NestedCycle, "Source refers back to itself")
                .with_path(path.display().to_string()),
        );
        return Ok(BuiltSource::empty(provenance));
    }
    let contents = ctx.read_to_string(path)?;
    build_inner(path, &contents, ctx, chain, provenance)
}

fn build_inner(
    origin: &Path,
    contents: &str,
    ctx: &BuildContext<'_>,
    chain: &[PathBuf],
    mut provenance: Provenance,
) -> Result<BuiltSource, SourceError> {
    let mut warnings = Diagnostics::new();
    let collected = collect(origin, contents, ctx, chain, &mut warnings)?;

    let mut tree = Tree::new();
    tree.defaults = collected.defaults.clone();
    tree.groups = collected.groups.clone();
    expand(&mut tree, &collected, ctx, &mut warnings)?;

    let grouped: Vec<NodeId> = tree
        .preorder()
        .into_iter()
        .filter(|id| tree.node(*id).group_name.is_some())
        .collect();
    for id in grouped {
        tree.apply_group(id);
    }

    for nested in &collected.nested {
        ctx.check_cancelled()?;
        if !ctx.fs.exists(&nested.path) {
            warnings.push(
                Warning::warn(WarningKind::MissingPath, "Nested source not found")
                    .with_path(nested.path.display().to_string()),
            );
            continue;
        }
        let built = match SourceKind::from_extension(&nested.path) {
            Some(SourceKind::Snapshot) => {
                snapshot::load_chained(&nested.path, ctx, &nested.chain)?
            }
            _ => list::build(&nested.path, ctx)?,
        };
        debug!(path = %nested.path.display(), "Folding nested source");
        warnings.extend(built.provenance.warnings);
        let outcome = merge::merge(tree, &built.tree, 0);
        warnings.extend(outcome.warnings);
        tree = outcome.tree;
    }

    provenance.native_mode = tree.defaults.mode.clone();
    tree.mode_table = provenance
        .native_mode
        .clone()
        .or_else(|| ctx.settings.mode_hint.clone())
        .unwrap_or_else(ModeTable::balanced_default);

    let leaves = tree.leaf_count();
    if leaves == 0 {
        warnings.push(
            Warning::warn(WarningKind::EmptySource, "Source produced no leaves")
                .with_path(origin.display().to_string()),
        );
    }
    info!(path = %origin.display(), leaves, "Built structured-text source");

    provenance.warnings.extend(warnings);
    Ok(BuiltSource { tree, provenance })
}

/// Phase one: parse lines, following nested text files
fn collect(
    origin: &Path,
    contents: &str,
    ctx: &BuildContext<'_>,
    chain: &[PathBuf],
    warnings: &mut Diagnostics,
) -> Result<Collected, SourceError> {
    let mut collected = Collected::default();
    let mut active: Vec<PathBuf> = chain.to_vec();
    active.push(origin.to_path_buf());
    let mut stack = vec![Frame::new(origin.to_path_buf(), contents, true)];

    loop {
        let Some(frame) = stack.last_mut() else {
            break;
        };
        if frame.next >= frame.lines.len() {
            stack.pop();
            active.pop();
            continue;
        }
        let line = frame.next + 1;
        let raw = frame.lines[frame.next].clone();
        frame.next += 1;
        let top_level = frame.top_level;
        let file = frame.path.clone();
        let location = format!("{}:{}", file.display(), line);

        let directive = parse_line(&raw, line).map_err(|error| SourceError::Directive {
            path: file.clone(),
            error,
        })?;
        let Some(directive) = directive else {
            continue;
        };

        match directive {
            Directive::Random => collected.defaults.random = true,
            Directive::Include(keyword) => collected.filters.include(keyword),
            Directive::Exclude(keyword) => collected.filters.exclude(&keyword),
            Directive::Entry {
                modifiers,
                target: Target::Global,
            } => {
                if top_level {
                    apply_global(&mut collected, modifiers, &location, warnings);
                } else {
                    warnings.push(
                        Warning::new(
                            WarningKind::IgnoredModifier,
                            Severity::Info,
                            "Global directive in nested source ignored",
                        )
                        .with_path(location),
                    );
                }
            }
            Directive::Entry {
                modifiers,
                target: Target::Path(raw_path),
            } => {
                let resolved = resolve(&file, &raw_path, ctx);
                let kind = SourceKind::from_extension(&resolved);
                if kind.is_some() && !modifiers.is_empty() {
                    warnings.push(
                        Warning::warn(
                            WarningKind::IgnoredModifier,
                            "Modifiers on a nested source reference have no effect",
                        )
                        .with_path(location.clone()),
                    );
                }
                match kind {
                    Some(SourceKind::StructuredText) => {
                        if active.contains(&resolved) {
                            warnings.push(
                                Warning::warn(
                                    WarningKind::NestedCycle,
                                    "Nested source refers back to a file being expanded",
                                )
                                .with_path(resolved.display().to_string()),
                            );
                            continue;
                        }
                        let text = match ctx.fs.read_to_string(&resolved) {
                            Ok(text) => text,
                            Err(_) => {
                                warnings.push(
                                    Warning::warn(WarningKind::MissingPath, "Nested source not found")
                                        .with_path(resolved.display().to_string()),
                                );
                                continue;
                            }
                        };
                        debug!(path = %resolved.display(), "Entering nested source");
                        active.push(resolved.clone());
                        stack.push(Frame::new(resolved, &text, false));
                    }
                    Some(_) => collected.nested.push(NestedSource {
                        path: resolved,
                        chain: active.clone(),
                    }),
                    None => collected.entries.push(PendingEntry {
                        path: resolved,
                        modifiers,
                    }),
                }
            }
        }
    }

    Ok(collected)
}

/// Relative paths resolve against the directory of the file that names them
fn resolve(file: &Path, raw: &str, ctx: &BuildContext<'_>) -> PathBuf {
    let candidate = PathBuf::from(raw);
    if candidate.is_absolute() || raw.starts_with('/') || ctx.fs.exists(&candidate) {
        return candidate;
    }
    let base = if ctx.fs.is_dir(file) {
        file.to_path_buf()
    } else {
        file.parent().map(Path::to_path_buf).unwrap_or_default()
    };
    base.join(candidate)
}

/// A `*` line: a group bundle when it names a group, tree defaults otherwise
fn apply_global(
    collected: &mut Collected,
    modifiers: Vec<Modifier>,
    location: &str,
    warnings: &mut Diagnostics,
) {
    let group = modifiers.iter().find_map(|m| match m {
        Modifier::Group(name) => Some(name.clone()),
        _ => None,
    });

    if let Some(name) = group {
        let mut bundle = GroupBundle::default();
        for modifier in modifiers {
            match modifier {
                Modifier::Reservation(percent) => bundle.user_proportion = Some(percent),
                Modifier::Multiplier(factor) => bundle.weight_modifier = Some(factor),
                Modifier::Repeat(count) => bundle.weight_modifier = Some(count as f64),
                Modifier::Mode(table) => bundle.mode = Some(table),
                Modifier::Graft(level) => bundle.graft_level = Some(level),
                Modifier::Group(_) => {}
                other => ignored(warnings, &other, location),
            }
        }
        collected.groups.insert(name, bundle);
        return;
    }

    let defaults = &mut collected.defaults;
    for modifier in modifiers {
        match modifier {
            Modifier::Mode(table) => {
                defaults.mode = Some(match defaults.mode.take() {
                    Some(existing) => existing.overlay(&table),
                    None => table,
                });
            }
            Modifier::Video(on) => defaults.include_video = Some(on),
            Modifier::Mute(on) => defaults.mute = Some(on),
            Modifier::NoRecurse => defaults.dont_recurse = true,
            other => ignored(warnings, &other, location),
        }
    }
}

fn ignored(warnings: &mut Diagnostics, modifier: &Modifier, location: &str) {
    warnings.push(
        Warning::warn(
            WarningKind::IgnoredModifier,
            format!("Modifier {:?} has no effect here", modifier),
        )
        .with_path(location.to_string()),
    );
}

/// Phase two: expand entries against the filesystem
fn expand(
    tree: &mut Tree,
    collected: &Collected,
    ctx: &BuildContext<'_>,
    warnings: &mut Diagnostics,
) -> Result<(), SourceError> {
    let mut excluded = BTreeSet::new();
    // Directories first so single-file lines refine leaves regardless of line order
    let (dirs, rest): (Vec<&PendingEntry>, Vec<&PendingEntry>) = collected
        .entries
        .iter()
        .partition(|entry| ctx.fs.is_dir(&entry.path));
    for entry in dirs {
        expand_directory(tree, entry, collected, ctx, &mut excluded, warnings)?;
    }
    for entry in rest {
        if ctx.fs.is_file(&entry.path) {
            add_file(tree, entry, collected, ctx, &mut excluded, warnings);
        } else {
            warnings.push(
                Warning::warn(WarningKind::MissingPath, "Path does not exist")
                    .with_path(entry.path.display().to_string()),
            );
        }
    }
    for path in excluded {
        warnings.push(
            Warning::new(WarningKind::Excluded, Severity::Info, "Removed by path exclusion")
                .with_path(path.to_string()),
        );
    }
    Ok(())
}

/// Per-entry media flags and whether videos count as leaves
fn media_policy(
    entry: &PendingEntry,
    collected: &Collected,
    ctx: &BuildContext<'_>,
) -> (MediaFlags, bool) {
    let mut flags = MediaFlags::default();
    for modifier in &entry.modifiers {
        match modifier {
            Modifier::Video(on) => flags.force_video = Some(*on),
            Modifier::Mute(on) => flags.mute = Some(*on),
            _ => {}
        }
    }
    let allow_video = flags
        .force_video
        .or(collected.defaults.include_video)
        .unwrap_or(ctx.settings.include_video);
    (flags, allow_video)
}

fn is_media(kind: MediaKind, allow_video: bool) -> bool {
    match kind {
        MediaKind::Image => true,
        MediaKind::Video => allow_video,
        MediaKind::Other => false,
    }
}

fn expand_directory(
    tree: &mut Tree,
    entry: &PendingEntry,
    collected: &Collected,
    ctx: &BuildContext<'_>,
    excluded: &mut BTreeSet<CanonicalPath>,
    warnings: &mut Diagnostics,
) -> Result<(), SourceError> {
    let filters = &collected.filters;
    let root = CanonicalPath::from_path(&entry.path);
    match filters.check_dir(&root) {
        Verdict::Keep => {}
        Verdict::Excluded => {
            excluded.insert(root);
            return Ok(());
        }
        Verdict::Filtered => {
            warnings.push(
                Warning::warn(WarningKind::FilteredEmpty, "Directory removed by filters")
                    .with_path(root.to_string()),
            );
            return Ok(());
        }
    }

    ctx.check_cancelled()?;
    let node = tree.ensure_branch(&root);
    apply_modifiers(tree, node, &entry.modifiers, &root, warnings);

    let recurse = !(tree.node(node).recurse_limit || collected.defaults.dont_recurse);
    let (media, allow_video) = media_policy(entry, collected, ctx);
    let mut seen = 0usize;
    let mut kept = 0usize;
    let mut pending = vec![entry.path.clone()];

    while let Some(dir) = pending.pop() {
        ctx.check_cancelled()?;
        let listing = ctx.fs.list_dir(&dir).map_err(|source| SourceError::Io {
            path: dir.clone(),
            source,
        })?;
        let dir_path = CanonicalPath::from_path(&dir);

        let mut leaves = Vec::new();
        for file in &listing.files {
            if !is_media(ctx.settings.classify(file), allow_video) {
                continue;
            }
            seen += 1;
            let file_path = CanonicalPath::from_path(file);
            match filters.check_file(&file_path) {
                Verdict::Keep => {}
                Verdict::Excluded => {
                    excluded.insert(file_path);
                    continue;
                }
                Verdict::Filtered => continue,
            }
            let mut payload = LeafPayload::new(file.to_string_lossy(), dir_path.clone());
            payload.media = media;
            leaves.push(payload);
        }

        // Commit the whole directory at once
        kept += leaves.len();
        if !leaves.is_empty() {
            let parent = tree.ensure_branch(&dir_path);
            for payload in leaves {
                tree.insert_leaf(parent, payload);
            }
        }

        if recurse {
            for sub in listing.dirs.iter().rev() {
                let sub_path = CanonicalPath::from_path(sub);
                match filters.check_dir(&sub_path) {
                    Verdict::Keep => pending.push(sub.clone()),
                    Verdict::Excluded => {
                        excluded.insert(sub_path);
                    }
                    Verdict::Filtered => {}
                }
            }
        }
    }

    if seen > 0 && kept == 0 {
        warnings.push(
            Warning::warn(
                WarningKind::FilteredEmpty,
                "Every file under this branch was filtered out",
            )
            .with_path(root.to_string()),
        );
    }
    debug!(path = %root, kept, "Expanded directory entry");
    Ok(())
}

fn add_file(
    tree: &mut Tree,
    entry: &PendingEntry,
    collected: &Collected,
    ctx: &BuildContext<'_>,
    excluded: &mut BTreeSet<CanonicalPath>,
    warnings: &mut Diagnostics,
) {
    let path = CanonicalPath::from_path(&entry.path);
    let (media, allow_video) = media_policy(entry, collected, ctx);
    if !is_media(ctx.settings.classify(&entry.path), allow_video) {
        warnings.push(
            Warning::new(WarningKind::MissingPath, Severity::Info, "Not an image or video file")
                .with_path(path.to_string()),
        );
        return;
    }
    match collected.filters.check_file(&path) {
        Verdict::Keep => {}
        Verdict::Excluded => {
            excluded.insert(path);
            return;
        }
        Verdict::Filtered => return,
    }
    let dir = path.parent().unwrap_or_else(CanonicalPath::root);
    let parent = tree.ensure_branch(&dir);
    let mut payload = LeafPayload::new(entry.path.to_string_lossy(), dir);
    payload.media = media;
    let id = tree.insert_leaf(parent, payload);
    apply_modifiers(tree, id, &entry.modifiers, &path, warnings);
}

/// Translate line modifiers into node attributes, in precedence order
fn apply_modifiers(
    tree: &mut Tree,
    id: NodeId,
    modifiers: &[Modifier],
    path: &CanonicalPath,
    warnings: &mut Diagnostics,
) {
    let is_leaf = tree.node(id).is_leaf();
    for modifier in modifiers {
        let node = tree.node_mut(id);
        match modifier {
            Modifier::Reservation(percent) => node.user_proportion = Some(*percent),
            Modifier::Multiplier(factor) => node.weight_modifier = Some(*factor),
            Modifier::Repeat(count) => match node.leaf.as_mut() {
                Some(leaf) => leaf.repeat = Some((*count).max(1)),
                None => node.weight_modifier = Some(*count as f64),
            },
            Modifier::Mode(table) => node.mode_override = Some(table.clone()),
            Modifier::Video(on) => node.media.force_video = Some(*on),
            Modifier::Mute(on) => node.media.mute = Some(*on),
            Modifier::Graft(_)
            | Modifier::Group(_)
            | Modifier::Flatten
            | Modifier::NoRecurse
                if is_leaf =>
            {
                ignored(warnings, modifier, path.as_str());
            }
            Modifier::Graft(level) => node.graft_level = Some(*level),
            Modifier::Group(name) => node.group_name = Some(name.clone()),
            Modifier::Flatten => node.flatten = true,
            Modifier::NoRecurse => node.recurse_limit = true,
        }
    }
}
