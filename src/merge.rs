//! Tree Merger
//!
//! Folds one tree into another. The base keeps structural identity: a path it
//! already owns stays where it is. The incoming tree wins on content and
//! weighting for each path it names, and only for that exact path; other paths
//! aliased into the same node keep what they had. Every level in the incoming
//! tree is moved by `graft_offset` so both trees share one mode frame.

use crate::diagnostics::{Diagnostics, Warning, WarningKind};
use crate::tree::{CanonicalPath, GroupBundle, Tree};
use crate::types::{Level, NodeId};
use tracing::{debug, warn};

/// Result of one fold step
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub tree: Tree,
    pub warnings: Diagnostics,
    /// Nodes created in the base
    pub added: usize,
    /// Base nodes that took content or attributes from the incoming tree
    pub updated: usize,
    /// Incoming branches dropped for landing above level 1 or for a
    /// leaf/branch conflict
    pub aborted: usize,
}

/// Move a level by `offset`, refusing anything below level 1
pub fn shift_level(level: Level, offset: i32) -> Option<Level> {
    let moved = level as i64 + offset as i64;
    (moved >= 1).then_some(moved as Level)
}

/// Merge `incoming` into `base`. `base` is consumed; use the returned tree.
pub fn merge(mut base: Tree, incoming: &Tree, graft_offset: i32) -> MergeOutcome {
    let mut warnings = Diagnostics::new();
    let mut added = 0usize;
    let mut updated = 0usize;
    let mut aborted = 0usize;

    let incoming_depths = incoming.effective_depths();
    let mut mapped: Vec<Option<NodeId>> = vec![None; incoming.arena_len()];
    mapped[NodeId::ROOT.index()] = Some(NodeId::ROOT);

    for id in incoming.preorder() {
        if id == NodeId::ROOT {
            continue;
        }
        let node = incoming.node(id);
        let Some(parent) = node.parent.and_then(|p| mapped[p.index()]) else {
            // An ancestor was aborted or skipped
            continue;
        };

        let graft = match node.graft_level {
            Some(level) => match shift_level(level, graft_offset) {
                Some(shifted) => Some(shifted),
                None => {
                    aborted += 1;
                    warnings.push(rung_violation(&node.canonical_path, graft_offset));
                    continue;
                }
            },
            None => None,
        };
        let mode_override = match &node.mode_override {
            Some(table) => match table.shifted(graft_offset) {
                Some(shifted) => Some(shifted),
                None => {
                    aborted += 1;
                    warnings.push(rung_violation(&node.canonical_path, graft_offset));
                    continue;
                }
            },
            None => None,
        };

        let path = &node.canonical_path;
        if let Some(existing) = base.lookup(path) {
            if base.node(existing).is_leaf() != node.is_leaf() {
                warn!(path = %path, "Leaf and branch share a path; keeping the base entry");
                aborted += 1;
                warnings.push(
                    Warning::warn(
                        WarningKind::PathConflict,
                        "Leaf and branch share this path; incoming entry and its contents skipped",
                    )
                    .with_path(path.to_string()),
                );
                continue;
            }
            let target = base.node_mut(existing);
            if let Some(proportion) = node.user_proportion {
                target.user_proportion = Some(proportion);
            }
            if let Some(modifier) = node.weight_modifier {
                target.weight_modifier = Some(modifier);
            }
            if graft.is_some() {
                target.graft_level = graft;
            }
            if let Some(ref group) = node.group_name {
                target.group_name = Some(group.clone());
            }
            if mode_override.is_some() {
                target.mode_override = mode_override;
            }
            target.flatten |= node.flatten;
            target.recurse_limit |= node.recurse_limit;
            target.media = node.media.or(target.media);
            if target.canonical_path == *path {
                if let Some(ref leaf) = node.leaf {
                    target.leaf = Some(leaf.clone());
                }
            }
            register_contributors(&mut base, existing, node.contributors.iter());
            mapped[id.index()] = Some(existing);
            updated += 1;
            continue;
        }

        let created = base.add_child(parent, path.clone());
        if base.node(created).canonical_path != *path {
            // Name already taken beneath the mapped parent: fold into that node
            base.alias(path.clone(), created);
            if !node.is_leaf() && !base.node(created).is_leaf() {
                mapped[id.index()] = Some(created);
            }
            register_contributors(&mut base, created, node.contributors.iter());
            updated += 1;
            continue;
        }

        let target_depth = incoming_depths[id.index()].unwrap_or(0) + graft_offset as i64;
        let shift = match graft {
            Some(_) => node.depth_shift as i64,
            None => target_depth - (base.effective_depth(parent) + 1),
        };
        let fresh = base.node_mut(created);
        fresh.copy_attributes_from(node);
        fresh.graft_level = graft;
        fresh.mode_override = mode_override;
        fresh.depth_shift = shift as i32;
        register_contributors(&mut base, created, node.contributors.iter());
        mapped[id.index()] = Some(created);
        added += 1;
    }

    merge_globals(&mut base, incoming, graft_offset);
    debug!(added, updated, aborted, offset = graft_offset, "Merged tree");

    MergeOutcome {
        tree: base,
        warnings,
        added,
        updated,
        aborted,
    }
}

fn rung_violation(path: &CanonicalPath, offset: i32) -> Warning {
    Warning::error(
        WarningKind::GraftRungViolation,
        format!("Shifting by {} places this branch above level 1; branch skipped", offset),
    )
    .with_path(path.to_string())
}

fn register_contributors<'a>(
    tree: &mut Tree,
    id: NodeId,
    paths: impl Iterator<Item = &'a CanonicalPath>,
) {
    for path in paths {
        if tree.lookup(path) != Some(id) {
            tree.alias(path.clone(), id);
        }
    }
}

/// Incoming groups replace same-named base groups; base defaults stay but
/// gain whatever they left unset
fn merge_globals(base: &mut Tree, incoming: &Tree, offset: i32) {
    for (name, bundle) in &incoming.groups {
        let shifted = GroupBundle {
            graft_level: bundle.graft_level.and_then(|l| shift_level(l, offset)),
            user_proportion: bundle.user_proportion,
            weight_modifier: bundle.weight_modifier,
            mode: bundle.mode.as_ref().and_then(|m| m.shifted(offset)),
        };
        base.groups.insert(name.clone(), shifted);
    }
    let defaults = &mut base.defaults;
    if defaults.include_video.is_none() {
        defaults.include_video = incoming.defaults.include_video;
    }
    if defaults.mute.is_none() {
        defaults.mute = incoming.defaults.mute;
    }
    defaults.random |= incoming.defaults.random;
}
