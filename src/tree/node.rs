//! Node types: branches (directory-like) and leaves (image/video references)

use crate::mode::ModeTable;
use crate::tree::path::CanonicalPath;
use crate::types::{Level, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-entity media overrides; `None` defers to the tree defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaFlags {
    pub force_video: Option<bool>,
    pub mute: Option<bool>,
}

impl MediaFlags {
    /// Fill unset flags from `fallback`
    pub fn or(self, fallback: MediaFlags) -> MediaFlags {
        MediaFlags {
            force_video: self.force_video.or(fallback.force_video),
            mute: self.mute.or(fallback.mute),
        }
    }
}

/// Content carried by a leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafPayload {
    /// Identifier handed to the sampler (the file path as the source wrote it)
    pub file: String,
    /// Directory path this leaf was contributed under
    pub origin: CanonicalPath,
    /// Absolute repeat count, at least 1
    pub repeat: Option<u32>,
    /// Explicit weight from a weighted flat list
    pub explicit_weight: Option<f64>,
    pub media: MediaFlags,
}

impl LeafPayload {
    pub fn new(file: impl Into<String>, origin: CanonicalPath) -> Self {
        Self {
            file: file.into(),
            origin,
            repeat: None,
            explicit_weight: None,
            media: MediaFlags::default(),
        }
    }

    pub fn repeat_factor(&self) -> f64 {
        self.repeat.map(|r| r.max(1) as f64).unwrap_or(1.0)
    }

    pub fn weight_factor(&self) -> f64 {
        self.explicit_weight.unwrap_or(1.0)
    }

    /// Leaf mass used by weighted policy: explicit weight times repeat count
    pub fn mass(&self) -> f64 {
        self.weight_factor() * self.repeat_factor()
    }
}

/// A branch or a leaf in the arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub canonical_path: CanonicalPath,
    pub parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) child_names: BTreeMap<String, NodeId>,
    /// Present only on leaves
    pub leaf: Option<LeafPayload>,
    /// Fixed percentage of the parent's pool reserved for this node
    pub user_proportion: Option<f64>,
    /// Multiplier on this node's default share; `None` is 1.0
    pub weight_modifier: Option<f64>,
    pub group_name: Option<String>,
    /// Overrides the effective depth of this subtree
    pub graft_level: Option<Level>,
    /// Level shift applied when this subtree was merged into a differently aligned tree
    pub depth_shift: i32,
    pub flatten: bool,
    pub recurse_limit: bool,
    /// Local mode entries for this subtree
    pub mode_override: Option<ModeTable>,
    pub media: MediaFlags,
    /// Every source path that resolves to this node
    pub contributors: BTreeSet<CanonicalPath>,
    /// Derived by the weight calculator; not an input
    pub resolved_weight: f64,
}

impl Node {
    pub fn new(name: impl Into<String>, canonical_path: CanonicalPath) -> Self {
        let mut contributors = BTreeSet::new();
        if !canonical_path.is_root() {
            contributors.insert(canonical_path.clone());
        }
        Self {
            name: name.into(),
            canonical_path,
            parent: None,
            children: Vec::new(),
            child_names: BTreeMap::new(),
            leaf: None,
            user_proportion: None,
            weight_modifier: None,
            group_name: None,
            graft_level: None,
            depth_shift: 0,
            flatten: false,
            recurse_limit: false,
            mode_override: None,
            media: MediaFlags::default(),
            contributors,
            resolved_weight: 0.0,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.child_names.get(name).copied()
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf.is_some()
    }

    /// "Reserve NN% of the parent" rather than "multiply my default share"
    pub fn is_percentage_reservation(&self) -> bool {
        self.user_proportion.is_some()
    }

    pub fn modifier_factor(&self) -> f64 {
        self.weight_modifier.unwrap_or(1.0)
    }

    /// Copy weighting attributes, leaving identity and links alone
    pub(crate) fn copy_attributes_from(&mut self, other: &Node) {
        self.user_proportion = other.user_proportion;
        self.weight_modifier = other.weight_modifier;
        self.group_name = other.group_name.clone();
        self.graft_level = other.graft_level;
        self.flatten = other.flatten;
        self.recurse_limit = other.recurse_limit;
        self.mode_override = other.mode_override.clone();
        self.media = other.media;
        self.leaf = other.leaf.clone();
    }
}
