//! Tree / Node Model
//!
//! Arena-backed hierarchy shared by every other component. Nodes are created
//! top-down and never re-parented, so the structure is acyclic by construction.
//! `path_lookup` maps canonical paths to their owning node; several paths may
//! resolve to one node when flattening or grafting folds locations together.

pub mod hasher;
pub mod node;
pub mod path;

pub use node::{LeafPayload, MediaFlags, Node};
pub use path::CanonicalPath;

use crate::mode::ModeTable;
use crate::types::{Level, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Global fallbacks sourced from `*` directives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeDefaults {
    /// Global mode declared by the source, if any
    pub mode: Option<ModeTable>,
    pub include_video: Option<bool>,
    pub mute: Option<bool>,
    pub dont_recurse: bool,
    pub random: bool,
}

/// Modifier bundle stored under a group name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupBundle {
    pub graft_level: Option<Level>,
    pub user_proportion: Option<f64>,
    pub weight_modifier: Option<f64>,
    pub mode: Option<ModeTable>,
}

/// Root node plus indexes and configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
    path_lookup: BTreeMap<CanonicalPath, NodeId>,
    pub defaults: TreeDefaults,
    pub mode_table: ModeTable,
    pub groups: BTreeMap<String, GroupBundle>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Tree {
            nodes: vec![Node::new("root", CanonicalPath::root())],
            path_lookup: BTreeMap::new(),
            defaults: TreeDefaults::default(),
            mode_table: ModeTable::balanced_default(),
            groups: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Deepest-first alignment anchor: the first level carrying a policy
    pub fn lowest_balanced_rung(&self) -> Option<Level> {
        self.mode_table.lowest_rung()
    }

    pub fn lookup(&self, path: &CanonicalPath) -> Option<NodeId> {
        if path.is_root() {
            return Some(NodeId::ROOT);
        }
        self.path_lookup.get(path).copied()
    }

    pub fn lookup_str(&self, path: &str) -> Option<NodeId> {
        self.lookup(&CanonicalPath::new(path))
    }

    pub fn path_lookup(&self) -> &BTreeMap<CanonicalPath, NodeId> {
        &self.path_lookup
    }

    /// Add a child under `parent`, or return the existing child with that name
    pub fn add_child(&mut self, parent: NodeId, canonical_path: CanonicalPath) -> NodeId {
        let name = canonical_path.name().to_string();
        if let Some(existing) = self.node(parent).child(&name) {
            return existing;
        }
        let id = NodeId(self.nodes.len());
        let mut node = Node::new(name.clone(), canonical_path.clone());
        node.parent = Some(parent);
        self.nodes.push(node);
        let parent_node = self.node_mut(parent);
        parent_node.children.push(id);
        parent_node.child_names.insert(name, id);
        self.path_lookup.entry(canonical_path).or_insert(id);
        id
    }

    /// Resolve `path` to a node, creating any missing branches on the way
    pub fn ensure_branch(&mut self, path: &CanonicalPath) -> NodeId {
        if let Some(id) = self.lookup(path) {
            return id;
        }
        let parent = match path.parent() {
            Some(parent_path) => self.ensure_branch(&parent_path),
            None => NodeId::ROOT,
        };
        self.add_child(parent, path.clone())
    }

    /// Insert or replace a leaf beneath `parent`
    pub fn insert_leaf(&mut self, parent: NodeId, payload: LeafPayload) -> NodeId {
        let path = CanonicalPath::new(&payload.file);
        let id = self.add_child(parent, path);
        self.node_mut(id).leaf = Some(payload);
        id
    }

    /// Register an additional path resolving to `id`. The first owner of a path keeps it.
    pub fn alias(&mut self, path: CanonicalPath, id: NodeId) -> bool {
        if path.is_root() || self.path_lookup.contains_key(&path) {
            return false;
        }
        self.node_mut(id).contributors.insert(path.clone());
        self.path_lookup.insert(path, id);
        true
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    /// Storage depth (root = 0)
    pub fn depth(&self, id: NodeId) -> Level {
        let mut depth = 0;
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.node(parent).parent;
        }
        depth
    }

    /// All reachable nodes, parents before children, children in insertion order
    pub fn preorder(&self) -> Vec<NodeId> {
        self.preorder_from(NodeId::ROOT)
    }

    pub fn preorder_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    /// Reachable leaves beneath `start`, in display order
    pub fn leaves_under(&self, start: NodeId) -> Vec<NodeId> {
        self.preorder_from(start)
            .into_iter()
            .filter(|id| self.node(*id).is_leaf())
            .collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves_under(NodeId::ROOT).len()
    }

    /// Reachable node count, root included
    pub fn node_count(&self) -> usize {
        self.preorder().len()
    }

    /// Effective depth of every reachable node, indexed by arena slot.
    ///
    /// A node's effective depth is its graft level when set, else its parent's
    /// effective depth plus one, and is then moved by its own `depth_shift`.
    /// Descendants follow the adjusted value.
    pub fn effective_depths(&self) -> Vec<Option<i64>> {
        let mut depths = vec![None; self.nodes.len()];
        depths[NodeId::ROOT.index()] = Some(0);
        for id in self.preorder() {
            if id == NodeId::ROOT {
                continue;
            }
            let node = self.node(id);
            let parent_depth = node
                .parent
                .and_then(|p| depths[p.index()])
                .unwrap_or(0);
            let base = match node.graft_level {
                Some(level) => level as i64,
                None => parent_depth + 1,
            };
            depths[id.index()] = Some(base + node.depth_shift as i64);
        }
        depths
    }

    /// Effective depth of one node, walking its ancestors
    pub fn effective_depth(&self, id: NodeId) -> i64 {
        let mut chain = vec![id];
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        let mut depth = 0i64;
        for node_id in chain.into_iter().rev() {
            if node_id == NodeId::ROOT {
                continue;
            }
            let node = self.node(node_id);
            depth = match node.graft_level {
                Some(level) => level as i64,
                None => depth + 1,
            } + node.depth_shift as i64;
        }
        depth
    }

    /// Mode overrides visible to `id`'s children: nearest ancestor-or-self override wins per level
    pub fn local_mode(&self, id: NodeId) -> Option<ModeTable> {
        let mut layers = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            if let Some(ref table) = node.mode_override {
                layers.push(table.clone());
            }
            current = node.parent;
        }
        if layers.is_empty() {
            return None;
        }
        let mut merged = ModeTable::new();
        for layer in layers.into_iter().rev() {
            merged = merged.overlay(&layer);
        }
        Some(merged)
    }

    /// Apply a group's bundle to a node, filling only what the node leaves unset
    pub fn apply_group(&mut self, id: NodeId) {
        let Some(group) = self.node(id).group_name.clone() else {
            return;
        };
        let Some(bundle) = self.groups.get(&group).cloned() else {
            return;
        };
        let node = self.node_mut(id);
        if node.graft_level.is_none() {
            node.graft_level = bundle.graft_level;
        }
        if node.user_proportion.is_none() {
            node.user_proportion = bundle.user_proportion;
        }
        if node.weight_modifier.is_none() {
            node.weight_modifier = bundle.weight_modifier;
        }
        if node.mode_override.is_none() {
            node.mode_override = bundle.mode;
        }
    }

    pub fn reset_weights(&mut self) {
        for node in &mut self.nodes {
            node.resolved_weight = 0.0;
        }
    }

    pub(crate) fn arena_len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tree: &mut Tree, file: &str) -> NodeId {
        let path = CanonicalPath::new(file);
        let parent_path = path.parent().unwrap();
        let parent = tree.ensure_branch(&parent_path);
        tree.insert_leaf(parent, LeafPayload::new(file, parent_path))
    }

    #[test]
    fn test_ensure_branch_creates_ancestors_once() {
        let mut tree = Tree::new();
        let a = tree.ensure_branch(&CanonicalPath::new("/pics/a"));
        let again = tree.ensure_branch(&CanonicalPath::new("/pics/a"));
        assert_eq!(a, again);
        let pics = tree.lookup_str("/pics").unwrap();
        assert_eq!(tree.children(tree.root()), &[pics]);
        assert_eq!(tree.depth(a), 2);
        assert_eq!(tree.node(a).name, "a");
    }

    #[test]
    fn test_insert_leaf_is_keyed_by_file_path() {
        let mut tree = Tree::new();
        let id = leaf(&mut tree, "/pics/a/1.jpg");
        assert_eq!(tree.lookup_str("/pics/a/1.jpg"), Some(id));
        assert!(tree.node(id).is_leaf());
        assert_eq!(tree.leaf_count(), 1);
    }

    #[test]
    fn test_alias_keeps_first_owner() {
        let mut tree = Tree::new();
        let a = tree.ensure_branch(&CanonicalPath::new("/pics/a"));
        let b = tree.ensure_branch(&CanonicalPath::new("/pics/b"));
        assert!(tree.alias(CanonicalPath::new("/pics/a/sub"), a));
        assert!(!tree.alias(CanonicalPath::new("/pics/a/sub"), b));
        assert_eq!(tree.lookup_str("/pics/a/sub"), Some(a));
        assert!(tree.node(a).contributors.contains(&CanonicalPath::new("/pics/a/sub")));
    }

    #[test]
    fn test_preorder_follows_insertion_order() {
        let mut tree = Tree::new();
        leaf(&mut tree, "/z/1.jpg");
        leaf(&mut tree, "/a/1.jpg");
        let names: Vec<String> = tree
            .preorder()
            .into_iter()
            .map(|id| tree.node(id).canonical_path.to_string())
            .collect();
        assert_eq!(names, vec!["<root>", "/z", "/z/1.jpg", "/a", "/a/1.jpg"]);
    }

    #[test]
    fn test_effective_depth_follows_graft_and_shift() {
        let mut tree = Tree::new();
        let file = leaf(&mut tree, "/pics/set/a/1.jpg");
        let set = tree.lookup_str("/pics/set").unwrap();
        assert_eq!(tree.effective_depth(file), 4);

        tree.node_mut(set).graft_level = Some(5);
        assert_eq!(tree.effective_depth(set), 5);
        assert_eq!(tree.effective_depth(file), 7);

        let pics = tree.lookup_str("/pics").unwrap();
        tree.node_mut(pics).depth_shift = -1;
        // graft resets the subtree, so the shift above it does not reach the leaf
        assert_eq!(tree.effective_depth(file), 7);
        tree.node_mut(set).graft_level = None;
        assert_eq!(tree.effective_depth(file), 3);

        let depths = tree.effective_depths();
        assert_eq!(depths[file.index()], Some(3));
    }

    #[test]
    fn test_local_mode_nearest_override_wins() {
        let mut tree = Tree::new();
        let file = leaf(&mut tree, "/pics/a/1.jpg");
        let pics = tree.lookup_str("/pics").unwrap();
        let a = tree.lookup_str("/pics/a").unwrap();
        tree.node_mut(pics).mode_override = Some(ModeTable::parse("w2b3").unwrap());
        tree.node_mut(a).mode_override = Some(ModeTable::parse("w3,10").unwrap());
        let local = tree.local_mode(file).unwrap();
        assert_eq!(local.to_string(), "w2w3,10");
        assert!(tree.local_mode(tree.root()).is_none());
    }

    #[test]
    fn test_apply_group_fills_unset_fields() {
        let mut tree = Tree::new();
        let a = tree.ensure_branch(&CanonicalPath::new("/pics/a"));
        tree.groups.insert(
            "faves".to_string(),
            GroupBundle {
                graft_level: Some(2),
                user_proportion: Some(30.0),
                weight_modifier: Some(2.0),
                mode: None,
            },
        );
        tree.node_mut(a).group_name = Some("faves".to_string());
        tree.node_mut(a).graft_level = Some(4);
        tree.apply_group(a);
        let node = tree.node(a);
        assert_eq!(node.graft_level, Some(4));
        assert_eq!(node.user_proportion, Some(30.0));
        assert_eq!(node.weight_modifier, Some(2.0));
    }
}
