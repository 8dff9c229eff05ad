//! Weighting view
//!
//! Grafts, merge shifts, flattening and loose-file grouping change where a node
//! competes for weight without changing where it is stored. The view is a
//! throwaway hierarchy that expresses those placements; the calculator walks
//! the view and writes results back to the real nodes.

use crate::tree::Tree;
use crate::types::NodeId;
use std::collections::BTreeMap;

/// One node of the weighting view
#[derive(Debug, Clone)]
pub(crate) struct ViewNode {
    /// Backing tree node; `None` for synthetic nodes
    pub real: Option<NodeId>,
    pub parent: Option<usize>,
    pub depth: i64,
    pub children: Vec<usize>,
    /// Real node whose mode overrides govern the split beneath this node
    pub context: NodeId,
    /// Total leaf mass beneath (or of) this node
    pub mass: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct WeightView {
    pub nodes: Vec<ViewNode>,
}

impl WeightView {
    pub const ROOT: usize = 0;

    pub fn build(tree: &Tree) -> Self {
        let masses = real_masses(tree);
        let depths = tree.effective_depths();
        let mut view = WeightView {
            nodes: vec![ViewNode {
                real: Some(NodeId::ROOT),
                parent: None,
                depth: 0,
                children: Vec::new(),
                context: NodeId::ROOT,
                mass: 0.0,
            }],
        };
        let mut group_chains: BTreeMap<(String, i64), usize> = BTreeMap::new();
        let mut stack: Vec<(NodeId, usize)> = vec![(NodeId::ROOT, Self::ROOT)];

        while let Some((real, slot)) = stack.pop() {
            let node = tree.node(real);

            if node.flatten && real != NodeId::ROOT {
                for leaf in tree.leaves_under(real) {
                    if leaf != real {
                        view.attach(slot, Some(leaf), real);
                    }
                }
                continue;
            }

            let mut leaves = Vec::new();
            let mut branches = Vec::new();
            for child in node.children() {
                if masses[child.index()] <= 0.0 {
                    continue;
                }
                if tree.node(*child).is_leaf() {
                    leaves.push(*child);
                } else {
                    branches.push(*child);
                }
            }

            let leaf_parent = if !leaves.is_empty() && !branches.is_empty() {
                view.attach(slot, None, real)
            } else {
                slot
            };
            for leaf in leaves {
                view.attach(leaf_parent, Some(leaf), real);
            }

            // Reverse push keeps the walk in insertion order
            let mut placed = Vec::with_capacity(branches.len());
            for child in branches {
                let child_node = tree.node(child);
                let target = depths[child.index()].unwrap_or(1).max(1);
                let anchor = match (child_node.graft_level, &child_node.group_name) {
                    (Some(_), Some(group)) => {
                        view.group_anchor(&mut group_chains, group, target)
                    }
                    _ => view.anchor_for(slot, target),
                };
                let child_slot = view.attach(anchor, Some(child), child);
                placed.push((child, child_slot));
            }
            for entry in placed.into_iter().rev() {
                stack.push(entry);
            }
        }

        view.fill_masses(tree);
        view
    }

    /// Append a node one level below `parent`
    fn attach(&mut self, parent: usize, real: Option<NodeId>, context: NodeId) -> usize {
        let slot = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(ViewNode {
            real,
            parent: Some(parent),
            depth,
            children: Vec::new(),
            context,
            mass: 0.0,
        });
        self.nodes[parent].children.push(slot);
        slot
    }

    /// View node under which a child landing at `target` must hang, starting from `slot`
    fn anchor_for(&mut self, slot: usize, target: i64) -> usize {
        let depth = self.nodes[slot].depth;
        if target == depth + 1 {
            return slot;
        }
        if target > depth + 1 {
            let context = self.nodes[slot].context;
            let mut current = slot;
            for _ in 0..(target - depth - 1) {
                current = self.attach(current, None, context);
            }
            return current;
        }
        // Lift to the view ancestor one level above the target
        let mut current = slot;
        while self.nodes[current].depth > target - 1 {
            match self.nodes[current].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Shared synthetic chain from the root down to `target - 1` for one group
    fn group_anchor(
        &mut self,
        chains: &mut BTreeMap<(String, i64), usize>,
        group: &str,
        target: i64,
    ) -> usize {
        if target <= 1 {
            return Self::ROOT;
        }
        let key = (group.to_string(), target);
        if let Some(slot) = chains.get(&key) {
            return *slot;
        }
        let mut current = Self::ROOT;
        for _ in 0..(target - 1) {
            current = self.attach(current, None, NodeId::ROOT);
        }
        chains.insert(key, current);
        current
    }

    fn fill_masses(&mut self, tree: &Tree) {
        // Children always have larger slots than their parents
        for slot in (0..self.nodes.len()).rev() {
            let own = match self.nodes[slot].real {
                Some(id) => tree
                    .node(id)
                    .leaf
                    .as_ref()
                    .map(|leaf| leaf.mass())
                    .unwrap_or(0.0),
                None => 0.0,
            };
            let below: f64 = self.nodes[slot]
                .children
                .iter()
                .map(|child| self.nodes[*child].mass)
                .sum();
            self.nodes[slot].mass = own + below;
        }
    }

    pub fn is_leaf(&self, tree: &Tree, slot: usize) -> bool {
        self.nodes[slot]
            .real
            .map(|id| tree.node(id).is_leaf())
            .unwrap_or(false)
    }

    /// Nodes sharing the initial pool: everything at `rung`, plus leaves that sit above it
    pub fn frontier(&self, tree: &Tree, rung: i64) -> Vec<usize> {
        let mut frontier = Vec::new();
        let mut stack = vec![Self::ROOT];
        while let Some(slot) = stack.pop() {
            let node = &self.nodes[slot];
            if slot != Self::ROOT && (node.depth >= rung || self.is_leaf(tree, slot)) {
                if node.mass > 0.0 {
                    frontier.push(slot);
                }
                continue;
            }
            for child in node.children.iter().rev() {
                stack.push(*child);
            }
        }
        frontier
    }
}

/// Leaf mass of every real node, indexed by arena slot
pub(crate) fn real_masses(tree: &Tree) -> Vec<f64> {
    let mut masses = vec![0.0; tree.arena_len()];
    for id in tree.preorder().into_iter().rev() {
        let node = tree.node(id);
        let own = node.leaf.as_ref().map(|leaf| leaf.mass()).unwrap_or(0.0);
        let below: f64 = node.children().iter().map(|c| masses[c.index()]).sum();
        masses[id.index()] = own + below;
    }
    masses
}
