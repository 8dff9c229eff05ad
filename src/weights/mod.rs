//! Weight Calculator
//!
//! Apportions a pool of 1.0 top-down. Nodes at the lowest rung of the mode
//! table share the pool; below that each node's share is split among its
//! children by the policy at the children's effective level, after percentage
//! reservations are carved out. Only `resolved_weight` is written, so the
//! calculation can be repeated at will.

mod view;

use crate::mode::{ModeTable, Policy};
use crate::tree::{CanonicalPath, Tree};
use crate::types::{Level, NodeId};
use serde::{Deserialize, Serialize};
use tracing::debug;
use view::WeightView;

/// Summary of one calculation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightReport {
    /// Sum of all leaf weights
    pub total: f64,
    /// Leaves that received a positive weight
    pub weighted_leaves: usize,
    /// Parents whose children reserved 100% or more of the pool
    pub saturated: Vec<CanonicalPath>,
}

/// Annotate every node of `tree` with its resolved weight
pub fn calculate_weights(tree: &mut Tree) -> WeightReport {
    tree.reset_weights();
    let view = WeightView::build(tree);
    let rung = tree.lowest_balanced_rung().unwrap_or(1) as i64;
    let mut report = WeightReport::default();
    let mut shares = vec![None; view.nodes.len()];

    let frontier = view.frontier(tree, rung);
    let policy = tree.mode_table.resolve(rung as Level);
    let mut stack: Vec<(usize, f64)> =
        split(tree, &view, &frontier, 1.0, policy, NodeId::ROOT, &mut report);

    while let Some((slot, share)) = stack.pop() {
        shares[slot] = Some(share);
        let node = &view.nodes[slot];
        if node.children.is_empty() {
            continue;
        }
        let table = policy_table(tree, node.context);
        let child_level = (node.depth + 1).max(1) as Level;
        let policy = table.resolve(child_level);
        let context = node.real.unwrap_or(node.context);
        stack.extend(split(
            tree,
            &view,
            &node.children,
            share,
            policy,
            context,
            &mut report,
        ));
    }

    write_back(tree, &view, &shares);

    for id in tree.leaves_under(NodeId::ROOT) {
        let weight = tree.node(id).resolved_weight;
        if weight > 0.0 {
            report.total += weight;
            report.weighted_leaves += 1;
        }
    }
    report.saturated.sort();
    report.saturated.dedup();
    debug!(
        total = report.total,
        leaves = report.weighted_leaves,
        rung,
        "Weights calculated"
    );
    report
}

/// Global table with the nearest overrides at or above `context` layered on top
fn policy_table(tree: &Tree, context: NodeId) -> ModeTable {
    match tree.local_mode(context) {
        Some(local) => tree.mode_table.overlay(&local),
        None => tree.mode_table.clone(),
    }
}

/// Split `pool` among `children`, returning each child's share
fn split(
    tree: &Tree,
    view: &WeightView,
    children: &[usize],
    pool: f64,
    policy: Policy,
    parent: NodeId,
    report: &mut WeightReport,
) -> Vec<(usize, f64)> {
    let live: Vec<usize> = children
        .iter()
        .copied()
        .filter(|slot| view.nodes[*slot].mass > 0.0)
        .collect();
    let mut shares = Vec::with_capacity(live.len());
    if live.is_empty() || pool <= 0.0 {
        return live.into_iter().map(|slot| (slot, 0.0)).collect();
    }

    let mut reserved = Vec::new();
    let mut open = Vec::new();
    for slot in live {
        let reservation = view.nodes[slot].real.and_then(|id| {
            let node = tree.node(id);
            node.user_proportion
                .map(|percent| (percent / 100.0).max(0.0) * node.modifier_factor())
        });
        match reservation {
            Some(fraction) => reserved.push((slot, fraction)),
            None => open.push(slot),
        }
    }

    let reserved_total: f64 = reserved.iter().map(|(_, f)| f).sum();
    let mut scale = 1.0;
    if reserved_total >= 1.0 {
        report.saturated.push(tree.node(parent).canonical_path.clone());
        if reserved_total > 1.0 {
            scale = 1.0 / reserved_total;
        }
    }

    let scores: Vec<f64> = open
        .iter()
        .map(|slot| score(tree, view, *slot, policy))
        .collect();
    let score_total: f64 = scores.iter().sum();

    // Nobody left to take the remainder: reservations stretch to fill the pool
    if (open.is_empty() || score_total <= 0.0) && reserved_total > 0.0 {
        scale = 1.0 / reserved_total;
    }

    for (slot, fraction) in &reserved {
        shares.push((*slot, pool * fraction * scale));
    }
    let remainder = if reserved_total >= 1.0 {
        0.0
    } else {
        (pool * (1.0 - reserved_total * scale)).max(0.0)
    };
    for (slot, score) in open.into_iter().zip(scores) {
        let share = if score_total > 0.0 {
            remainder * score / score_total
        } else {
            0.0
        };
        shares.push((slot, share));
    }
    shares
}

/// Unnormalised score of one child under `policy`
fn score(tree: &Tree, view: &WeightView, slot: usize, policy: Policy) -> f64 {
    let node = &view.nodes[slot];
    let (base, modifier) = match node.real.map(|id| tree.node(id)) {
        Some(real) => match real.leaf {
            Some(ref leaf) => (leaf.mass(), real.modifier_factor()),
            None => (policy.score(node.mass), real.modifier_factor()),
        },
        None => (policy.score(node.mass), 1.0),
    };
    (base * modifier).max(0.0)
}

/// Copy view shares onto real nodes; branches with no share of their own sum their children
fn write_back(tree: &mut Tree, view: &WeightView, shares: &[Option<f64>]) {
    let mut assigned = vec![false; tree.arena_len()];
    for (slot, node) in view.nodes.iter().enumerate() {
        if let (Some(id), Some(share)) = (node.real, shares[slot]) {
            tree.node_mut(id).resolved_weight = share;
            assigned[id.index()] = true;
        }
    }
    for id in tree.preorder().into_iter().rev() {
        if assigned[id.index()] || tree.node(id).is_leaf() {
            continue;
        }
        let sum: f64 = tree
            .children(id)
            .iter()
            .map(|child| tree.node(*child).resolved_weight)
            .sum();
        tree.node_mut(id).resolved_weight = sum;
    }
}
