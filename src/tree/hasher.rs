//! Structural fingerprint of a tree
//!
//! Hashes names, leaf payloads and weighting attributes in pre-order. Two builds
//! of the same inputs must produce the same fingerprint; resolved weights are
//! included so a fingerprint also pins the calculator's output.

use super::Tree;
use crate::types::NodeId;

/// Hex digest length in bytes
pub const FINGERPRINT_LEN: usize = 32;

/// BLAKE3 fingerprint over the reachable structure of `tree`
pub fn fingerprint(tree: &Tree) -> [u8; FINGERPRINT_LEN] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(tree.mode_table.to_string().as_bytes());
    hasher.update(&[0]);
    for id in tree.preorder() {
        hash_node(&mut hasher, tree, id);
    }
    *hasher.finalize().as_bytes()
}

/// Hex-encoded [`fingerprint`]
pub fn fingerprint_hex(tree: &Tree) -> String {
    hex::encode(fingerprint(tree))
}

fn hash_node(hasher: &mut blake3::Hasher, tree: &Tree, id: NodeId) {
    let node = tree.node(id);
    hasher.update(&(tree.depth(id) as u64).to_le_bytes());
    hasher.update(node.canonical_path.as_str().as_bytes());
    hasher.update(&[0]);
    if let Some(ref leaf) = node.leaf {
        hasher.update(b"L");
        hasher.update(leaf.file.as_bytes());
        hasher.update(&[0]);
        hasher.update(&leaf.mass().to_bits().to_le_bytes());
    }
    if let Some(proportion) = node.user_proportion {
        hasher.update(b"P");
        hasher.update(&proportion.to_bits().to_le_bytes());
    }
    if let Some(modifier) = node.weight_modifier {
        hasher.update(b"M");
        hasher.update(&modifier.to_bits().to_le_bytes());
    }
    if let Some(level) = node.graft_level {
        hasher.update(b"G");
        hasher.update(&level.to_le_bytes());
    }
    hasher.update(&node.depth_shift.to_le_bytes());
    if let Some(ref table) = node.mode_override {
        hasher.update(b"O");
        hasher.update(table.to_string().as_bytes());
        hasher.update(&[0]);
    }
    hasher.update(&node.resolved_weight.to_bits().to_le_bytes());
}
