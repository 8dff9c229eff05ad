//! Core types shared by the tree, builders, merger and orchestrator.

use serde::{Deserialize, Serialize};

/// NodeId: index of a node inside a tree's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The root node is always the first arena slot
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Level: depth in the weighting hierarchy (root = 0, its children = 1)
pub type Level = u32;

/// SourceIndex: position of a source in the ordered input list
pub type SourceIndex = usize;
