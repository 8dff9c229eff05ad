//! Extraction
//!
//! Turns a weighted tree into the two parallel sequences a sampler consumes,
//! and writes them as a flat list that the list builder can read back.

use crate::tree::Tree;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

/// Leaf identifiers and their weights, index-aligned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub paths: Vec<String>,
    pub weights: Vec<f64>,
}

impl Extraction {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.paths
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }
}

/// Every leaf with a positive weight, in depth-first display order
pub fn extract(tree: &Tree) -> Extraction {
    let mut extraction = Extraction::default();
    for id in tree.leaves_under(tree.root()) {
        let node = tree.node(id);
        if node.resolved_weight <= 0.0 {
            continue;
        }
        if let Some(ref leaf) = node.leaf {
            extraction.paths.push(leaf.file.clone());
            extraction.weights.push(node.resolved_weight);
        }
    }
    extraction
}

/// Metadata written above the entries
#[derive(Debug, Clone, Default)]
pub struct ListHeader {
    pub inputs: Vec<PathBuf>,
    pub mode: String,
}

/// Render `extraction` as `path,weight` lines under a commented header
pub fn render_weighted_list(extraction: &Extraction, header: &ListHeader) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Generated {}", chrono::Utc::now().to_rfc3339());
    for input in &header.inputs {
        let _ = writeln!(out, "# Input {}", input.display());
    }
    if !header.mode.is_empty() {
        let _ = writeln!(out, "# Mode {}", header.mode);
    }
    for (path, weight) in extraction.iter() {
        let _ = writeln!(out, "{},{}", path, weight);
    }
    out
}

pub fn write_weighted_list(
    path: &Path,
    extraction: &Extraction,
    header: &ListHeader,
) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, render_weighted_list(extraction, header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::CancellationToken;
    use crate::source::fs::MemoryFs;
    use crate::source::{list, BuildContext, BuildSettings};
    use crate::tree::{CanonicalPath, LeafPayload};
    use crate::weights::calculate_weights;

    fn weighted_tree() -> Tree {
        let mut tree = Tree::new();
        for (dir, files) in [("/p/a", vec!["1.jpg", "2.jpg"]), ("/p/b", vec!["3.jpg"])] {
            let dir = CanonicalPath::new(dir);
            let parent = tree.ensure_branch(&dir);
            for file in files {
                let file = format!("{}/{}", dir, file);
                tree.insert_leaf(parent, LeafPayload::new(file, dir.clone()));
            }
        }
        tree.ensure_branch(&CanonicalPath::new("/p/empty"));
        calculate_weights(&mut tree);
        tree
    }

    #[test]
    fn test_extract_order_and_total() {
        let extraction = extract(&weighted_tree());
        assert_eq!(
            extraction.paths,
            vec!["/p/a/1.jpg", "/p/a/2.jpg", "/p/b/3.jpg"]
        );
        assert_eq!(extraction.weights, vec![0.25, 0.25, 0.5]);
        assert!((extraction.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_leaves_are_pruned() {
        let mut tree = weighted_tree();
        let reserved = tree.lookup_str("/p/a").unwrap();
        tree.node_mut(reserved).user_proportion = Some(100.0);
        calculate_weights(&mut tree);
        let extraction = extract(&tree);
        assert_eq!(extraction.len(), 2);
        assert!(!extraction.paths.iter().any(|p| p == "/p/b/3.jpg"));
    }

    #[test]
    fn test_rendered_list_reads_back() {
        let extraction = extract(&weighted_tree());
        let header = ListHeader {
            inputs: vec![PathBuf::from("/lists/a.txt")],
            mode: "b1".to_string(),
        };
        let rendered = render_weighted_list(&extraction, &header);
        assert!(rendered.starts_with("# Generated "));
        assert!(rendered.contains("# Mode b1\n"));

        let fs = MemoryFs::new();
        let settings = BuildSettings::default();
        let cancel = CancellationToken::new();
        let ctx = BuildContext::new(&fs, &settings, &cancel);
        let mut rebuilt = list::build_from_str(Path::new("/out.lst"), &rendered, &ctx);
        assert!(rebuilt.provenance.warnings.is_empty());
        calculate_weights(&mut rebuilt.tree);
        assert_eq!(extract(&rebuilt.tree).weights, vec![0.25, 0.25, 0.5]);
    }

    #[test]
    fn test_write_to_disk() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out").join("weights.lst");
        write_weighted_list(&path, &extract(&weighted_tree()), &ListHeader::default()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().filter(|l| !l.starts_with('#')).count(), 3);
    }
}
