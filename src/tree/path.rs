//! Canonical path keys
//!
//! Every node is keyed by a canonical form of the filesystem path it came from:
//! Unicode NFC, forward slashes, no empty or `.` segments, no trailing slash. The
//! key is independent of display order and of how a source spelled the path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Stable lookup key for a node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    /// The virtual root above every filesystem path
    pub fn root() -> Self {
        CanonicalPath(String::new())
    }

    pub fn new(raw: &str) -> Self {
        let normalized: String = raw.trim().nfc().collect::<String>().replace('\\', "/");
        let absolute = normalized.starts_with('/');
        let mut segments: Vec<&str> = Vec::new();
        for segment in normalized.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            return Self::root();
        }
        let joined = segments.join("/");
        if absolute {
            CanonicalPath(format!("/{}", joined))
        } else {
            CanonicalPath(joined)
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.to_string_lossy())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments; the root has depth 0
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Last segment, or the empty string for the root
    pub fn name(&self) -> &str {
        self.segments().last().unwrap_or("")
    }

    pub fn parent(&self) -> Option<CanonicalPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(CanonicalPath(self.0[..idx].to_string())),
        }
    }

    /// Every proper ancestor from the shallowest down, excluding the root
    pub fn ancestors(&self) -> Vec<CanonicalPath> {
        let mut chain = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            if path.is_root() {
                break;
            }
            current = path.parent();
            chain.push(path);
        }
        chain.reverse();
        chain
    }

    pub fn join(&self, segment: &str) -> CanonicalPath {
        if self.is_root() {
            CanonicalPath::new(&format!("/{}", segment))
        } else {
            CanonicalPath::new(&format!("{}/{}", self.0, segment))
        }
    }

    /// True when `self` equals `other` or lies beneath it
    pub fn starts_with(&self, other: &CanonicalPath) -> bool {
        if other.is_root() {
            return true;
        }
        self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0[other.0.len()..].starts_with('/'))
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for CanonicalPath {
    fn from(raw: &str) -> Self {
        CanonicalPath::new(raw)
    }
}

impl From<&Path> for CanonicalPath {
    fn from(path: &Path) -> Self {
        CanonicalPath::from_path(path)
    }
}
