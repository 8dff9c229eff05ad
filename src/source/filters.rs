//! Include / exclude filters
//!
//! Includes are AND-ed: a file survives only if its path contains every
//! `[+]` keyword. Excludes are OR-ed: any `[-]` keyword found in a path drops
//! it. An exclude naming an absolute path removes that file or directory
//! outright, whatever the keyword filters say.

use crate::tree::CanonicalPath;
use std::collections::BTreeSet;

/// Outcome of checking one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    /// Removed by an exact-path exclusion
    Excluded,
    /// Removed by keyword filtering
    Filtered,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    must_contain: BTreeSet<String>,
    must_not_contain: BTreeSet<String>,
    excluded_paths: BTreeSet<CanonicalPath>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(&mut self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        if !keyword.is_empty() {
            self.must_contain.insert(keyword);
        }
    }

    /// Absolute paths become exact exclusions; anything else is a keyword
    pub fn exclude(&mut self, keyword_or_path: &str) {
        let value = keyword_or_path.trim();
        if value.is_empty() {
            return;
        }
        if is_absolute(value) {
            self.excluded_paths.insert(CanonicalPath::new(value));
        } else {
            self.must_not_contain.insert(value.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.must_contain.is_empty()
            && self.must_not_contain.is_empty()
            && self.excluded_paths.is_empty()
    }

    fn excluded_exactly(&self, path: &CanonicalPath) -> bool {
        self.excluded_paths
            .iter()
            .any(|excluded| path.starts_with(excluded))
    }

    /// Directories are pruned by exact exclusions and exclude keywords only;
    /// include keywords are judged on the files inside
    pub fn check_dir(&self, path: &CanonicalPath) -> Verdict {
        if self.excluded_exactly(path) {
            return Verdict::Excluded;
        }
        if self
            .must_not_contain
            .iter()
            .any(|keyword| path.as_str().contains(keyword.as_str()))
        {
            return Verdict::Filtered;
        }
        Verdict::Keep
    }

    pub fn check_file(&self, path: &CanonicalPath) -> Verdict {
        match self.check_dir(path) {
            Verdict::Keep => {}
            other => return other,
        }
        if self
            .must_contain
            .iter()
            .all(|keyword| path.as_str().contains(keyword.as_str()))
        {
            Verdict::Keep
        } else {
            Verdict::Filtered
        }
    }

    pub fn excluded_paths(&self) -> impl Iterator<Item = &CanonicalPath> {
        self.excluded_paths.iter()
    }
}

fn is_absolute(value: &str) -> bool {
    let bytes = value.as_bytes();
    value.starts_with('/')
        || value.starts_with('\\')
        || (bytes.len() > 2 && bytes[1] == b':' && (bytes[2] == b'\\' || bytes[2] == b'/'))
}
