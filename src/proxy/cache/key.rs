use std::fmt;
use std::path::{Path, PathBuf};

use crate::proxy::target::ResolvedTarget;

/// Leaf name used when a resource path names a directory.
pub const DEFAULT_LEAF: &str = "default";

/// Relative location of a cached response: `<hostname><resource_path>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    relative: String,
}

impl CacheKey {
    /// Derives the key for `target`, or `None` when the hostname cannot name a directory under
    /// the cache root (empty, or starting with `.`). Empty and `.` path segments are dropped, and
    /// a path naming a directory gets the [`DEFAULT_LEAF`].
    pub fn for_target(target: &ResolvedTarget) -> Option<Self> {
        let hostname = target.hostname.as_str();
        if hostname.is_empty() || hostname.starts_with('.') || hostname.contains('\\') {
            return None;
        }
        let path = target.resource_path.as_str();
        let mut segments: Vec<&str> = path
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect();
        if segments.is_empty() || path.ends_with('/') || path.ends_with("/.") {
            segments.push(DEFAULT_LEAF);
        }
        Some(Self {
            relative: format!("{hostname}/{}", segments.join("/")),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.relative
    }

    /// Absolute (or root-relative) path of the entry below `root`.
    pub fn path_under(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.relative.split('/').filter(|segment| !segment.is_empty()) {
            path.push(segment);
        }
        path
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative)
    }
}
