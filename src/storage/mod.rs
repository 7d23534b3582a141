//! Storage backends - the physical home of documents
//!
//! The content store only ever talks to a [`Storage`] trait object, so the
//! same engine runs against a local directory ([`FsStorage`]) or an in-memory
//! map ([`MemStorage`], used in tests). All paths are relative to the
//! backend's root and use `/` separators.

mod fs;
mod mem;

pub use fs::FsStorage;
pub use mem::MemStorage;

use chrono::{DateTime, Utc};
use glob::Pattern;

use crate::error::Result;

/// Backend contract consumed by the content store.
pub trait Storage: Send + Sync {
    /// Read a document; `Error::NotFound` if absent.
    fn read_file(&self, path: &str) -> Result<String>;

    /// Create or overwrite a document.
    fn write_file(&self, path: &str, text: &str) -> Result<()>;

    /// Remove a document; `Error::NotFound` if absent.
    fn delete_file(&self, path: &str) -> Result<()>;

    /// Whether a document exists.
    fn file_exists(&self, path: &str) -> bool;

    /// Enumerate documents matching a glob pattern (`*`, `*.md`, `posts/*`).
    fn list_files(&self, pattern: &str) -> Result<Vec<String>>;

    /// Last modification time, when the backend tracks one.
    fn modified(&self, _path: &str) -> Option<DateTime<Utc>> {
        None
    }
}

/// Match a relative path against a glob pattern, `*` matching everything.
pub(crate) fn matches_pattern(path: &str, pattern: &str) -> bool {
    if pattern.is_empty() || pattern == "*" {
        return true;
    }
    Pattern::new(pattern)
        .map(|p| p.matches(path))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern("hello.md", "*"));
        assert!(matches_pattern("posts/hello.md", "*.md"));
        assert!(matches_pattern("posts/hello.md", "posts/*"));
        assert!(!matches_pattern("style.css", "*.md"));
        assert!(!matches_pattern("hello.md", "posts/*"));
    }
}
