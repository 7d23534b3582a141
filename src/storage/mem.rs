//! In-memory storage backend for tests

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{matches_pattern, Storage};
use crate::error::{Error, Result};

/// Storage backed by an in-memory map. Used to exercise the store without
/// touching the filesystem.
///
/// ```ignore
/// let storage = MemStorage::new().with_file("hello.md", "---\ntitle: Hi\n---\nbody");
/// ```
#[derive(Debug, Default)]
pub struct MemStorage {
    files: RwLock<HashMap<String, String>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document (builder style).
    pub fn with_file(self, path: &str, text: &str) -> Self {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), text.to_string());
        self
    }
}

impl Storage for MemStorage {
    fn read_file(&self, path: &str) -> Result<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    fn write_file(&self, path: &str, text: &str) -> Result<()> {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), text.to_string());
        Ok(())
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    fn file_exists(&self, path: &str) -> bool {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    fn list_files(&self, pattern: &str) -> Result<Vec<String>> {
        let mut files: Vec<String> = self
            .files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|p| matches_pattern(p, pattern))
            .cloned()
            .collect();
        files.sort();
        Ok(files)
    }
}
