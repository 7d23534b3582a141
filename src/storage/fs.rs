//! Local filesystem storage backend

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use super::{matches_pattern, Storage};
use crate::error::{Error, Result};

/// Storage rooted at a directory on the local disk.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Create a backend rooted at `root`. The directory does not have to
    /// exist yet; listing an absent root yields an empty set.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn map_io(path: &str, e: std::io::Error) -> Error {
        if e.kind() == ErrorKind::NotFound {
            Error::NotFound(path.to_string())
        } else {
            Error::Io(e)
        }
    }
}

impl Storage for FsStorage {
    fn read_file(&self, path: &str) -> Result<String> {
        fs::read_to_string(self.full_path(path)).map_err(|e| Self::map_io(path, e))
    }

    fn write_file(&self, path: &str, text: &str) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, text)?;
        Ok(())
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        fs::remove_file(self.full_path(path)).map_err(|e| Self::map_io(path, e))
    }

    fn file_exists(&self, path: &str) -> bool {
        self.full_path(path).is_file()
    }

    fn list_files(&self, pattern: &str) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let relative = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            if matches_pattern(&relative, pattern) {
                files.push(relative);
            }
        }

        files.sort();
        Ok(files)
    }

    fn modified(&self, path: &str) -> Option<DateTime<Utc>> {
        let metadata = fs::metadata(self.full_path(path)).ok()?;
        metadata.modified().ok().map(DateTime::<Utc>::from)
    }
}
