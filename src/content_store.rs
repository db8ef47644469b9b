//! Durable, content-addressed blob storage.
//!
//! Resources are written under a configured root at a location derived
//! from their content hash. Writes are atomic (temp file + rename), so
//! a partial write is never observable, and writing to an existing
//! location is a detected no-op — content is immutable once it is
//! hash-identified.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;

/// Opaque handle to a stored blob, relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    relative: String,
}

impl Locator {
    pub fn new(relative: impl Into<String>) -> Self {
        Self {
            relative: relative.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.relative
    }
}

/// Filesystem-backed content store.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn io_err(&self, path: &Path, source: std::io::Error) -> StorageError {
        StorageError {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Write `bytes` at `relative_path` under the store root.
    ///
    /// Returns the existing locator without touching the file when the
    /// target already exists. Otherwise writes to a temporary file in
    /// the same directory and renames it into place.
    pub fn write(&self, relative_path: &str, bytes: &[u8]) -> Result<Locator, StorageError> {
        let target = self.resolve(relative_path);
        if target.exists() {
            debug!(path = %target.display(), "content already present, skipping write");
            return Ok(Locator::new(relative_path));
        }

        let parent = target.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| self.io_err(parent, e))?;

        let tmp = NamedTempFile::new_in(parent).map_err(|e| self.io_err(parent, e))?;
        fs::write(tmp.path(), bytes).map_err(|e| self.io_err(tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| self.io_err(&target, e.error))?;

        debug!(path = %target.display(), len = bytes.len(), "stored content");
        Ok(Locator::new(relative_path))
    }

    pub fn read(&self, locator: &Locator) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(locator.as_str());
        fs::read(&path).map_err(|e| self.io_err(&path, e))
    }

    pub fn exists(&self, locator: &Locator) -> bool {
        self.resolve(locator.as_str()).exists()
    }

    /// Remove a stored blob. Missing blobs are not an error: retirement
    /// must be idempotent.
    pub fn delete(&self, locator: &Locator) -> Result<(), StorageError> {
        let path = self.resolve(locator.as_str());
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(&path, e)),
        }
    }
}
