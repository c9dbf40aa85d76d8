//! Content-addressed compiled artifact cache.
//!
//! An artifact's name is the SHA-256 of the template identifier, so the same
//! identifier always maps to the same file no matter what the template
//! contains.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::CompilerError;
use crate::storage::Filesystem;

/// Default compiled artifact extension.
pub const DEFAULT_EXTENSION: &str = "php";

/// Locates compiled artifacts and decides whether they are stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCache {
    dir: PathBuf,
    extension: String,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `<dir>/<hex(sha256(id))>.<extension>`.
    pub fn compiled_path(&self, id: &str) -> PathBuf {
        let digest = Sha256::digest(id.as_bytes());
        self.dir
            .join(format!("{}.{}", hex::encode(digest), self.extension))
    }

    /// Whether the artifact for `id` must be rebuilt: it is missing, or it
    /// is not strictly newer than the source.
    pub fn is_expired<F: Filesystem>(&self, files: &F, id: &str) -> Result<bool, CompilerError> {
        let compiled = self.compiled_path(id);
        if !files.exists(&compiled) {
            debug!("{} expired: no compiled artifact at {}", id, compiled.display());
            return Ok(true);
        }

        let source_path = Path::new(id);
        let source_modified = files
            .last_modified(source_path)
            .map_err(|e| CompilerError::storage(source_path, e))?;
        let compiled_modified = files
            .last_modified(&compiled)
            .map_err(|e| CompilerError::storage(&compiled, e))?;

        let expired = compiled_modified <= source_modified;
        debug!("{} expired: {} ({})", id, expired, compiled.display());
        Ok(expired)
    }
}
