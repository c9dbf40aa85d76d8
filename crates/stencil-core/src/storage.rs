//! Storage collaborator.
//!
//! The compiler only needs four operations from the filesystem: existence,
//! modification time, read and write. [`LocalFilesystem`] backs them with
//! `std::fs`; [`MemoryFilesystem`] keeps everything in a map so tests and
//! embedding callers can compile without touching disk.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

/// Filesystem operations used by the template compiler.
pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;

    fn last_modified(&self, path: &Path) -> io::Result<SystemTime>;

    fn get(&self, path: &Path) -> io::Result<String>;

    /// Write `contents`, replacing any existing file.
    fn put(&self, path: &Path, contents: &str) -> io::Result<()>;
}

impl<F: Filesystem + ?Sized> Filesystem for &F {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn last_modified(&self, path: &Path) -> io::Result<SystemTime> {
        (**self).last_modified(path)
    }

    fn get(&self, path: &Path) -> io::Result<String> {
        (**self).get(path)
    }

    fn put(&self, path: &Path, contents: &str) -> io::Result<()> {
        (**self).put(path, contents)
    }
}

/// The local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn last_modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn get(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    /// Creates missing parent directories before writing.
    fn put(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: String,
    modified: SystemTime,
}

/// In-memory filesystem.
///
/// Writes are stamped with the current time; [`MemoryFilesystem::insert`]
/// takes an explicit timestamp so staleness can be tested deterministically.
#[derive(Debug, Default)]
pub struct MemoryFilesystem {
    files: RwLock<HashMap<PathBuf, MemoryFile>>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryFilesystem::insert`] stamped with the current time.
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert(path, contents, SystemTime::now());
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>, modified: SystemTime) {
        let file = MemoryFile {
            contents: contents.into(),
            modified,
        };
        self.write_lock().insert(path.into(), file);
    }

    /// Change a file's modification time. Returns `false` if it does not exist.
    pub fn touch(&self, path: &Path, modified: SystemTime) -> bool {
        match self.write_lock().get_mut(path) {
            Some(file) => {
                file.modified = modified;
                true
            }
            None => false,
        }
    }

    /// Current contents of `path`, if present.
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.read_lock().get(path).map(|f| f.contents.clone())
    }

    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every mutation is a single insert or field store, so a poisoned map is
    // still consistent.
    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PathBuf, MemoryFile>> {
        self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PathBuf, MemoryFile>> {
        self.files.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl Filesystem for MemoryFilesystem {
    fn exists(&self, path: &Path) -> bool {
        self.read_lock().contains_key(path)
    }

    fn last_modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.read_lock()
            .get(path)
            .map(|f| f.modified)
            .ok_or_else(|| not_found(path))
    }

    fn get(&self, path: &Path) -> io::Result<String> {
        self.read_lock()
            .get(path)
            .map(|f| f.contents.clone())
            .ok_or_else(|| not_found(path))
    }

    fn put(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.insert(path, contents, SystemTime::now());
        Ok(())
    }
}
