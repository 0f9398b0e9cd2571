//! Filesystem seam for the item cache
//!
//! The cache only needs a handful of whole-file operations. Routing them
//! through [`FileSystem`] lets tests run against [`MemoryFs`] and inject write
//! or rename failures without touching a real disk.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Whole-file operations used by the cache store
pub trait FileSystem: Send + Sync {
    /// Reads a file, returning `None` if it does not exist
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;

    /// Creates or truncates `path`, writes `contents` and flushes them to stable storage
    fn write_synced(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Atomically replaces `to` with `from`
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Removes a file
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Returns true if `path` exists
    fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Creates an empty file only if it does not already exist
    ///
    /// Returns `true` if this call created the file.
    fn create_new(&self, path: &Path) -> io::Result<bool>;

    /// Returns the size of a file in bytes, or `None` if it does not exist
    fn size(&self, path: &Path) -> io::Result<Option<u64>>;

    /// Creates a directory and all of its parents
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_synced(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(contents)?;
        file.sync_all()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }

    fn create_new(&self, path: &Path) -> io::Result<bool> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => {
                file.sync_all()?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn size(&self, path: &Path) -> io::Result<Option<u64>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

/// An in-memory filesystem with failure injection
///
/// When write failures are enabled, `write_synced` stores only the first half
/// of the contents before failing, mimicking a crash in the middle of a write.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_renames: AtomicBool,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail part-way through
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent rename fail
    pub fn set_fail_renames(&self, fail: bool) {
        self.fail_renames.store(fail, Ordering::SeqCst);
    }

    /// Stores raw bytes at `path`, bypassing failure injection
    pub fn put(&self, path: &Path, contents: &[u8]) {
        self.files_mut().insert(path.to_path_buf(), contents.to_vec());
    }

    fn files_mut(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FileSystem for MemoryFs {
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        Ok(self.files_mut().get(path).cloned())
    }

    fn write_synced(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            let partial = contents[..contents.len() / 2].to_vec();
            self.files_mut().insert(path.to_path_buf(), partial);
            return Err(io::Error::new(ErrorKind::Other, "simulated write failure"));
        }
        self.files_mut().insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.fail_renames.load(Ordering::SeqCst) {
            return Err(io::Error::new(ErrorKind::Other, "simulated rename failure"));
        }
        let mut files = self.files_mut();
        let contents = files
            .remove(from)
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "rename source missing"))?;
        files.insert(to.to_path_buf(), contents);
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "file not found"))
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.files_mut().contains_key(path))
    }

    fn create_new(&self, path: &Path) -> io::Result<bool> {
        let mut files = self.files_mut();
        if files.contains_key(path) {
            return Ok(false);
        }
        files.insert(path.to_path_buf(), Vec::new());
        Ok(true)
    }

    fn size(&self, path: &Path) -> io::Result<Option<u64>> {
        Ok(self.files_mut().get(path).map(|c| c.len() as u64))
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}
