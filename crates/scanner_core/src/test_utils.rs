//! Test utilities for scanner_core
//!
//! This module provides shared testing infrastructure, including a mock filesystem
//! that can be used across all test modules.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::fs::FileSystem;

#[derive(Default)]
struct MockState {
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: HashSet<PathBuf>,
    fail_writes: bool,
    fail_deletes: bool,
    fail_create_dir: bool,
}

/// A mock filesystem for testing.
///
/// Uses `Arc<Mutex<..>>` for thread-safety and allows cloning
/// while sharing the same underlying file storage. Writes, renames and
/// deletes can be switched to fail to simulate a full or broken disk.
#[derive(Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    /// Create a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the mock filesystem (builder pattern).
    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(PathBuf::from(path), content.to_vec());
        self
    }

    /// Add a directory to the mock filesystem (builder pattern).
    pub fn with_dir(self, path: &str) -> Self {
        self.state.lock().unwrap().dirs.insert(PathBuf::from(path));
        self
    }

    /// Get the content of a file (for test assertions).
    pub fn get_content(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&PathBuf::from(path))
            .cloned()
    }

    /// Make every write and rename fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    /// Make every delete fail until switched back.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.state.lock().unwrap().fail_deletes = fail;
    }

    /// Make directory creation fail.
    pub fn set_fail_create_dir(&self, fail: bool) {
        self.state.lock().unwrap().fail_create_dir = fail;
    }

    /// Number of files currently stored.
    pub fn file_count(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }
}

fn storage_full() -> io::Error {
    io::Error::new(io::ErrorKind::StorageFull, "No space left on device")
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read_binary(path)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn write_file(&self, path: &Path, content: &str) -> io::Result<()> {
        self.write_binary(path, content.as_bytes())
    }

    fn read_binary(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "File not found"))
    }

    fn write_binary(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(storage_full());
        }
        state.files.insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "Permission denied",
            ));
        }
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "File not found"))
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create_dir {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "Permission denied",
            ));
        }
        state.dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    fn replace_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(storage_full());
        }
        let content = state
            .files
            .remove(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "File not found"))?;
        state.files.insert(to.to_path_buf(), content);
        Ok(())
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        let mut result: Vec<PathBuf> = state
            .files
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .cloned()
            .collect();
        result.sort();
        Ok(result)
    }
}
