//! Flat, name-addressed storage for page images.
//!
//! Each blob is one file directly under the store root, named by the
//! caller-supplied blob name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, ScannerError};
use crate::fs::FileSystem;

/// Generate a fresh, unique blob name.
pub fn generate_name() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Blob storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct BlobRepository<FS: FileSystem> {
    fs: FS,
    root: PathBuf,
}

impl<FS: FileSystem> BlobRepository<FS> {
    /// Create a repository for blobs stored directly under `root`.
    pub fn new(fs: FS, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    /// The store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The filesystem backing this repository.
    pub fn fs(&self) -> &FS {
        &self.fs
    }

    /// Path of the blob called `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Returns `true` if the root directory exists.
    pub fn root_exists(&self) -> bool {
        self.fs.is_dir(&self.root)
    }

    /// Create the store directory and any missing parents.
    pub fn create_root(&self) -> Result<()> {
        self.fs
            .create_dir_all(&self.root)
            .map_err(|source| ScannerError::CreateRoot {
                path: self.root.clone(),
                source,
            })
    }

    /// Returns `true` if a blob called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.fs.exists(&self.path_for(name))
    }

    /// Store `bytes` under a name no other blob uses.
    pub fn store(&self, bytes: &[u8], name: &str) -> Result<()> {
        if self.contains(name) {
            return Err(ScannerError::BlobExists(name.to_string()));
        }

        self.fs
            .write_binary(&self.path_for(name), bytes)
            .map_err(|source| ScannerError::BlobWrite {
                name: name.to_string(),
                source,
            })
    }

    /// Read a blob's bytes.
    pub fn load(&self, name: &str) -> Result<Vec<u8>> {
        self.fs
            .read_binary(&self.path_for(name))
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => ScannerError::BlobNotFound(name.to_string()),
                _ => ScannerError::BlobRead {
                    name: name.to_string(),
                    source,
                },
            })
    }

    /// Remove a blob.
    pub fn delete(&self, name: &str) -> Result<()> {
        self.fs
            .delete_file(&self.path_for(name))
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => ScannerError::BlobNotFound(name.to_string()),
                _ => ScannerError::BlobDelete {
                    name: name.to_string(),
                    source,
                },
            })
    }

    /// Names of all files directly under the root.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .fs
            .list_files(&self.root)?
            .into_iter()
            .filter(|path| !self.fs.is_dir(path))
            .filter_map(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}
