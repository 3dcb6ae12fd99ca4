//! Filesystem abstraction module.
//!
//! This module provides the `FileSystem` trait the store uses for both its
//! catalog file and its image blobs, allowing the real filesystem to be swapped
//! for an in-memory one in tests.

#[cfg(not(target_arch = "wasm32"))]
mod native;

#[cfg(not(target_arch = "wasm32"))]
pub use native::RealFileSystem;

use std::io::Result;
use std::path::{Path, PathBuf};

/// Abstraction over filesystem operations
/// Allows for different implementations: real filesystem, in-memory (for tests), etc.
/// Send + Sync required so a store can be handed to another thread between calls
pub trait FileSystem: Send + Sync {
    /// Reads a text file (for configuration)
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Overwrites a text file
    fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Read binary file content
    fn read_binary(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write binary content to a file, replacing any previous content
    fn write_binary(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Deletes a file
    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Checks if a file exists
    fn exists(&self, path: &Path) -> bool;

    /// Creates a directory and all parent directories
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Checks if a path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Rename `from` to `to`, replacing `to` if it exists.
    ///
    /// Implementations should make this atomic where the platform allows, so
    /// readers observe either the old or the new content of `to`.
    fn replace_file(&self, from: &Path, to: &Path) -> Result<()>;

    /// List all files in a directory (not recursive)
    fn list_files(&self, _dir: &Path) -> Result<Vec<PathBuf>> {
        // Default: return empty
        Ok(vec![])
    }
}

// Blanket implementation for references to FileSystem
impl<T: FileSystem> FileSystem for &T {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        (*self).read_to_string(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        (*self).write_file(path, content)
    }

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        (*self).read_binary(path)
    }

    fn write_binary(&self, path: &Path, content: &[u8]) -> Result<()> {
        (*self).write_binary(path, content)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        (*self).delete_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (*self).exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        (*self).create_dir_all(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (*self).is_dir(path)
    }

    fn replace_file(&self, from: &Path, to: &Path) -> Result<()> {
        (*self).replace_file(from, to)
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        (*self).list_files(dir)
    }
}
