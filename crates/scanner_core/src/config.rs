//! Configuration types for the document store.
//!
//! This module provides the [`StoreConfig`] struct describing where a store
//! lives and how it treats images. Configuration is persisted as TOML
//! (typically at `~/.config/scanner/config.toml` on Unix systems).
//!
//! # Key Configuration Fields
//!
//! - `root`: Store directory holding the catalog and image blobs
//! - `image_quality`: Lossy compression quality for stored images
//! - `thumbnail_max_dimension`: Longest side of rendered thumbnails
//! - `sweep_orphans_on_open`: Delete unreferenced blobs when opening
//!
//! # Example
//!
//! ```ignore
//! use scanner_core::config::StoreConfig;
//! use scanner_core::fs::RealFileSystem;
//! use std::path::{Path, PathBuf};
//!
//! // Create a new config
//! let config = StoreConfig::new(PathBuf::from("/home/user/Scans"));
//!
//! // Or load one, falling back to defaults
//! let config = StoreConfig::load_from_or_default(
//!     &RealFileSystem,
//!     Path::new("/home/user/.config/scanner/config.toml"),
//!     PathBuf::from("/home/user/Scans"),
//! );
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, ScannerError};
use crate::fs::FileSystem;

/// Default JPEG-style quality factor for stored page images.
pub const DEFAULT_IMAGE_QUALITY: f32 = 0.9;

/// Default longest side, in pixels, of rendered thumbnails.
pub const DEFAULT_THUMBNAIL_MAX_DIMENSION: u32 = 256;

/// `StoreConfig` represents the parts of the document store the user can configure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store directory
    /// Holds the `info` catalog and one file per page image
    pub root: PathBuf,

    /// Quality factor in (0, 1] passed to the image encoder
    #[serde(default = "default_image_quality")]
    pub image_quality: f32,

    /// Longest side, in pixels, of rendered thumbnails
    #[serde(default = "default_thumbnail_max_dimension")]
    pub thumbnail_max_dimension: u32,

    /// Delete blob files the catalog does not reference when the store opens
    #[serde(default = "default_sweep_orphans")]
    pub sweep_orphans_on_open: bool,
}

fn default_image_quality() -> f32 {
    DEFAULT_IMAGE_QUALITY
}

fn default_thumbnail_max_dimension() -> u32 {
    DEFAULT_THUMBNAIL_MAX_DIMENSION
}

fn default_sweep_orphans() -> bool {
    true
}

impl StoreConfig {
    /// Create a new config for the given store directory
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            image_quality: DEFAULT_IMAGE_QUALITY,
            thumbnail_max_dimension: DEFAULT_THUMBNAIL_MAX_DIMENSION,
            sweep_orphans_on_open: true,
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.image_quality > 0.0 && self.image_quality <= 1.0) {
            return Err(ScannerError::InvalidConfig(format!(
                "image_quality must be in (0, 1], got {}",
                self.image_quality
            )));
        }
        if self.thumbnail_max_dimension == 0 {
            return Err(ScannerError::InvalidConfig(
                "thumbnail_max_dimension must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load config from a specific path.
    pub fn load_from<FS: FileSystem>(fs: &FS, path: &Path) -> Result<Self> {
        let contents = fs
            .read_to_string(path)
            .map_err(|e| ScannerError::ConfigRead {
                path: path.to_path_buf(),
                source: e,
            })?;

        let config: StoreConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to<FS: FileSystem>(&self, fs: &FS, path: &Path) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs.create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs.write_file(path, &contents)?;
        Ok(())
    }

    /// Load config from a path, returning a default config for `root` if it is missing or invalid.
    pub fn load_from_or_default<FS: FileSystem>(fs: &FS, path: &Path, root: PathBuf) -> Self {
        match Self::load_from(fs, path) {
            Ok(config) => config,
            Err(e) => {
                if fs.exists(path) {
                    log::warn!("Ignoring unusable config at {:?}: {}", path, e);
                }
                Self::new(root)
            }
        }
    }

    /// Default config file location (native only)
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("scanner").join("config.toml"))
    }

    /// Default store directory (native only)
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("scanner").join("documents"))
    }
}
