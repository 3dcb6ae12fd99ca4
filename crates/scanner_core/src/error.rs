use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::entity::{DocumentId, PageId};

/// Unified error type for scanner store operations
#[derive(Debug, Error)]
pub enum ScannerError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create store root '{path}': {source}")]
    CreateRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    // Blob errors
    #[error("Failed to write image blob '{name}': {source}")]
    BlobWrite {
        name: String,
        source: std::io::Error,
    },

    #[error("Failed to read image blob '{name}': {source}")]
    BlobRead {
        name: String,
        source: std::io::Error,
    },

    #[error("Failed to delete image blob '{name}': {source}")]
    BlobDelete {
        name: String,
        source: std::io::Error,
    },

    #[error("Image blob '{0}' does not exist")]
    BlobNotFound(String),

    #[error("Image blob '{0}' already exists")]
    BlobExists(String),

    // Catalog errors
    #[error("Failed to read catalog '{path}': {source}")]
    CatalogRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write catalog '{path}': {source}")]
    CatalogWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Catalog format error: {0}")]
    CatalogFormat(#[from] serde_json::Error),

    #[error("Invalid crop region: '{0}'")]
    InvalidCropRegion(String),

    // Ownership errors
    #[error("Document {0} is not in the store")]
    DocumentNotFound(DocumentId),

    #[error("Page {0} is not in the store")]
    PageNotFound(PageId),

    #[error("Page {page} does not belong to document {document}")]
    PageNotInDocument { page: PageId, document: DocumentId },

    // Image collaborator errors
    #[error("Failed to encode image: {0}")]
    ImageEncode(String),

    #[error("Failed to render page: {0}")]
    Render(String),

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias for scanner store operations
pub type Result<T> = std::result::Result<T, ScannerError>;

/// A serializable representation of ScannerError for hosts that cross a process or FFI boundary
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Associated path (if applicable)
    pub path: Option<PathBuf>,
}

impl From<&ScannerError> for SerializableError {
    fn from(err: &ScannerError) -> Self {
        let kind = match err {
            ScannerError::Io(_) => "Io",
            ScannerError::CreateRoot { .. } => "CreateRoot",
            ScannerError::BlobWrite { .. } => "BlobWrite",
            ScannerError::BlobRead { .. } => "BlobRead",
            ScannerError::BlobDelete { .. } => "BlobDelete",
            ScannerError::BlobNotFound(_) => "BlobNotFound",
            ScannerError::BlobExists(_) => "BlobExists",
            ScannerError::CatalogRead { .. } => "CatalogRead",
            ScannerError::CatalogWrite { .. } => "CatalogWrite",
            ScannerError::CatalogFormat(_) => "CatalogFormat",
            ScannerError::InvalidCropRegion(_) => "InvalidCropRegion",
            ScannerError::DocumentNotFound(_) => "DocumentNotFound",
            ScannerError::PageNotFound(_) => "PageNotFound",
            ScannerError::PageNotInDocument { .. } => "PageNotInDocument",
            ScannerError::ImageEncode(_) => "ImageEncode",
            ScannerError::Render(_) => "Render",
            ScannerError::ConfigParse(_) => "ConfigParse",
            ScannerError::ConfigSerialize(_) => "ConfigSerialize",
            ScannerError::InvalidConfig(_) => "InvalidConfig",
            ScannerError::ConfigRead { .. } => "ConfigRead",
        }
        .to_string();

        let path = match err {
            ScannerError::CreateRoot { path, .. } => Some(path.clone()),
            ScannerError::CatalogRead { path, .. } => Some(path.clone()),
            ScannerError::CatalogWrite { path, .. } => Some(path.clone()),
            ScannerError::ConfigRead { path, .. } => Some(path.clone()),
            _ => None,
        };

        Self {
            kind,
            message: err.to_string(),
            path,
        }
    }
}

impl From<ScannerError> for SerializableError {
    fn from(err: ScannerError) -> Self {
        SerializableError::from(&err)
    }
}

impl ScannerError {
    /// Convert to a serializable representation for IPC
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }

    /// Whether this error reports a caller passing an entity its claimed owner does not hold.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            ScannerError::DocumentNotFound(_)
                | ScannerError::PageNotFound(_)
                | ScannerError::PageNotInDocument { .. }
        )
    }
}
