#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Blob repository (page image files)
pub mod blob;

/// Callback registry (change subscriptions)
pub mod callback_registry;

/// Catalog codec (the `info` file)
pub mod catalog;

/// Change tracking between saves
pub mod changes;

/// Configuration options
pub mod config;

/// Documents, pages and crop regions
pub mod entity;

/// Error (common error types)
pub mod error;

/// Filesystem abstraction
pub mod fs;

/// Image encoding and rendering collaborators
pub mod render;

/// Current document/page selection
pub mod selection;

/// Document store (create, delete, save)
pub mod store;

pub use changes::{DocumentChanges, StoreChanges};
pub use config::StoreConfig;
pub use entity::{CropRegion, Document, DocumentId, Page, PageId};
pub use error::{Result, ScannerError};
pub use store::DocumentStore;

#[cfg(test)]
pub mod test_utils;
