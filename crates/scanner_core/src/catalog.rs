//! Catalog codec and catalog file I/O.
//!
//! The catalog is a single JSON file named `info` at the store root holding an
//! ordered list of document records:
//!
//! ```text
//! [
//!   {
//!     "title": "Receipts",
//!     "pages": [
//!       { "imageName": "6f1c…", "cropRegion": "{0, 0, 1000, 2000}" }
//!     ]
//!   }
//! ]
//! ```
//!
//! Decoding is tolerant: unknown fields are ignored, a missing title decodes
//! to `None`, and a page record without a usable image name or crop region is
//! dropped with a warning instead of failing the whole load. Every image name
//! the file mentions is still reported in [`Catalog::image_names`], so blobs a
//! dropped record points at are never mistaken for orphans.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::entity::CropRegion;
use crate::error::{Result, ScannerError};
use crate::fs::FileSystem;

/// File name of the catalog inside the store root.
pub const CATALOG_FILE_NAME: &str = "info";

/// Scratch file the catalog is written to before being renamed over [`CATALOG_FILE_NAME`].
pub const CATALOG_TEMP_FILE_NAME: &str = "info.tmp";

/// Persisted form of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    /// Document title, omitted from the file when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Pages in display order
    pub pages: Vec<PageRecord>,
}

/// Persisted form of one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// Blob name of the page image
    pub image_name: String,
    /// Visible rectangle, written as `"{x, y, w, h}"`
    pub crop_region: CropRegion,
}

/// A decoded catalog file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    /// Document records that decoded cleanly, in file order
    pub documents: Vec<DocumentRecord>,
    /// Every `imageName` string in the file, including those of dropped records
    pub image_names: HashSet<String>,
}

/// Deserializes a value that should be a string, but may be a number or boolean.
/// Converts such values to their string representation.
fn deserialize_string_lenient<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Document record as found on disk, before page validation.
#[derive(Debug, Deserialize)]
struct RawDocumentRecord {
    #[serde(default, deserialize_with = "deserialize_string_lenient")]
    title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_list_lenient")]
    pages: Vec<Value>,
}

/// Deserializes a value that should be a list; anything else becomes an empty list.
fn deserialize_list_lenient<'de, D>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

/// Collect the `imageName` strings of a raw document record's pages.
fn collect_image_names(document: &Value, names: &mut HashSet<String>) {
    let Some(Value::Array(pages)) = document.get("pages") else {
        return;
    };
    for page in pages {
        if let Some(Value::String(name)) = page.get("imageName")
            && !name.is_empty()
        {
            names.insert(name.clone());
        }
    }
}

/// Encode documents into catalog bytes.
pub fn encode(documents: &[DocumentRecord]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(documents)?)
}

/// Decode catalog bytes into document records.
///
/// Only a catalog that is not a JSON list at all is an error; individual
/// malformed document or page records are skipped.
pub fn decode(bytes: &[u8]) -> Result<Vec<DocumentRecord>> {
    decode_catalog(bytes).map(|catalog| catalog.documents)
}

/// Like [`decode`], also reporting every image name the file references.
pub fn decode_catalog(bytes: &[u8]) -> Result<Catalog> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Catalog::default());
    }

    let raw: Vec<Value> = serde_json::from_slice(bytes)?;
    let mut documents = Vec::with_capacity(raw.len());
    let mut image_names = HashSet::new();

    for (doc_index, value) in raw.into_iter().enumerate() {
        collect_image_names(&value, &mut image_names);

        let record: RawDocumentRecord = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping malformed document record #{}: {}", doc_index, e);
                continue;
            }
        };

        let pages = record
            .pages
            .iter()
            .enumerate()
            .filter_map(|(page_index, value)| match decode_page(value) {
                Ok(page) => Some(page),
                Err(reason) => {
                    log::warn!(
                        "Dropping page #{} of document #{}: {}",
                        page_index,
                        doc_index,
                        reason
                    );
                    None
                }
            })
            .collect();

        documents.push(DocumentRecord {
            title: record.title,
            pages,
        });
    }

    Ok(Catalog {
        documents,
        image_names,
    })
}

fn decode_page(value: &Value) -> std::result::Result<PageRecord, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "page record is not an object".to_string())?;

    let image_name = match object.get("imageName") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => return Err("missing image name".to_string()),
    };

    let crop_region = match object.get("cropRegion") {
        Some(Value::String(raw)) => raw
            .parse::<CropRegion>()
            .map_err(|_| format!("invalid crop region '{}' for image '{}'", raw, image_name))?,
        _ => return Err(format!("missing crop region for image '{}'", image_name)),
    };

    Ok(PageRecord {
        image_name,
        crop_region,
    })
}

/// Read and decode the catalog in `root`.
///
/// A missing catalog is a normal first run and yields an empty catalog.
pub fn read_catalog<FS: FileSystem>(fs: &FS, root: &Path) -> Result<Catalog> {
    let path = root.join(CATALOG_FILE_NAME);
    if !fs.exists(&path) {
        log::debug!("No catalog at {:?}, starting empty", path);
        return Ok(Catalog::default());
    }

    let bytes = fs
        .read_binary(&path)
        .map_err(|source| ScannerError::CatalogRead { path, source })?;
    decode_catalog(&bytes)
}

/// Write encoded catalog bytes to `root`, replacing the previous catalog atomically.
///
/// The bytes go to a scratch file first and are renamed over the catalog, so
/// the catalog on disk is always either the previous or the new version.
pub fn write_catalog<FS: FileSystem>(fs: &FS, root: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = root.join(CATALOG_TEMP_FILE_NAME);
    let path = root.join(CATALOG_FILE_NAME);

    if let Err(source) = fs.write_binary(&temp_path, bytes) {
        // Best effort: a partial scratch file is harmless but untidy
        let _ = fs.delete_file(&temp_path);
        return Err(ScannerError::CatalogWrite {
            path: temp_path,
            source,
        });
    }

    fs.replace_file(&temp_path, &path)
        .map_err(|source| ScannerError::CatalogWrite { path, source })
}
