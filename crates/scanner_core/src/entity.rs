//! Documents, pages and their crop regions.
//!
//! Ownership flows strictly store → [`Document`] → [`Page`]. A page refers back
//! to its owning document only by [`DocumentId`], and documents never point at
//! the store; all mutation goes through the store so the change tracker sees it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

use crate::catalog::{DocumentRecord, PageRecord};
use crate::error::{Result, ScannerError};

/// Stable identity of a document for the lifetime of the process.
///
/// Identifiers are handed out by the store and are never reused, so they are
/// safe to keep in view-model caches across saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DocumentId(u64);

/// Stable identity of a page for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PageId(u64);

impl DocumentId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw sequence number.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl PageId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw sequence number.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc-{}", self.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// A rectangle in source-image pixel coordinates.
///
/// Persisted as `"{x, y, width, height}"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl CropRegion {
    /// Create a crop region. Coordinates must be finite and the size non-negative.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        let finite = [x, y, width, height].iter().all(|v| v.is_finite());
        if !finite || width < 0.0 || height < 0.0 {
            return Err(ScannerError::InvalidCropRegion(format!(
                "{{{}, {}, {}, {}}}",
                x, y, width, height
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// The region covering a whole `width` × `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: f64::from(width),
            height: f64::from(height),
        }
    }

    /// Left edge.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Top edge.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Width of the region.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Height of the region.
    pub fn height(&self) -> f64 {
        self.height
    }
}

impl fmt::Display for CropRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}, {}, {}, {}}}",
            self.x, self.y, self.width, self.height
        )
    }
}

impl FromStr for CropRegion {
    type Err = ScannerError;

    /// Parses `"{x, y, width, height}"`. Nested braces such as
    /// `"{{x, y}, {width, height}}"` are accepted too.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ScannerError::InvalidCropRegion(s.to_string());

        let trimmed = s.trim();
        if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
            return Err(invalid());
        }

        let flat: String = trimmed.chars().filter(|c| *c != '{' && *c != '}').collect();
        let values = flat
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;

        match values.as_slice() {
            [x, y, width, height] => Self::new(*x, *y, *width, *height).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for CropRegion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CropRegion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A scanned page: an immutable reference to an image blob plus a mutable crop.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    id: PageId,
    document: DocumentId,
    image_name: String,
    crop_region: CropRegion,
}

impl Page {
    pub(crate) fn new(
        id: PageId,
        document: DocumentId,
        image_name: String,
        crop_region: CropRegion,
    ) -> Self {
        Self {
            id,
            document,
            image_name,
            crop_region,
        }
    }

    /// This page's identity.
    pub fn id(&self) -> PageId {
        self.id
    }

    /// The document that owns this page.
    pub fn document(&self) -> DocumentId {
        self.document
    }

    /// Name of the blob holding this page's image.
    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    /// Visible part of the stored image.
    pub fn crop_region(&self) -> CropRegion {
        self.crop_region
    }

    /// Returns `true` if the region actually changed.
    pub(crate) fn replace_crop_region(&mut self, crop_region: CropRegion) -> bool {
        if self.crop_region == crop_region {
            return false;
        }
        self.crop_region = crop_region;
        true
    }

    fn to_record(&self) -> PageRecord {
        PageRecord {
            image_name: self.image_name.clone(),
            crop_region: self.crop_region,
        }
    }
}

/// A document: an optional title and pages in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocumentId,
    title: Option<String>,
    pages: Vec<Page>,
}

impl Document {
    pub(crate) fn new(id: DocumentId) -> Self {
        Self {
            id,
            title: None,
            pages: Vec::new(),
        }
    }

    /// This document's identity.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The title, if one was set.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Pages in display order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Look up one of this document's pages.
    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|page| page.id == id)
    }

    /// Returns `true` if `id` is one of this document's pages.
    pub fn contains_page(&self, id: PageId) -> bool {
        self.page(id).is_some()
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Returns `true` if the title actually changed.
    pub(crate) fn replace_title(&mut self, title: Option<String>) -> bool {
        if self.title == title {
            return false;
        }
        self.title = title;
        true
    }

    pub(crate) fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.iter_mut().find(|page| page.id == id)
    }

    pub(crate) fn push_page(&mut self, page: Page) {
        debug_assert_eq!(page.document, self.id);
        debug_assert!(!self.contains_page(page.id));
        self.pages.push(page);
    }

    pub(crate) fn remove_page(&mut self, id: PageId) -> Option<Page> {
        let index = self.pages.iter().position(|page| page.id == id)?;
        Some(self.pages.remove(index))
    }

    pub(crate) fn into_pages(self) -> Vec<Page> {
        self.pages
    }

    /// The persisted form of this document: title and ordered pages only.
    pub fn to_record(&self) -> DocumentRecord {
        DocumentRecord {
            title: self.title.clone(),
            pages: self.pages.iter().map(Page::to_record).collect(),
        }
    }
}
