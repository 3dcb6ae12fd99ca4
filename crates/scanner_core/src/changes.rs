//! Change tracking between saves.
//!
//! The [`ChangeTracker`] accumulates the net effect of mutations since the last
//! successful save. Each mutation is folded into the existing records so the
//! published [`StoreChanges`] never double-counts:
//!
//! - a document is in at most one of `added_documents`, `updated_documents`,
//!   `deleted_documents`;
//! - anything created and deleted within one cycle leaves no trace;
//! - page-level records are only kept for documents that existed at the last
//!   save, since an added or deleted document is reported as a whole.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use ts_rs::TS;

use crate::entity::{DocumentId, PageId};

/// Page-level changes for a document that existed at the last save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct DocumentChanges {
    /// The document title was changed.
    pub title_changed: bool,
    /// Pages created since the last save, in creation order.
    pub added_pages: IndexSet<PageId>,
    /// Previously saved pages whose crop region changed.
    pub updated_pages: IndexSet<PageId>,
    /// Previously saved pages that were removed.
    pub deleted_pages: IndexSet<PageId>,
}

impl DocumentChanges {
    /// Returns `true` if nothing about the document changed.
    pub fn is_empty(&self) -> bool {
        !self.title_changed
            && self.added_pages.is_empty()
            && self.updated_pages.is_empty()
            && self.deleted_pages.is_empty()
    }
}

/// Immutable diff published once per successful save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct StoreChanges {
    /// Documents created since the last save.
    pub added_documents: IndexSet<DocumentId>,
    /// Per-document changes for saved documents that still exist.
    pub updated_documents: IndexMap<DocumentId, DocumentChanges>,
    /// Previously saved documents that were removed.
    pub deleted_documents: IndexSet<DocumentId>,
}

impl StoreChanges {
    /// Returns `true` if the save carried no changes.
    pub fn is_empty(&self) -> bool {
        self.added_documents.is_empty()
            && self.updated_documents.is_empty()
            && self.deleted_documents.is_empty()
    }

    /// Page-level changes for `document`, if it was updated.
    pub fn document_changes(&self, document: DocumentId) -> Option<&DocumentChanges> {
        self.updated_documents.get(&document)
    }

    /// Returns `true` if `page` was reported deleted, either on its own or
    /// through its document's deletion.
    pub fn is_page_deleted(&self, document: DocumentId, page: PageId) -> bool {
        self.deleted_documents.contains(&document)
            || self
                .updated_documents
                .get(&document)
                .is_some_and(|changes| changes.deleted_pages.contains(&page))
    }
}

/// Dirty-set bookkeeping for the current save cycle.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    pending: StoreChanges,
}

impl ChangeTracker {
    /// Create a tracker with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there is anything to report.
    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The changes accumulated so far.
    pub fn pending(&self) -> &StoreChanges {
        &self.pending
    }

    /// Record a new document.
    pub fn document_added(&mut self, document: DocumentId) {
        log::debug!("Tracking added {}", document);
        self.pending.added_documents.insert(document);
    }

    /// Record a document removal, folding away its page-level records.
    pub fn document_deleted(&mut self, document: DocumentId) {
        // Its page records are folded into the deletion
        self.pending.updated_documents.shift_remove(&document);

        if self.pending.added_documents.shift_remove(&document) {
            log::debug!("{} created and deleted before save, dropping", document);
            return;
        }

        log::debug!("Tracking deleted {}", document);
        self.pending.deleted_documents.insert(document);
    }

    /// Record a title change.
    pub fn title_changed(&mut self, document: DocumentId) {
        if let Some(changes) = self.changes_for(document) {
            changes.title_changed = true;
        }
    }

    /// Record a new page.
    pub fn page_added(&mut self, document: DocumentId, page: PageId) {
        if let Some(changes) = self.changes_for(document) {
            log::debug!("Tracking added {} in {}", page, document);
            changes.added_pages.insert(page);
        }
    }

    /// Record a crop region change.
    pub fn page_updated(&mut self, document: DocumentId, page: PageId) {
        if let Some(changes) = self.changes_for(document) {
            // A page added this cycle is reported as added, edits included
            if changes.added_pages.contains(&page) {
                return;
            }
            if changes.updated_pages.insert(page) {
                log::debug!("Tracking updated {} in {}", page, document);
            }
        }
    }

    /// Record a page removal.
    pub fn page_deleted(&mut self, document: DocumentId, page: PageId) {
        let Some(changes) = self.changes_for(document) else {
            return;
        };

        if changes.added_pages.shift_remove(&page) {
            log::debug!("{} created and deleted before save, dropping", page);
        } else {
            changes.updated_pages.shift_remove(&page);
            changes.deleted_pages.insert(page);
            log::debug!("Tracking deleted {} in {}", page, document);
        }

        if changes.is_empty() {
            self.pending.updated_documents.shift_remove(&document);
        }
    }

    /// Move the accumulated changes out, leaving the tracker empty.
    pub fn take(&mut self) -> StoreChanges {
        std::mem::take(&mut self.pending)
    }

    /// Page-level record for a document that existed at the last save.
    ///
    /// Returns `None` for documents added this cycle, which are reported whole.
    fn changes_for(&mut self, document: DocumentId) -> Option<&mut DocumentChanges> {
        if self.pending.added_documents.contains(&document) {
            return None;
        }
        debug_assert!(!self.pending.deleted_documents.contains(&document));
        Some(
            self.pending
                .updated_documents
                .entry(document)
                .or_default(),
        )
    }
}
