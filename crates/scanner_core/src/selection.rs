//! The "current selection" cache used by the document/page workflow.
//!
//! The store does not own the selection; hosts keep one next to the store and
//! feed it each saved [`StoreChanges`] so it never points at deleted entities.

use crate::changes::StoreChanges;
use crate::entity::{DocumentId, PageId};

/// Currently selected document and page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    document: Option<DocumentId>,
    page: Option<(DocumentId, PageId)>,
}

impl Selection {
    /// An empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// The selected document, if any.
    pub fn current_document(&self) -> Option<DocumentId> {
        self.document
    }

    /// The selected page, if any.
    pub fn current_page(&self) -> Option<PageId> {
        self.page.map(|(_, page)| page)
    }

    /// Select a document. A selected page of another document is cleared.
    pub fn select_document(&mut self, document: DocumentId) {
        if self.page.is_some_and(|(owner, _)| owner != document) {
            self.page = None;
        }
        self.document = Some(document);
    }

    /// Select a page of `document`, selecting the document as well.
    pub fn select_page(&mut self, document: DocumentId, page: PageId) {
        self.document = Some(document);
        self.page = Some((document, page));
    }

    /// Select nothing.
    pub fn clear(&mut self) {
        self.document = None;
        self.page = None;
    }

    /// Drop selections that a saved change set deleted.
    pub fn apply(&mut self, changes: &StoreChanges) {
        if let Some((owner, page)) = self.page
            && changes.is_page_deleted(owner, page)
        {
            log::debug!("Selected {} was deleted, clearing page selection", page);
            self.page = None;
        }

        if let Some(document) = self.document
            && changes.deleted_documents.contains(&document)
        {
            log::debug!("Selected {} was deleted, clearing selection", document);
            self.clear();
        }
    }
}
