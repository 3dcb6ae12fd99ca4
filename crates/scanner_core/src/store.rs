//! The document store.
//!
//! [`DocumentStore`] owns every [`Document`] and [`Page`], the change tracker,
//! the pending blob-deletion queue and the subscriber registry. All mutation
//! goes through it (directly or via the [`DocumentMut`] / [`PageMut`] handles)
//! so each change is recorded exactly once.
//!
//! [`DocumentStore::save`] is the only point where anything on disk other than
//! new image blobs changes:
//!
//! ```text
//! encode catalog → write `info` atomically → delete pending blobs
//!                        ↓ (failure)                   ↓
//!               nothing touched, retry later   take diff → notify subscribers
//! ```
//!
//! # Example
//!
//! ```ignore
//! use scanner_core::config::StoreConfig;
//! use scanner_core::fs::RealFileSystem;
//! use scanner_core::render::RawImage;
//! use scanner_core::store::DocumentStore;
//! use std::sync::Arc;
//!
//! let mut store = DocumentStore::open(RealFileSystem, StoreConfig::new("/tmp/scans".into()))?;
//! store.subscribe(Arc::new(|changes| println!("saved: {:?}", changes)));
//!
//! let doc = store.create_document();
//! store.set_title(doc, Some("Receipts".into()))?;
//! store.create_page(doc, &RawImage::new(1000, 2000, jpeg_bytes))?;
//! store.save()?;
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;

use crate::blob::{self, BlobRepository};
use crate::callback_registry::{CallbackRegistry, EventCallback, SubscriptionId};
use crate::catalog::{self, CATALOG_FILE_NAME, CATALOG_TEMP_FILE_NAME, DocumentRecord};
use crate::changes::{ChangeTracker, StoreChanges};
use crate::config::StoreConfig;
use crate::entity::{CropRegion, Document, DocumentId, Page, PageId};
use crate::error::{Result, ScannerError};
use crate::fs::FileSystem;
use crate::render::{ImageEncoder, PassthroughEncoder, PageRenderer, PixelBuffer, RawImage};

/// Owner of all documents and pages in one store directory.
pub struct DocumentStore<FS: FileSystem> {
    config: StoreConfig,
    blobs: BlobRepository<FS>,
    encoder: Box<dyn ImageEncoder>,
    documents: IndexMap<DocumentId, Document>,
    /// Back-references from each live page to its owning document.
    page_owners: HashMap<PageId, DocumentId>,
    tracker: ChangeTracker,
    /// Blob names to delete once the next catalog write succeeds.
    pending_deletions: Vec<String>,
    registry: CallbackRegistry<StoreChanges>,
    next_id: u64,
}

impl<FS: FileSystem> DocumentStore<FS> {
    /// Open the store at `config.root`, creating the directory if needed.
    ///
    /// Fails if the directory cannot be created or an existing catalog cannot
    /// be read. A missing catalog is a first run and yields an empty store.
    pub fn open(fs: FS, config: StoreConfig) -> Result<Self> {
        Self::open_with_encoder(fs, config, Box::new(PassthroughEncoder))
    }

    /// Like [`open`](Self::open), encoding new page images with `encoder`.
    pub fn open_with_encoder(
        fs: FS,
        config: StoreConfig,
        encoder: Box<dyn ImageEncoder>,
    ) -> Result<Self> {
        config.validate()?;

        let blobs = BlobRepository::new(fs, config.root.clone());
        if !blobs.root_exists() {
            log::info!("Creating document store at {:?}", blobs.root());
            blobs.create_root()?;
        }

        let on_disk = catalog::read_catalog(blobs.fs(), blobs.root())?;

        let mut store = Self {
            config,
            blobs,
            encoder,
            documents: IndexMap::new(),
            page_owners: HashMap::new(),
            tracker: ChangeTracker::new(),
            pending_deletions: Vec::new(),
            registry: CallbackRegistry::new(),
            next_id: 1,
        };
        store.load_records(on_disk.documents);

        if store.config.sweep_orphans_on_open {
            store.sweep_orphans(&on_disk.image_names);
        }

        log::info!(
            "Opened document store at {:?} with {} documents",
            store.blobs.root(),
            store.documents.len()
        );
        Ok(store)
    }

    fn load_records(&mut self, records: Vec<DocumentRecord>) {
        let mut seen_names = HashSet::new();

        for record in records {
            let document_id = self.allocate_document_id();
            let mut document = Document::new(document_id);
            document.replace_title(record.title);

            for page in record.pages {
                if !self.blobs.contains(&page.image_name) {
                    log::warn!(
                        "Dropping page with missing image '{}' from {}",
                        page.image_name,
                        document_id
                    );
                    continue;
                }
                if !seen_names.insert(page.image_name.clone()) {
                    log::warn!(
                        "Dropping page reusing image '{}' of an earlier page from {}",
                        page.image_name,
                        document_id
                    );
                    continue;
                }
                let page_id = self.allocate_page_id();
                self.page_owners.insert(page_id, document_id);
                document.push_page(Page::new(
                    page_id,
                    document_id,
                    page.image_name,
                    page.crop_region,
                ));
            }

            self.documents.insert(document_id, document);
        }
    }

    /// Delete blob files the catalog on disk does not reference. Best effort.
    ///
    /// `referenced` holds every image name in the file, including those of
    /// records that failed to decode, so only blobs no catalog version knows
    /// about are removed.
    fn sweep_orphans(&self, referenced: &HashSet<String>) {
        let names = match self.blobs.list() {
            Ok(names) => names,
            Err(e) => {
                log::warn!("Could not list {:?} for orphan sweep: {}", self.blobs.root(), e);
                return;
            }
        };

        for name in names {
            if name == CATALOG_FILE_NAME || referenced.contains(&name) {
                continue;
            }
            if name != CATALOG_TEMP_FILE_NAME {
                log::info!("Removing orphaned image blob '{}'", name);
            }
            if let Err(e) = self.blobs.delete(&name) {
                log::warn!("Failed to remove orphaned file '{}': {}", name, e);
            }
        }
    }

    fn allocate_document_id(&mut self) -> DocumentId {
        let id = DocumentId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn allocate_page_id(&mut self) -> PageId {
        let id = PageId::new(self.next_id);
        self.next_id += 1;
        id
    }

    // ==================== Queries ====================

    /// The configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Documents in display order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Number of live documents.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Look up a live document.
    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    /// Look up a live page in whichever document owns it.
    pub fn page(&self, id: PageId) -> Option<&Page> {
        let owner = self.page_owners.get(&id)?;
        self.documents.get(owner)?.page(id)
    }

    /// Returns `true` if there are mutations not yet saved.
    pub fn has_unsaved_changes(&self) -> bool {
        self.tracker.has_changes() || !self.pending_deletions.is_empty()
    }

    /// The diff the next successful save would publish.
    pub fn pending_changes(&self) -> &StoreChanges {
        self.tracker.pending()
    }

    /// Blob names waiting for the next successful save to delete them.
    pub fn pending_deletions(&self) -> &[String] {
        &self.pending_deletions
    }

    // ==================== Subscriptions ====================

    /// Register a callback invoked with the diff of every successful save.
    pub fn subscribe(&self, callback: EventCallback<StoreChanges>) -> SubscriptionId {
        self.registry.subscribe(callback)
    }

    /// Returns `true` if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }

    /// Number of active change subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscriber_count()
    }

    /// Drop every change subscription.
    pub fn clear_subscribers(&self) {
        self.registry.clear();
    }

    // ==================== Documents ====================

    /// Append a new, untitled, empty document.
    pub fn create_document(&mut self) -> DocumentId {
        let id = self.allocate_document_id();
        self.documents.insert(id, Document::new(id));
        self.tracker.document_added(id);
        id
    }

    /// Remove a document and queue its page images for deletion.
    pub fn delete_document(&mut self, id: DocumentId) -> Result<()> {
        let Some(document) = self.documents.shift_remove(&id) else {
            log::error!("Attempted to delete {} which is not in the store", id);
            return Err(ScannerError::DocumentNotFound(id));
        };

        for page in document.into_pages() {
            self.page_owners.remove(&page.id());
            self.pending_deletions.push(page.image_name().to_string());
        }
        self.tracker.document_deleted(id);
        Ok(())
    }

    /// Handle for mutating one document.
    pub fn document_mut(&mut self, id: DocumentId) -> Result<DocumentMut<'_, FS>> {
        if !self.documents.contains_key(&id) {
            return Err(ScannerError::DocumentNotFound(id));
        }
        Ok(DocumentMut { store: self, id })
    }

    /// Handle for mutating one page.
    pub fn page_mut(&mut self, id: PageId) -> Result<PageMut<'_, FS>> {
        if !self.page_owners.contains_key(&id) {
            return Err(ScannerError::PageNotFound(id));
        }
        Ok(PageMut { store: self, id })
    }

    /// Set or clear a document's title. Recorded only if the title changes.
    pub fn set_title(&mut self, id: DocumentId, title: Option<String>) -> Result<()> {
        let document = self
            .documents
            .get_mut(&id)
            .ok_or(ScannerError::DocumentNotFound(id))?;

        if document.replace_title(title) {
            self.tracker.title_changed(id);
        }
        Ok(())
    }

    // ==================== Pages ====================

    /// Store `image` as a new blob and append a page showing all of it.
    ///
    /// If encoding or storing the image fails nothing is changed.
    pub fn create_page(&mut self, document: DocumentId, image: &RawImage) -> Result<PageId> {
        if !self.documents.contains_key(&document) {
            log::error!("Attempted to add a page to {} which is not in the store", document);
            return Err(ScannerError::DocumentNotFound(document));
        }

        let bytes = self.encoder.encode(image, self.config.image_quality)?;
        let image_name = blob::generate_name();
        self.blobs.store(&bytes, &image_name)?;

        let page_id = self.allocate_page_id();
        let page = Page::new(page_id, document, image_name, image.bounds());
        self.documents
            .get_mut(&document)
            .ok_or(ScannerError::DocumentNotFound(document))?
            .push_page(page);
        self.page_owners.insert(page_id, document);
        self.tracker.page_added(document, page_id);

        Ok(page_id)
    }

    /// Remove `page` from `document` and queue its image for deletion.
    pub fn delete_page(&mut self, document: DocumentId, page: PageId) -> Result<()> {
        let owner = self
            .documents
            .get_mut(&document)
            .ok_or(ScannerError::DocumentNotFound(document))?;

        let Some(removed) = owner.remove_page(page) else {
            log::error!("Attempted to delete {} which is not in {}", page, document);
            return Err(ScannerError::PageNotInDocument { page, document });
        };

        self.page_owners.remove(&page);
        self.pending_deletions.push(removed.image_name().to_string());
        self.tracker.page_deleted(document, page);
        Ok(())
    }

    /// Replace a page's crop region. Recorded only if the region changes.
    pub fn set_crop_region(&mut self, page: PageId, crop_region: CropRegion) -> Result<()> {
        let document = *self
            .page_owners
            .get(&page)
            .ok_or(ScannerError::PageNotFound(page))?;

        let changed = self
            .documents
            .get_mut(&document)
            .and_then(|owner| owner.page_mut(page))
            .ok_or(ScannerError::PageNotFound(page))?
            .replace_crop_region(crop_region);

        if changed {
            self.tracker.page_updated(document, page);
        }
        Ok(())
    }

    // ==================== Images ====================

    /// The stored (encoded) image bytes of a page.
    pub fn load_image(&self, page: PageId) -> Result<Vec<u8>> {
        let page = self.page(page).ok_or(ScannerError::PageNotFound(page))?;
        self.blobs.load(page.image_name())
    }

    /// Render the cropped page at full resolution.
    pub fn render_page(&self, page: PageId, renderer: &dyn PageRenderer) -> Result<PixelBuffer> {
        let crop_region = self
            .page(page)
            .ok_or(ScannerError::PageNotFound(page))?
            .crop_region();
        renderer.render(&self.load_image(page)?, &crop_region)
    }

    /// Render the cropped page as a thumbnail of the configured size.
    pub fn render_thumbnail(
        &self,
        page: PageId,
        renderer: &dyn PageRenderer,
    ) -> Result<PixelBuffer> {
        let crop_region = self
            .page(page)
            .ok_or(ScannerError::PageNotFound(page))?
            .crop_region();
        renderer.render_thumbnail(
            &self.load_image(page)?,
            &crop_region,
            self.config.thumbnail_max_dimension,
        )
    }

    // ==================== Persistence ====================

    /// Persist the catalog, delete queued blobs and publish the diff.
    ///
    /// If the catalog cannot be written nothing changes: the diff and the
    /// deletion queue are kept for a later retry and no one is notified.
    /// Failing to delete a queued blob is logged and does not fail the save.
    pub fn save(&mut self) -> Result<()> {
        let records: Vec<DocumentRecord> =
            self.documents.values().map(Document::to_record).collect();
        let bytes = catalog::encode(&records)?;

        if let Err(e) = catalog::write_catalog(self.blobs.fs(), self.blobs.root(), &bytes) {
            log::error!("Save failed, keeping pending changes: {}", e);
            return Err(e);
        }

        for name in std::mem::take(&mut self.pending_deletions) {
            if let Err(e) = self.blobs.delete(&name) {
                log::warn!("Failed to delete image blob '{}' after save: {}", name, e);
            }
        }

        let changes = self.tracker.take();
        log::info!(
            "Saved {} documents ({} added, {} updated, {} deleted)",
            records.len(),
            changes.added_documents.len(),
            changes.updated_documents.len(),
            changes.deleted_documents.len()
        );
        self.registry.emit(&changes);
        Ok(())
    }
}

impl<FS: FileSystem> fmt::Debug for DocumentStore<FS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("root", &self.blobs.root())
            .field("documents", &self.documents.len())
            .field("pending_deletions", &self.pending_deletions.len())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Mutable view of one document, borrowed from its store.
pub struct DocumentMut<'a, FS: FileSystem> {
    store: &'a mut DocumentStore<FS>,
    id: DocumentId,
}

impl<FS: FileSystem> DocumentMut<'_, FS> {
    /// The document this handle edits.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// See [`DocumentStore::set_title`].
    pub fn set_title(&mut self, title: Option<String>) -> Result<()> {
        self.store.set_title(self.id, title)
    }

    /// See [`DocumentStore::create_page`].
    pub fn create_page(&mut self, image: &RawImage) -> Result<PageId> {
        self.store.create_page(self.id, image)
    }

    /// See [`DocumentStore::delete_page`].
    pub fn delete_page(&mut self, page: PageId) -> Result<()> {
        self.store.delete_page(self.id, page)
    }

    /// Handle for one of this document's pages.
    pub fn page_mut(&mut self, page: PageId) -> Result<PageMut<'_, FS>> {
        if self.store.page_owners.get(&page) != Some(&self.id) {
            return Err(ScannerError::PageNotInDocument {
                page,
                document: self.id,
            });
        }
        Ok(PageMut {
            store: &mut *self.store,
            id: page,
        })
    }
}

/// Mutable view of one page, borrowed from its store.
pub struct PageMut<'a, FS: FileSystem> {
    store: &'a mut DocumentStore<FS>,
    id: PageId,
}

impl<FS: FileSystem> PageMut<'_, FS> {
    /// The page this handle edits.
    pub fn id(&self) -> PageId {
        self.id
    }

    /// See [`DocumentStore::set_crop_region`].
    pub fn set_crop_region(&mut self, crop_region: CropRegion) -> Result<()> {
        self.store.set_crop_region(self.id, crop_region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockFileSystem;
    use indexmap::IndexSet;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    const ROOT: &str = "/store";

    fn open(fs: &MockFileSystem) -> DocumentStore<MockFileSystem> {
        DocumentStore::open(fs.clone(), StoreConfig::new(PathBuf::from(ROOT))).unwrap()
    }

    fn image(width: u32, height: u32) -> RawImage {
        RawImage::new(width, height, vec![0xFF, 0xD8, 0xFF])
    }

    fn record_saves(store: &DocumentStore<MockFileSystem>) -> Arc<Mutex<Vec<StoreChanges>>> {
        let saves = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&saves);
        store.subscribe(Arc::new(move |changes: &StoreChanges| {
            sink.lock().unwrap().push(changes.clone());
        }));
        saves
    }

    fn blob_path(store: &DocumentStore<MockFileSystem>, page: PageId) -> String {
        format!("{}/{}", ROOT, store.page(page).unwrap().image_name())
    }

    /// Store holding one saved document with one saved page.
    fn saved_store(
        fs: &MockFileSystem,
    ) -> (DocumentStore<MockFileSystem>, DocumentId, PageId) {
        let mut store = open(fs);
        let doc = store.create_document();
        let page = store.create_page(doc, &image(100, 200)).unwrap();
        store.save().unwrap();
        (store, doc, page)
    }

    #[test]
    fn test_open_creates_root() {
        let fs = MockFileSystem::new();
        let store = open(&fs);

        assert!(fs.is_dir(&PathBuf::from(ROOT)));
        assert_eq!(store.document_count(), 0);
        assert!(!store.has_unsaved_changes());
    }

    #[test]
    fn test_open_fails_when_root_cannot_be_created() {
        let fs = MockFileSystem::new();
        fs.set_fail_create_dir(true);

        let result = DocumentStore::open(fs, StoreConfig::new(PathBuf::from(ROOT)));

        assert!(matches!(result, Err(ScannerError::CreateRoot { .. })));
    }

    #[test]
    fn test_receipts_scenario() {
        let fs = MockFileSystem::new();
        let mut store = open(&fs);
        let saves = record_saves(&store);

        let doc = store.create_document();
        store.set_title(doc, Some("Receipts".into())).unwrap();
        store.create_page(doc, &image(1000, 2000)).unwrap();
        store.save().unwrap();

        let catalog: serde_json::Value =
            serde_json::from_slice(&fs.get_content("/store/info").unwrap()).unwrap();
        assert_eq!(catalog[0]["title"], "Receipts");
        assert_eq!(catalog[0]["pages"].as_array().unwrap().len(), 1);
        assert_eq!(catalog[0]["pages"][0]["cropRegion"], "{0, 0, 1000, 2000}");

        let saves = saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].added_documents, IndexSet::from([doc]));
        assert!(saves[0].updated_documents.is_empty());
        assert!(saves[0].deleted_documents.is_empty());
    }

    #[test]
    fn test_crop_then_delete_document_scenario() {
        let fs = MockFileSystem::new();
        let (mut store, doc, page) = saved_store(&fs);
        let saves = record_saves(&store);
        let blob = blob_path(&store, page);

        store
            .set_crop_region(page, CropRegion::new(10.0, 10.0, 500.0, 500.0).unwrap())
            .unwrap();
        store.delete_document(doc).unwrap();

        // Blob stays until the catalog no longer references it
        assert!(fs.get_content(&blob).is_some());

        store.save().unwrap();

        let saves = saves.lock().unwrap();
        assert_eq!(saves[0].deleted_documents, IndexSet::from([doc]));
        assert!(saves[0].updated_documents.is_empty());
        assert!(saves[0].added_documents.is_empty());
        assert!(fs.get_content(&blob).is_none());
    }

    #[test]
    fn test_create_page_failure_changes_nothing() {
        let fs = MockFileSystem::new();
        let (mut store, doc, _page) = saved_store(&fs);
        fs.set_fail_writes(true);

        let result = store.create_page(doc, &image(10, 10));

        assert!(matches!(result, Err(ScannerError::BlobWrite { .. })));
        assert_eq!(store.document(doc).unwrap().page_count(), 1);
        assert!(!store.has_unsaved_changes());
    }

    #[test]
    fn test_create_page_on_missing_document() {
        let fs = MockFileSystem::new();
        let mut store = open(&fs);
        let doc = store.create_document();
        store.delete_document(doc).unwrap();

        assert!(matches!(
            store.create_page(doc, &image(1, 1)),
            Err(ScannerError::DocumentNotFound(_))
        ));
        // No blob was written for the rejected page
        assert_eq!(fs.file_count(), 0);
    }

    #[test]
    fn test_page_added_then_deleted_is_net_zero() {
        let fs = MockFileSystem::new();
        let (mut store, doc, _page) = saved_store(&fs);
        let saves = record_saves(&store);

        let page = store.create_page(doc, &image(5, 5)).unwrap();
        let blob = blob_path(&store, page);
        store.delete_page(doc, page).unwrap();
        store.save().unwrap();

        assert!(saves.lock().unwrap()[0].is_empty());
        assert!(fs.get_content(&blob).is_none());
    }

    #[test]
    fn test_page_changes_reported_under_document() {
        let fs = MockFileSystem::new();
        let (mut store, doc, first) = saved_store(&fs);
        let second = store.create_page(doc, &image(1, 1)).unwrap();
        store.save().unwrap();
        let saves = record_saves(&store);

        let third = store.create_page(doc, &image(3, 3)).unwrap();
        store
            .set_crop_region(first, CropRegion::new(1.0, 1.0, 2.0, 2.0).unwrap())
            .unwrap();
        store
            .set_crop_region(first, CropRegion::new(2.0, 2.0, 2.0, 2.0).unwrap())
            .unwrap();
        store.delete_page(doc, second).unwrap();
        store.save().unwrap();

        let saves = saves.lock().unwrap();
        let changes = saves[0].document_changes(doc).unwrap();
        assert_eq!(changes.added_pages, IndexSet::from([third]));
        assert_eq!(changes.updated_pages, IndexSet::from([first]));
        assert_eq!(changes.deleted_pages, IndexSet::from([second]));
        assert!(!changes.title_changed);
    }

    #[test]
    fn test_delete_page_from_wrong_document_fails_loudly() {
        let fs = MockFileSystem::new();
        let (mut store, _doc, page) = saved_store(&fs);
        let other = store.create_document();

        let err = store.delete_page(other, page).unwrap_err();

        assert!(err.is_precondition_violation());
        assert!(store.page(page).is_some());
        assert!(store.pending_deletions().is_empty());
    }

    #[test]
    fn test_delete_missing_document_fails_loudly() {
        let fs = MockFileSystem::new();
        let mut store = open(&fs);
        let doc = store.create_document();
        store.delete_document(doc).unwrap();

        assert!(matches!(
            store.delete_document(doc),
            Err(ScannerError::DocumentNotFound(_))
        ));
    }

    #[test]
    fn test_failed_save_preserves_state_for_retry() {
        let fs = MockFileSystem::new();
        let (mut store, doc, page) = saved_store(&fs);
        let saves = record_saves(&store);
        let blob = blob_path(&store, page);

        store.set_title(doc, Some("Taxes".into())).unwrap();
        store.delete_page(doc, page).unwrap();
        let before = store.pending_changes().clone();

        fs.set_fail_writes(true);
        assert!(matches!(
            store.save(),
            Err(ScannerError::CatalogWrite { .. })
        ));

        assert!(fs.get_content(&blob).is_some());
        assert_eq!(store.pending_changes(), &before);
        assert_eq!(store.pending_deletions().len(), 1);
        assert!(saves.lock().unwrap().is_empty());

        fs.set_fail_writes(false);
        store.save().unwrap();

        let saves = saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0], before);
        assert!(fs.get_content(&blob).is_none());
    }

    #[test]
    fn test_blob_delete_failure_does_not_fail_save() {
        let fs = MockFileSystem::new();
        let (mut store, doc, _page) = saved_store(&fs);
        let saves = record_saves(&store);

        store.delete_document(doc).unwrap();
        fs.set_fail_deletes(true);

        store.save().unwrap();

        assert_eq!(saves.lock().unwrap().len(), 1);
        assert!(store.pending_deletions().is_empty());
        assert!(!store.has_unsaved_changes());
    }

    #[test]
    fn test_second_save_delivers_empty_diff() {
        let fs = MockFileSystem::new();
        let mut store = open(&fs);
        let saves = record_saves(&store);

        store.create_document();
        store.save().unwrap();
        store.save().unwrap();

        let saves = saves.lock().unwrap();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[0].added_documents.len(), 1);
        assert!(saves[1].is_empty());
    }

    #[test]
    fn test_title_setter_records_once() {
        let fs = MockFileSystem::new();
        let (mut store, doc, _page) = saved_store(&fs);

        store.set_title(doc, Some("A".into())).unwrap();
        store.set_title(doc, Some("B".into())).unwrap();

        let pending = store.pending_changes();
        assert_eq!(pending.updated_documents.len(), 1);
        assert!(pending.document_changes(doc).unwrap().title_changed);
    }

    #[test]
    fn test_setting_same_values_records_nothing() {
        let fs = MockFileSystem::new();
        let (mut store, doc, page) = saved_store(&fs);
        let crop = store.page(page).unwrap().crop_region();

        store.set_title(doc, None).unwrap();
        store.set_crop_region(page, crop).unwrap();

        assert!(!store.has_unsaved_changes());
    }

    #[test]
    fn test_handles_route_through_tracker() {
        let fs = MockFileSystem::new();
        let (mut store, doc, page) = saved_store(&fs);

        {
            let mut document = store.document_mut(doc).unwrap();
            document.set_title(Some("Handles".into())).unwrap();
            let added = document.create_page(&image(4, 4)).unwrap();
            document
                .page_mut(page)
                .unwrap()
                .set_crop_region(CropRegion::new(0.0, 0.0, 50.0, 50.0).unwrap())
                .unwrap();
            document.delete_page(added).unwrap();
        }

        let changes = store.pending_changes().document_changes(doc).unwrap();
        assert!(changes.title_changed);
        assert_eq!(changes.updated_pages, IndexSet::from([page]));
        assert!(changes.added_pages.is_empty());
        assert_eq!(store.document(doc).unwrap().title(), Some("Handles"));
    }

    #[test]
    fn test_page_handle_rejects_foreign_page() {
        let fs = MockFileSystem::new();
        let (mut store, _doc, page) = saved_store(&fs);
        let other = store.create_document();

        let mut document = store.document_mut(other).unwrap();
        assert!(matches!(
            document.page_mut(page),
            Err(ScannerError::PageNotInDocument { .. })
        ));
    }

    #[test]
    fn test_reopen_restores_documents() {
        let fs = MockFileSystem::new();
        let mut store = open(&fs);
        let doc = store.create_document();
        store.set_title(doc, Some("Receipts".into())).unwrap();
        let page = store.create_page(doc, &image(640, 480)).unwrap();
        store
            .set_crop_region(page, CropRegion::new(5.0, 5.0, 100.0, 80.0).unwrap())
            .unwrap();
        store.create_document();
        store.save().unwrap();
        let image_name = store.page(page).unwrap().image_name().to_string();

        let reopened = open(&fs);
        let documents: Vec<_> = reopened.documents().collect();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].title(), Some("Receipts"));
        assert_eq!(documents[0].pages()[0].image_name(), image_name);
        assert_eq!(
            documents[0].pages()[0].crop_region(),
            CropRegion::new(5.0, 5.0, 100.0, 80.0).unwrap()
        );
        assert_eq!(documents[1].title(), None);
        assert!(!reopened.has_unsaved_changes());
    }

    #[test]
    fn test_open_sweeps_orphaned_blobs() {
        let fs = MockFileSystem::new();
        let (mut store, doc, page) = saved_store(&fs);
        let kept = blob_path(&store, page);

        // Simulate a crash after a page image was written but before save
        let orphan = store.create_page(doc, &image(1, 1)).unwrap();
        let orphan_blob = blob_path(&store, orphan);
        drop(store);
        fs.write_binary(&PathBuf::from("/store/info.tmp"), b"partial")
            .unwrap();

        let reopened = open(&fs);

        assert_eq!(reopened.documents().next().unwrap().page_count(), 1);
        assert!(fs.get_content(&kept).is_some());
        assert!(fs.get_content(&orphan_blob).is_none());
        assert!(fs.get_content("/store/info.tmp").is_none());
        assert!(fs.get_content("/store/info").is_some());
    }

    #[test]
    fn test_open_drops_pages_with_missing_blobs() {
        let fs = MockFileSystem::new()
            .with_dir(ROOT)
            .with_file("/store/present", b"jpeg")
            .with_file(
                "/store/info",
                br#"[{ "title": "T", "pages": [
                    { "imageName": "present", "cropRegion": "{0, 0, 1, 1}" },
                    { "imageName": "missing", "cropRegion": "{0, 0, 1, 1}" }
                ] }]"#,
            );

        let store = open(&fs);
        let document = store.documents().next().unwrap();

        assert_eq!(document.page_count(), 1);
        assert_eq!(document.pages()[0].image_name(), "present");
    }

    #[test]
    fn test_open_keeps_blobs_of_undecodable_pages() {
        let catalog: &[u8] = br#"[{ "pages": [
            { "imageName": "good", "cropRegion": "{0, 0, 1, 1}" },
            { "imageName": "legacy", "cropRegion": "{{0, 0}, {ten, 10}}" }
        ] }]"#;
        let fs = MockFileSystem::new()
            .with_dir(ROOT)
            .with_file("/store/good", b"jpeg")
            .with_file("/store/legacy", b"jpeg")
            .with_file("/store/stray", b"jpeg")
            .with_file("/store/info", catalog);

        let store = open(&fs);

        assert_eq!(store.documents().next().unwrap().page_count(), 1);
        assert!(!store.has_unsaved_changes());
        assert_eq!(fs.get_content("/store/info"), Some(catalog.to_vec()));
        assert!(fs.get_content("/store/legacy").is_some());
        assert!(fs.get_content("/store/stray").is_none());
    }

    #[test]
    fn test_open_drops_pages_sharing_an_image() {
        let fs = MockFileSystem::new()
            .with_dir(ROOT)
            .with_file("/store/shared", b"jpeg")
            .with_file(
                "/store/info",
                br#"[
                    { "title": "First", "pages": [{ "imageName": "shared", "cropRegion": "{0, 0, 1, 1}" }] },
                    { "title": "Second", "pages": [{ "imageName": "shared", "cropRegion": "{0, 0, 2, 2}" }] }
                ]"#,
            );

        let mut store = open(&fs);
        let counts: Vec<_> = store.documents().map(Document::page_count).collect();
        assert_eq!(counts, vec![1, 0]);

        let first_page = store.documents().next().unwrap().pages()[0].id();
        let second = store.documents().nth(1).unwrap().id();
        store.delete_document(second).unwrap();
        store.save().unwrap();

        assert_eq!(store.load_image(first_page).unwrap(), b"jpeg".to_vec());
    }

    #[test]
    fn test_open_propagates_unreadable_catalog() {
        let fs = MockFileSystem::new()
            .with_dir(ROOT)
            .with_file("/store/info", b"not json");

        let result = DocumentStore::open(fs, StoreConfig::new(PathBuf::from(ROOT)));

        assert!(matches!(result, Err(ScannerError::CatalogFormat(_))));
    }

    #[test]
    fn test_load_image_and_render() {
        struct SizeRenderer;

        impl PageRenderer for SizeRenderer {
            fn render(&self, image: &[u8], crop: &CropRegion) -> Result<PixelBuffer> {
                Ok(PixelBuffer {
                    width: crop.width() as u32,
                    height: crop.height() as u32,
                    pixels: image.to_vec(),
                })
            }

            fn render_thumbnail(
                &self,
                image: &[u8],
                _crop: &CropRegion,
                max_dimension: u32,
            ) -> Result<PixelBuffer> {
                Ok(PixelBuffer {
                    width: max_dimension,
                    height: max_dimension,
                    pixels: image.to_vec(),
                })
            }
        }

        let fs = MockFileSystem::new();
        let (store, _doc, page) = saved_store(&fs);

        assert_eq!(store.load_image(page).unwrap(), vec![0xFF, 0xD8, 0xFF]);

        let full = store.render_page(page, &SizeRenderer).unwrap();
        assert_eq!((full.width, full.height), (100, 200));

        let thumb = store.render_thumbnail(page, &SizeRenderer).unwrap();
        assert_eq!(thumb.width, store.config().thumbnail_max_dimension);
    }

    #[test]
    fn test_custom_encoder_receives_quality() {
        struct RecordingEncoder(Arc<Mutex<Option<f32>>>);

        impl ImageEncoder for RecordingEncoder {
            fn encode(&self, image: &RawImage, quality: f32) -> Result<Vec<u8>> {
                *self.0.lock().unwrap() = Some(quality);
                Ok(image.data.iter().rev().copied().collect())
            }
        }

        let fs = MockFileSystem::new();
        let seen = Arc::new(Mutex::new(None));
        let mut store = DocumentStore::open_with_encoder(
            fs.clone(),
            StoreConfig::new(PathBuf::from(ROOT)),
            Box::new(RecordingEncoder(Arc::clone(&seen))),
        )
        .unwrap();

        let doc = store.create_document();
        let page = store
            .create_page(doc, &RawImage::new(1, 1, vec![1, 2, 3]))
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(0.9));
        assert_eq!(store.load_image(page).unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn test_encoder_failure_changes_nothing() {
        struct FailingEncoder;

        impl ImageEncoder for FailingEncoder {
            fn encode(&self, _image: &RawImage, _quality: f32) -> Result<Vec<u8>> {
                Err(ScannerError::ImageEncode("unsupported format".into()))
            }
        }

        let fs = MockFileSystem::new();
        let mut store = DocumentStore::open_with_encoder(
            fs.clone(),
            StoreConfig::new(PathBuf::from(ROOT)),
            Box::new(FailingEncoder),
        )
        .unwrap();
        let doc = store.create_document();

        assert!(store.create_page(doc, &image(1, 1)).is_err());
        assert_eq!(store.document(doc).unwrap().page_count(), 0);
        assert_eq!(fs.file_count(), 0);
    }

    #[test]
    fn test_unsubscribed_callback_not_invoked() {
        let fs = MockFileSystem::new();
        let mut store = open(&fs);
        let calls = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&calls);
        let id = store.subscribe(Arc::new(move |_: &StoreChanges| {
            *sink.lock().unwrap() += 1
        }));

        store.save().unwrap();
        assert!(store.unsubscribe(id));
        store.save().unwrap();

        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_cleared_subscribers_not_invoked() {
        let fs = MockFileSystem::new();
        let mut store = open(&fs);
        let saves = record_saves(&store);
        store.subscribe(Arc::new(|_: &StoreChanges| {}));
        assert_eq!(store.subscriber_count(), 2);

        store.clear_subscribers();
        store.create_document();
        store.save().unwrap();

        assert_eq!(store.subscriber_count(), 0);
        assert!(saves.lock().unwrap().is_empty());
    }
}
