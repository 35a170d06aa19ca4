//! Page navigation with per-page annotation persistence.
//!
//! The store owns the loaded [`Document`] plus one working [`PageBuffer`] for
//! the page under the evaluator's pen. Leaving a page always flushes the
//! buffer into an opaque [`PageSnapshot`] keyed by that page before the next
//! page's state is restored, so marks can never bleed between pages and an
//! A to B to A round trip restores A exactly as it was left.

use crate::annotation::Annotation;
use crate::document::Document;
use crate::overlay::{self, Overlay};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Serialized annotation state for one page. Opaque to everything except the
/// store's own save and restore paths.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSnapshot(Vec<u8>);

impl PageSnapshot {
    pub fn size_bytes(&self) -> usize {
        self.0.len()
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotPayload {
    records: Vec<Annotation>,
    overlay_png: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum PageStoreError {
    #[error("no document is loaded")]
    NoDocument,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("snapshot encode failed: {0}")]
    SnapshotEncode(String),
    #[error("snapshot decode failed: {0}")]
    SnapshotDecode(String),
}

/// Working annotation state for the current page: the overlay pixels, the
/// append-only record log, and a revision counter used to skip snapshot
/// writes when nothing changed since the last flush.
#[derive(Debug, Clone)]
pub struct PageBuffer {
    overlay: Overlay,
    records: Vec<Annotation>,
    rev: u64,
    saved_rev: u64,
}

impl PageBuffer {
    fn new(width: u32, height: u32) -> Self {
        Self { overlay: Overlay::new(width, height), records: Vec::new(), rev: 0, saved_rev: 0 }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Borrow the overlay for drawing. Every borrow counts as an edit for
    /// dirty tracking; callers take it once per compositing operation.
    pub fn edit(&mut self) -> &mut Overlay {
        self.rev += 1;
        &mut self.overlay
    }

    pub fn records(&self) -> &[Annotation] {
        &self.records
    }

    pub fn push_record(&mut self, record: Annotation) {
        self.rev += 1;
        self.records.push(record);
    }

    /// Removes the newest record. Composited pixels stay on the overlay;
    /// record-level undo is the documented extent of undo support.
    pub fn undo_last(&mut self) -> Option<Annotation> {
        let record = self.records.pop();
        if record.is_some() {
            self.rev += 1;
        }
        record
    }

    pub fn clear(&mut self) {
        // A restored buffer can carry ink with an empty record log (undo is
        // record-level), so the overlay must be checked on its own.
        if self.records.is_empty() && !self.is_dirty() && self.overlay.ink_count() == 0 {
            return;
        }

        self.overlay.clear();
        self.records.clear();
        self.rev += 1;
    }

    pub fn is_dirty(&self) -> bool {
        self.rev != self.saved_rev
    }

    fn mark_saved(&mut self) {
        self.saved_rev = self.rev;
    }

    fn to_snapshot(&self) -> Result<PageSnapshot, PageStoreError> {
        let overlay_png =
            self.overlay.to_png().map_err(|err| PageStoreError::SnapshotEncode(err.to_string()))?;
        let payload = SnapshotPayload { records: self.records.clone(), overlay_png };

        let bytes = serde_json::to_vec(&payload)
            .map_err(|err| PageStoreError::SnapshotEncode(err.to_string()))?;
        Ok(PageSnapshot(bytes))
    }

    fn from_snapshot(snapshot: &PageSnapshot) -> Result<Self, PageStoreError> {
        let payload: SnapshotPayload = serde_json::from_slice(&snapshot.0)
            .map_err(|err| PageStoreError::SnapshotDecode(err.to_string()))?;
        let overlay = Overlay::from_png(&payload.overlay_png)
            .map_err(|err| PageStoreError::SnapshotDecode(err.to_string()))?;

        Ok(Self { overlay, records: payload.records, rev: 0, saved_rev: 0 })
    }
}

#[derive(Debug, Default)]
pub struct PageStore {
    document: Option<Document>,
    current: u32,
    buffer: Option<PageBuffer>,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a freshly loaded document, replacing any previous one
    /// wholesale. The view starts on page 1 with an empty buffer.
    pub fn load(&mut self, document: Document) {
        if document.is_empty() {
            self.document = None;
            self.buffer = None;
            self.current = 0;
            return;
        }

        let pages = document.page_count();
        let (width, height) = document
            .page(1)
            .map(|page| (page.raster().width(), page.raster().height()))
            .unwrap_or((1, 1));

        self.document = Some(document);
        self.current = 1;
        self.buffer = Some(PageBuffer::new(width, height));
        if let Some(page) = self.document.as_mut().and_then(|doc| doc.page_mut(1)) {
            page.mark_visited();
        }

        debug!(pages, "document installed");
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map(Document::page_count).unwrap_or(0)
    }

    pub fn current_page(&self) -> Option<u32> {
        self.document.as_ref().map(|_| self.current)
    }

    pub fn buffer(&self) -> Option<&PageBuffer> {
        self.buffer.as_ref()
    }

    pub fn buffer_mut(&mut self) -> Option<&mut PageBuffer> {
        self.buffer.as_mut()
    }

    pub fn current_raster(&self) -> Option<&RgbaImage> {
        self.document.as_ref().and_then(|doc| doc.page(self.current)).map(|page| page.raster())
    }

    /// The current page as presentation sees it: raster plus live overlay.
    pub fn composited_current(&self) -> Option<RgbaImage> {
        let raster = self.current_raster()?;
        let buffer = self.buffer.as_ref()?;
        Some(overlay::composite(raster, buffer.overlay()))
    }

    pub fn visited(&self, page_no: u32) -> bool {
        self.document
            .as_ref()
            .and_then(|doc| doc.page(page_no))
            .map(|page| page.visited())
            .unwrap_or(false)
    }

    /// Navigates to `page_no`: flush the outgoing buffer, then restore the
    /// incoming page's snapshot onto a fresh buffer (or present an empty
    /// one), then mark the page visited.
    pub fn switch_to(&mut self, page_no: u32) -> Result<(), PageStoreError> {
        let page_count = match &self.document {
            Some(document) => document.page_count(),
            None => return Err(PageStoreError::NoDocument),
        };
        if !(1..=page_count).contains(&page_no) {
            return Err(PageStoreError::PageOutOfRange { page: page_no, page_count });
        }
        if page_no == self.current {
            return Ok(());
        }

        self.flush_current()?;

        let Some(document) = self.document.as_mut() else {
            return Err(PageStoreError::NoDocument);
        };
        let Some(page) = document.page_mut(page_no) else {
            return Err(PageStoreError::PageOutOfRange { page: page_no, page_count });
        };

        let buffer = match page.snapshot() {
            Some(snapshot) => PageBuffer::from_snapshot(snapshot)?,
            None => PageBuffer::new(page.raster().width(), page.raster().height()),
        };

        page.mark_visited();
        self.current = page_no;
        self.buffer = Some(buffer);

        debug!(page = page_no, "switched to page");
        Ok(())
    }

    /// Returns true when a page change happened, false at the last page.
    pub fn next_page(&mut self) -> Result<bool, PageStoreError> {
        if self.document.is_none() {
            return Err(PageStoreError::NoDocument);
        }
        if self.current >= self.page_count() {
            return Ok(false);
        }

        self.switch_to(self.current + 1)?;
        Ok(true)
    }

    /// Returns true when a page change happened, false at page 1.
    pub fn prev_page(&mut self) -> Result<bool, PageStoreError> {
        if self.document.is_none() {
            return Err(PageStoreError::NoDocument);
        }
        if self.current <= 1 {
            return Ok(false);
        }

        self.switch_to(self.current - 1)?;
        Ok(true)
    }

    /// Writes the current buffer into its page's snapshot slot, skipping the
    /// write when nothing changed since the last flush.
    pub fn flush_current(&mut self) -> Result<(), PageStoreError> {
        let (Some(document), Some(buffer)) = (self.document.as_mut(), self.buffer.as_mut()) else {
            return Ok(());
        };
        if !buffer.is_dirty() {
            return Ok(());
        }

        let snapshot = buffer.to_snapshot()?;
        if let Some(page) = document.page_mut(self.current) {
            page.set_snapshot(Some(snapshot));
        }
        buffer.mark_saved();

        debug!(page = self.current, "flushed annotation snapshot");
        Ok(())
    }

    /// Removes every mark from the active page only.
    pub fn clear_current(&mut self) -> Result<(), PageStoreError> {
        let (Some(document), Some(buffer)) = (self.document.as_mut(), self.buffer.as_mut()) else {
            return Err(PageStoreError::NoDocument);
        };

        buffer.clear();
        buffer.mark_saved();
        if let Some(page) = document.page_mut(self.current) {
            page.set_snapshot(None);
        }

        debug!(page = self.current, "cleared page");
        Ok(())
    }

    /// Removes every mark from every page.
    pub fn clear_all(&mut self) -> Result<(), PageStoreError> {
        let (Some(document), Some(buffer)) = (self.document.as_mut(), self.buffer.as_mut()) else {
            return Err(PageStoreError::NoDocument);
        };

        buffer.clear();
        buffer.mark_saved();
        for page in document.pages_mut() {
            page.set_snapshot(None);
        }

        debug!("cleared all pages");
        Ok(())
    }
}
