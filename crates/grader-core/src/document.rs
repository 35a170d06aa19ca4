//! Page and document model.
//!
//! A [`Document`] is the ordered page list produced by one upload and owned
//! exclusively by the grading session; the next upload replaces it wholesale.
//! Each [`Page`] owns its raster, which never changes after load, and an
//! optional annotation snapshot written only by the page store's save path.

use crate::page_store::PageSnapshot;
use image::RgbaImage;

#[derive(Debug, Clone)]
pub struct Page {
    raster: RgbaImage,
    snapshot: Option<PageSnapshot>,
    visited: bool,
}

impl Page {
    pub(crate) fn new(raster: RgbaImage) -> Self {
        Self { raster, snapshot: None, visited: false }
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn visited(&self) -> bool {
        self.visited
    }

    pub fn snapshot(&self) -> Option<&PageSnapshot> {
        self.snapshot.as_ref()
    }

    pub(crate) fn mark_visited(&mut self) {
        self.visited = true;
    }

    pub(crate) fn set_snapshot(&mut self, snapshot: Option<PageSnapshot>) {
        self.snapshot = snapshot;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pages: Vec<Page>,
}

impl Document {
    pub fn new(rasters: Vec<RgbaImage>) -> Self {
        Self { pages: rasters.into_iter().map(Page::new).collect() }
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Pages are numbered 1 through `page_count`, the way an evaluator reads
    /// them off the page indicator.
    pub fn page(&self, page_no: u32) -> Option<&Page> {
        (page_no as usize).checked_sub(1).and_then(|index| self.pages.get(index))
    }

    pub(crate) fn page_mut(&mut self, page_no: u32) -> Option<&mut Page> {
        (page_no as usize).checked_sub(1).and_then(|index| self.pages.get_mut(index))
    }

    pub(crate) fn pages_mut(&mut self) -> impl Iterator<Item = &mut Page> {
        self.pages.iter_mut()
    }

    pub fn contains_page(&self, page_no: u32) -> bool {
        page_no >= 1 && page_no <= self.page_count()
    }
}
