//! Upload intake: validates answer-sheet files and rasterizes them into a
//! [`Document`], one batch per upload.

use crate::document::Document;
use image::RgbaImage;
use raster_engine::{
    decode_bitmap, PageRasterizer, RasterError, SheetFormat, SheetHandle, ALLOWED_EXTENSIONS,
};
use tracing::{debug, info};

pub use raster_engine::UploadSource;

pub const DEFAULT_UPSCALE: f32 = 1.5;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum DocumentLoadError {
    #[error("no files were provided")]
    EmptyBatch,
    #[error("unsupported file type: {name} (accepted: {})", ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedFormat { name: String },
    #[error("{name} is too large ({size_bytes} bytes, limit {limit_bytes})")]
    FileTooLarge { name: String, size_bytes: u64, limit_bytes: u64 },
    #[error("failed to read {name}")]
    Read {
        name: String,
        #[source]
        source: RasterError,
    },
    #[error("failed to rasterize {name}")]
    Raster {
        name: String,
        #[source]
        source: RasterError,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct LoaderConfig {
    /// Render scale applied to PDF pages. Marks land on the upscaled raster,
    /// so this is fixed for the life of a document.
    pub upscale: f32,
    pub max_file_bytes: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { upscale: DEFAULT_UPSCALE, max_file_bytes: DEFAULT_MAX_FILE_BYTES }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upscale(mut self, upscale: f32) -> Self {
        self.upscale = upscale;
        self
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }
}

/// Identifies one upload attempt. Only the newest ticket's result is kept;
/// anything older finishes its work and is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket(u64);

#[derive(Debug)]
pub enum UploadOutcome {
    Loaded(Document),
    Superseded,
}

/// Turns upload batches into documents using an injected [`PageRasterizer`].
/// PDFs contribute one page per PDF page; bitmap files contribute one page
/// each. Pages keep the order of the source list.
#[derive(Debug)]
pub struct DocumentLoader<R: PageRasterizer> {
    rasterizer: R,
    config: LoaderConfig,
    generation: u64,
}

impl<R: PageRasterizer> DocumentLoader<R> {
    pub fn new(rasterizer: R) -> Self {
        Self::with_config(rasterizer, LoaderConfig::default())
    }

    pub fn with_config(rasterizer: R, config: LoaderConfig) -> Self {
        Self { rasterizer, config, generation: 0 }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Starts a new upload attempt, invalidating every ticket handed out
    /// before it.
    pub fn begin_upload(&mut self) -> UploadTicket {
        self.generation += 1;
        UploadTicket(self.generation)
    }

    /// Validates and rasterizes a batch. A stale ticket still does the full
    /// rasterization, then reports [`UploadOutcome::Superseded`] so the
    /// caller never installs an out-of-date document.
    pub fn load_batch(
        &mut self,
        ticket: UploadTicket,
        sources: Vec<UploadSource>,
    ) -> Result<UploadOutcome, DocumentLoadError> {
        if sources.is_empty() {
            return Err(DocumentLoadError::EmptyBatch);
        }

        let mut pages = Vec::new();
        for source in sources {
            self.append_source(source, &mut pages)?;
        }

        if ticket.0 != self.generation {
            debug!(ticket = ticket.0, generation = self.generation, "upload superseded");
            return Ok(UploadOutcome::Superseded);
        }

        info!(pages = pages.len(), "upload rasterized");
        Ok(UploadOutcome::Loaded(Document::new(pages)))
    }

    fn append_source(
        &mut self,
        source: UploadSource,
        pages: &mut Vec<RgbaImage>,
    ) -> Result<(), DocumentLoadError> {
        let name = source.file_name();
        let Some(format) = SheetFormat::from_name(&name) else {
            return Err(DocumentLoadError::UnsupportedFormat { name });
        };

        let (name, bytes) = match source.into_named_bytes() {
            Ok(pair) => pair,
            Err(err) => return Err(DocumentLoadError::Read { name, source: err }),
        };

        let size_bytes = bytes.len() as u64;
        if size_bytes > self.config.max_file_bytes {
            return Err(DocumentLoadError::FileTooLarge {
                name,
                size_bytes,
                limit_bytes: self.config.max_file_bytes,
            });
        }

        debug!(name = %name, ?format, size_bytes, "rasterizing upload");
        if format.is_pdf() {
            self.append_pdf_pages(&name, bytes, pages)
        } else {
            let page =
                decode_bitmap(&bytes).map_err(|source| DocumentLoadError::Raster { name, source })?;
            pages.push(page);
            Ok(())
        }
    }

    fn append_pdf_pages(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
        pages: &mut Vec<RgbaImage>,
    ) -> Result<(), DocumentLoadError> {
        let handle = self
            .rasterizer
            .open(UploadSource::from_named_bytes(name, bytes))
            .map_err(|source| DocumentLoadError::Raster { name: name.to_string(), source })?;

        let rendered = self.render_pages(handle, pages);
        let _ = self.rasterizer.close(handle);

        rendered.map_err(|source| DocumentLoadError::Raster { name: name.to_string(), source })
    }

    fn render_pages(
        &self,
        handle: SheetHandle,
        pages: &mut Vec<RgbaImage>,
    ) -> Result<(), RasterError> {
        let page_count = self.rasterizer.page_count(handle)?;
        for page_no in 1..=page_count {
            pages.push(self.rasterizer.render_page(handle, page_no, self.config.upscale)?);
        }
        Ok(())
    }
}
