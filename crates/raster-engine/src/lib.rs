use image::{ImageBuffer, Rgba};
use lopdf::Document;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// File kinds accepted for an answer-sheet upload, keyed off the filename
/// extension (case-insensitive). Anything else is rejected before any bytes
/// are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Pdf,
    Png,
    Jpeg,
    Tiff,
    Bmp,
    Webp,
    Gif,
}

pub const ALLOWED_EXTENSIONS: &[&str] =
    &["pdf", "png", "jpg", "jpeg", "tiff", "bmp", "jfif", "webp", "gif"];

impl SheetFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        let extension = name.rsplit_once('.')?.1.to_ascii_lowercase();

        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" | "jfif" => Some(Self::Jpeg),
            "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn is_pdf(self) -> bool {
        matches!(self, Self::Pdf)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SheetHandle(u64);

impl SheetHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

/// One uploaded file: either a path to read from disk, or bytes that arrived
/// with a filename attached (the shape the upload surface hands over).
#[derive(Debug, Clone)]
pub enum UploadSource {
    Path(PathBuf),
    Bytes { name: String, bytes: Vec<u8> },
}

impl UploadSource {
    pub fn from_named_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::Bytes { name: name.into(), bytes }
    }

    pub fn file_name(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Bytes { name, .. } => name.clone(),
        }
    }

    pub fn into_named_bytes(self) -> Result<(String, Vec<u8>), RasterError> {
        match self {
            Self::Path(path) => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let bytes = fs::read(&path)?;
                Ok((name, bytes))
            }
            Self::Bytes { name, bytes } => Ok((name, bytes)),
        }
    }
}

impl From<PathBuf> for UploadSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for UploadSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("unknown sheet handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    Encrypted,
    #[error("document has no pages")]
    EmptyDocument,
}

/// The rasterization capability injected into the grading engine. Pages are
/// numbered from 1, matching how evaluators and PDF viewers count them.
pub trait PageRasterizer {
    fn open(&mut self, source: UploadSource) -> Result<SheetHandle, RasterError>;
    fn page_count(&self, handle: SheetHandle) -> Result<u32, RasterError>;
    fn page_size(&self, handle: SheetHandle, page_no: u32) -> Result<PageSize, RasterError>;
    fn render_page(
        &self,
        handle: SheetHandle,
        page_no: u32,
        scale: f32,
    ) -> Result<RgbaImage, RasterError>;
    fn close(&mut self, handle: SheetHandle) -> Result<(), RasterError>;
}

/// Decodes a bitmap upload (PNG, JPEG, TIFF, BMP, WEBP, GIF) into RGBA.
pub fn decode_bitmap(bytes: &[u8]) -> Result<RgbaImage, RasterError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

#[derive(Debug, Clone)]
struct OpenSheet {
    page_sizes: Vec<PageSize>,
}

/// Pure-Rust default backend: parses the page tree with lopdf and renders
/// blank page surfaces at the requested scale. It does not paint content
/// streams; scanned answer sheets are normally uploaded as bitmaps, and the
/// PDF path exists so multi-page documents keep their page structure.
#[derive(Debug, Default)]
pub struct LopdfRasterizer {
    next_handle: u64,
    sheets: HashMap<SheetHandle, OpenSheet>,
}

impl LopdfRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_page_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, RasterError> {
        // The default backend cannot decrypt; detect the marker before lopdf
        // fails with a less useful parse error.
        if bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(RasterError::Encrypted);
        }

        let doc = Document::load_mem(bytes)?;
        let mut sizes = Vec::new();

        for (_page_no, object_id) in doc.get_pages() {
            let size = doc
                .get_dictionary(object_id)
                .ok()
                .and_then(|dict| dict.get(b"MediaBox").ok())
                .and_then(|media_box| media_box.as_array().ok())
                .and_then(|array| media_box_size(array))
                .unwrap_or_default();

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(RasterError::EmptyDocument);
        }

        Ok(sizes)
    }

    fn sheet(&self, handle: SheetHandle) -> Result<&OpenSheet, RasterError> {
        self.sheets.get(&handle).ok_or(RasterError::InvalidHandle(handle.raw()))
    }
}

fn media_box_size(array: &[lopdf::Object]) -> Option<PageSize> {
    if array.len() != 4 {
        return None;
    }

    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;

    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
}

impl PageRasterizer for LopdfRasterizer {
    fn open(&mut self, source: UploadSource) -> Result<SheetHandle, RasterError> {
        let (_, bytes) = source.into_named_bytes()?;
        let page_sizes = Self::parse_page_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = SheetHandle(self.next_handle);
        self.sheets.insert(handle, OpenSheet { page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: SheetHandle) -> Result<u32, RasterError> {
        Ok(self.sheet(handle)?.page_sizes.len() as u32)
    }

    fn page_size(&self, handle: SheetHandle, page_no: u32) -> Result<PageSize, RasterError> {
        let sheet = self.sheet(handle)?;
        let page_count = sheet.page_sizes.len() as u32;

        (page_no as usize)
            .checked_sub(1)
            .and_then(|index| sheet.page_sizes.get(index))
            .copied()
            .ok_or(RasterError::PageOutOfRange { page: page_no, page_count })
    }

    fn render_page(
        &self,
        handle: SheetHandle,
        page_no: u32,
        scale: f32,
    ) -> Result<RgbaImage, RasterError> {
        let size = self.page_size(handle, page_no)?;
        let scale = if scale > 0.0 { scale } else { 1.0 };

        let width = (size.width_pt * scale).round().max(1.0) as u32;
        let height = (size.height_pt * scale).round().max(1.0) as u32;
        let mut surface = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width < 4 || height < 4 {
            return Ok(surface);
        }

        let edge = Rgba([220, 220, 220, 255]);
        for x in 0..width {
            surface.put_pixel(x, 0, edge);
            surface.put_pixel(x, height - 1, edge);
        }
        for y in 0..height {
            surface.put_pixel(0, y, edge);
            surface.put_pixel(width - 1, y, edge);
        }

        Ok(surface)
    }

    fn close(&mut self, handle: SheetHandle) -> Result<(), RasterError> {
        self.sheets.remove(&handle).map(|_| ()).ok_or(RasterError::InvalidHandle(handle.raw()))
    }
}

pub fn default_rasterizer() -> LopdfRasterizer {
    LopdfRasterizer::new()
}
