//! In-crate test doubles: a deterministic rasterizer plus tiny fixture
//! builders, shared by the unit tests of several modules.

use std::collections::HashMap;
use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use raster_engine::{PageRasterizer, PageSize, RasterError, SheetHandle, UploadSource};

/// Bytes the [`FakeRasterizer`] accepts as an n-page document.
pub fn fake_pdf_bytes(page_count: u32) -> Vec<u8> {
    format!("FAKEPDF {page_count}").into_bytes()
}

/// A real 2x2 PNG whose pixels are all `[tag, 99, 99, 255]`, so page order
/// can be asserted from the decoded raster.
pub fn png_bytes(tag: u8) -> Vec<u8> {
    let image = RgbaImage::from_pixel(2, 2, Rgba([tag, 99, 99, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encoding a fixture png should succeed");
    bytes
}

/// Deterministic stand-in for the PDF backend. It accepts only
/// [`fake_pdf_bytes`] payloads and renders 16x16 white pages whose top-left
/// pixel encodes the page number.
#[derive(Debug, Default)]
pub struct FakeRasterizer {
    next_handle: u64,
    open_sheets: HashMap<SheetHandle, u32>,
}

impl FakeRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.open_sheets.len()
    }

    fn page_count_of(&self, handle: SheetHandle) -> Result<u32, RasterError> {
        self.open_sheets.get(&handle).copied().ok_or(RasterError::InvalidHandle(handle.raw()))
    }
}

impl PageRasterizer for FakeRasterizer {
    fn open(&mut self, source: UploadSource) -> Result<SheetHandle, RasterError> {
        let (_, bytes) = source.into_named_bytes()?;
        let page_count = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|text| text.strip_prefix("FAKEPDF "))
            .and_then(|count| count.trim().parse::<u32>().ok());

        let Some(page_count) = page_count else {
            return Err(RasterError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "not a fake sheet",
            )));
        };

        self.next_handle += 1;
        let handle = SheetHandle::from_raw(self.next_handle);
        self.open_sheets.insert(handle, page_count);
        Ok(handle)
    }

    fn page_count(&self, handle: SheetHandle) -> Result<u32, RasterError> {
        self.page_count_of(handle)
    }

    fn page_size(&self, handle: SheetHandle, page_no: u32) -> Result<PageSize, RasterError> {
        let page_count = self.page_count_of(handle)?;
        if !(1..=page_count).contains(&page_no) {
            return Err(RasterError::PageOutOfRange { page: page_no, page_count });
        }
        Ok(PageSize::default())
    }

    fn render_page(
        &self,
        handle: SheetHandle,
        page_no: u32,
        _scale: f32,
    ) -> Result<RgbaImage, RasterError> {
        let page_count = self.page_count_of(handle)?;
        if !(1..=page_count).contains(&page_no) {
            return Err(RasterError::PageOutOfRange { page: page_no, page_count });
        }

        let mut page = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
        page.put_pixel(0, 0, Rgba([page_no as u8, 0, 0, 255]));
        Ok(page)
    }

    fn close(&mut self, handle: SheetHandle) -> Result<(), RasterError> {
        if self.open_sheets.remove(&handle).is_none() {
            return Err(RasterError::InvalidHandle(handle.raw()));
        }
        Ok(())
    }
}
