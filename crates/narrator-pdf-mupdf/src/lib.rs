use mupdf::{Colorspace, Document, ImageFormat, Matrix, Page, TextPageFlags};

use narrator_core::backend::{BackendError, PdfBackend, PdfDocument};
use narrator_core::PageImage;

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate is the sole AGPL island: it isolates the mupdf dependency
/// (which is AGPL-3.0) so that the rest of the pipeline does not
/// transitively depend on it.
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfBackend;

impl MupdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for MupdfBackend {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, BackendError> {
        let document =
            Document::from_bytes(bytes, "pdf").map_err(|e| BackendError::OpenError(e.to_string()))?;
        let page_count = document
            .page_count()
            .map_err(|e| BackendError::OpenError(e.to_string()))?;
        tracing::debug!(pages = page_count, bytes = bytes.len(), "opened PDF");
        Ok(Box::new(MupdfDocument {
            document,
            page_count: page_count.max(0) as usize,
        }))
    }
}

struct MupdfDocument {
    document: Document,
    page_count: usize,
}

impl MupdfDocument {
    fn load(&self, index: usize) -> Result<Page, BackendError> {
        self.document
            .load_page(index as i32)
            .map_err(|e| BackendError::ExtractionError(format!("page {}: {}", index + 1, e)))
    }
}

impl PdfDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_text(&self, index: usize) -> Result<String, BackendError> {
        let page = self.load(index)?;
        let text_page = page
            .to_text_page(TextPageFlags::empty())
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

        // Block/line iteration keeps reading order the way PyMuPDF's get_text() does
        let mut page_text = String::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                let line_text: String = line
                    .chars()
                    .map(|c| c.char().unwrap_or('\u{FFFD}'))
                    .collect();
                page_text.push_str(&line_text);
                page_text.push('\n');
            }
        }
        Ok(page_text)
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<PageImage, BackendError> {
        let render_err = |e: mupdf::Error| BackendError::RenderError {
            page: index,
            message: e.to_string(),
        };

        let page = self.load(index)?;
        // PDF user space is 72 units per inch
        let scale = dpi as f32 / 72.0;
        let pixmap = page
            .to_pixmap(
                &Matrix::new_scale(scale, scale),
                &Colorspace::device_rgb(),
                false,
                true,
            )
            .map_err(render_err)?;

        let file = tempfile::Builder::new()
            .prefix("narrator-render-")
            .suffix(".png")
            .tempfile()?;
        let path = file.path().to_str().ok_or_else(|| BackendError::RenderError {
            page: index,
            message: "temporary path is not valid UTF-8".into(),
        })?;
        pixmap.save_as(path, ImageFormat::PNG).map_err(render_err)?;
        let png = std::fs::read(file.path())?;

        tracing::debug!(page = index + 1, dpi, bytes = png.len(), "rendered page");
        Ok(PageImage {
            index,
            width: pixmap.width() as u32,
            height: pixmap.height() as u32,
            png,
        })
    }
}
