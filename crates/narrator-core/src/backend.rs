use thiserror::Error;

use crate::PageImage;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("failed to render page {page}: {message}")]
    RenderError { page: usize, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDF backends.
///
/// Implementors parse the raw document bytes; the per-page OCR fallback and
/// text normalization live in [`crate::extractor::TextExtractor`].
pub trait PdfBackend: Send + Sync {
    /// Parse a PDF from its bytes. Malformed input fails with
    /// [`BackendError::OpenError`].
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, BackendError>;
}

/// An opened document whose pages can be read in order.
pub trait PdfDocument {
    fn page_count(&self) -> usize;

    /// Text of the page's embedded text layer (may be empty for scans).
    fn page_text(&self, index: usize) -> Result<String, BackendError>;

    /// Rasterize the page at `dpi` for OCR.
    fn render_page(&self, index: usize, dpi: u32) -> Result<PageImage, BackendError>;
}
