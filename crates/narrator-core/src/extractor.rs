use std::sync::Arc;

use crate::backend::PdfBackend;
use crate::ocr::OcrEngine;
use crate::text_processing::{clean_text, expand_ligatures};
use crate::{ExtractedText, PipelineError};

/// Separator placed between consecutive pages.
pub const PAGE_DELIMITER: &str = "\n";

/// Turns PDF bytes into plain text, page by page.
///
/// Each page's embedded text layer is used when it contains anything other
/// than whitespace; otherwise the page is rendered and run through OCR.
pub struct TextExtractor {
    backend: Arc<dyn PdfBackend>,
    ocr: Arc<dyn OcrEngine>,
    dpi: u32,
    language: String,
}

impl TextExtractor {
    pub fn new(backend: Arc<dyn PdfBackend>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            backend,
            ocr,
            dpi: 300,
            language: "eng".to_string(),
        }
    }

    /// Set the Tesseract language used for scanned pages.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the resolution pages are rendered at before OCR.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.max(1);
        self
    }

    /// Extract the text of every page, joined in page order.
    ///
    /// A document without pages yields an empty [`ExtractedText`]. A page
    /// whose OCR fails or finds nothing contributes an empty string. Only an
    /// unreadable document is an error.
    pub fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, PipelineError> {
        let document = self.backend.open(bytes)?;
        let page_count = document.page_count();

        let mut pages_text = Vec::with_capacity(page_count);
        let mut ocr_pages = Vec::new();

        for index in 0..page_count {
            let text = clean_text(&expand_ligatures(&document.page_text(index)?));
            if !text.is_empty() {
                pages_text.push(text);
                continue;
            }

            ocr_pages.push(index);
            let recognized = document
                .render_page(index, self.dpi)
                .map_err(|e| e.to_string())
                .and_then(|image| {
                    self.ocr
                        .recognize(&image, &self.language)
                        .map_err(|e| e.to_string())
                });

            match recognized {
                Ok(raw) => {
                    let text = clean_text(&raw);
                    tracing::debug!(page = index + 1, chars = text.len(), "OCR fallback");
                    pages_text.push(text);
                }
                Err(e) => {
                    tracing::warn!(page = index + 1, error = %e, "OCR failed for page");
                    pages_text.push(String::new());
                }
            }
        }

        tracing::info!(
            pages = page_count,
            ocr_pages = ocr_pages.len(),
            "text extraction complete"
        );

        Ok(ExtractedText::new(
            pages_text.join(PAGE_DELIMITER),
            page_count,
            ocr_pages,
        ))
    }
}
