//! Optical character recognition for pages without a text layer.

use std::io::Write;
use std::process::Command;

use thiserror::Error;

use crate::PageImage;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("failed to run OCR engine '{binary}': {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recognizes text in a rendered page image.
pub trait OcrEngine: Send + Sync {
    /// `language` is a Tesseract language code such as "eng" or "hin".
    fn recognize(&self, image: &PageImage, language: &str) -> Result<String, OcrError>;
}

/// [`OcrEngine`] backed by the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: String,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &crate::Config) -> Self {
        Self::new(config.tesseract_path.clone())
    }

    /// Whether the configured binary can be launched at all.
    pub fn is_available(&self) -> bool {
        let ok = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !ok {
            tracing::debug!(binary = %self.binary, "tesseract not found");
        }
        ok
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &PageImage, language: &str) -> Result<String, OcrError> {
        let mut file = tempfile::Builder::new()
            .prefix("narrator-page-")
            .suffix(".png")
            .tempfile()?;
        file.write_all(&image.png)?;
        file.flush()?;

        let output = Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .output()
            .map_err(|source| OcrError::Launch {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
