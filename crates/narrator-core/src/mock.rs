//! Deterministic in-process stand-ins for the PDF, OCR, text and speech
//! backends. Used by tests and by offline runs that must not touch the network.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::{BackendError, PdfBackend, PdfDocument};
use crate::ocr::{OcrEngine, OcrError};
use crate::service::{GenerativeTextService, ServiceError, SpeechService, TextRequest};
use crate::PageImage;

/// One page of a [`FakePdfBackend`] document.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    /// Text-layer content; empty simulates a scanned page.
    pub text: String,
    /// What OCR "sees" when this page is rendered.
    pub scanned: String,
}

impl FakePage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scanned: String::new(),
        }
    }

    pub fn scanned(scanned: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            scanned: scanned.into(),
        }
    }
}

/// A [`PdfBackend`] serving a fixed list of pages.
///
/// Any input not starting with `%PDF-` is rejected as malformed. Rendered
/// pages carry their `scanned` text as the image payload so that
/// [`FakeOcrEngine`] can read it back.
#[derive(Debug, Clone, Default)]
pub struct FakePdfBackend {
    pages: Vec<FakePage>,
    render_count: std::sync::Arc<AtomicUsize>,
}

impl FakePdfBackend {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            render_count: Default::default(),
        }
    }

    /// How many pages have been rasterized.
    pub fn render_count(&self) -> usize {
        self.render_count.load(Ordering::SeqCst)
    }
}

struct FakeDocument {
    pages: Vec<FakePage>,
    render_count: std::sync::Arc<AtomicUsize>,
}

impl PdfBackend for FakePdfBackend {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, BackendError> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(BackendError::OpenError("no PDF header".into()));
        }
        Ok(Box::new(FakeDocument {
            pages: self.pages.clone(),
            render_count: std::sync::Arc::clone(&self.render_count),
        }))
    }
}

impl PdfDocument for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String, BackendError> {
        self.pages
            .get(index)
            .map(|p| p.text.clone())
            .ok_or_else(|| BackendError::ExtractionError(format!("no page {}", index)))
    }

    fn render_page(&self, index: usize, _dpi: u32) -> Result<PageImage, BackendError> {
        self.render_count.fetch_add(1, Ordering::SeqCst);
        let page = self.pages.get(index).ok_or(BackendError::RenderError {
            page: index,
            message: "out of range".into(),
        })?;
        Ok(PageImage {
            index,
            width: 1,
            height: 1,
            png: page.scanned.clone().into_bytes(),
        })
    }
}

/// An [`OcrEngine`] that "recognizes" the UTF-8 payload of the image.
#[derive(Debug, Default)]
pub struct FakeOcrEngine {
    fail: bool,
    call_count: AtomicUsize,
    languages: Mutex<Vec<String>>,
}

impl FakeOcrEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose every call fails, as if the binary were missing.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The language passed to each call, oldest first.
    pub fn languages(&self) -> Vec<String> {
        self.languages.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl OcrEngine for FakeOcrEngine {
    fn recognize(&self, image: &PageImage, language: &str) -> Result<String, OcrError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut languages) = self.languages.lock() {
            languages.push(language.to_string());
        }
        if self.fail {
            return Err(OcrError::Failed {
                status: "exit status: 1".into(),
                stderr: "simulated OCR failure".into(),
            });
        }
        Ok(String::from_utf8_lossy(&image.png).into_owned())
    }
}

/// A configurable response for [`ScriptedTextService`].
#[derive(Clone, Debug)]
pub enum ScriptedResponse {
    Text(String),
    RateLimited,
    MissingCredential,
    Error(String),
}

/// A [`GenerativeTextService`] replaying scripted responses in order and
/// recording every request. The last response repeats once the script is
/// exhausted.
pub struct ScriptedTextService {
    responses: Mutex<Vec<ScriptedResponse>>,
    fallback: ScriptedResponse,
    requests: Mutex<Vec<TextRequest>>,
}

impl ScriptedTextService {
    /// Create a service that always answers `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_sequence(vec![ScriptedResponse::Text(text.into())])
    }

    pub fn with_sequence(mut responses: Vec<ScriptedResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        // Reverse so we can pop() from the front cheaply.
        responses.reverse();
        let fallback = responses[0].clone();
        Self {
            responses: Mutex::new(responses),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// All requests received so far, oldest first.
    pub fn requests(&self) -> Vec<TextRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_response(&self) -> ScriptedResponse {
        match self.responses.lock() {
            Ok(mut seq) => seq.pop().unwrap_or_else(|| self.fallback.clone()),
            Err(_) => self.fallback.clone(),
        }
    }
}

impl GenerativeTextService for ScriptedTextService {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn generate<'a>(
        &'a self,
        request: &'a TextRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, ServiceError>> + Send + 'a>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let response = self.next_response();

        Box::pin(async move {
            match response {
                ScriptedResponse::Text(text) => Ok(text),
                ScriptedResponse::RateLimited => Err(ServiceError::RateLimited),
                ScriptedResponse::MissingCredential => Err(ServiceError::MissingCredential(
                    "GEMINI_API_KEY is not set".into(),
                )),
                ScriptedResponse::Error(msg) => Err(ServiceError::Other(msg)),
            }
        })
    }
}

/// A [`SpeechService`] returning `MP3:<text>` as the audio bytes and
/// recording every text it was asked to speak.
#[derive(Default)]
pub struct RecordingSpeechService {
    fail: bool,
    texts: Mutex<Vec<String>>,
}

impl RecordingSpeechService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.texts.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// The bytes this service produces for `text`.
    pub fn audio_for(text: &str) -> Vec<u8> {
        format!("MP3:{}", text).into_bytes()
    }
}

impl SpeechService for RecordingSpeechService {
    fn name(&self) -> &str {
        "Recording"
    }

    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        _lang_code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ServiceError>> + Send + 'a>> {
        if let Ok(mut texts) = self.texts.lock() {
            texts.push(text.to_string());
        }
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(ServiceError::Status {
                    status: 503,
                    body: "speech service unavailable".into(),
                })
            } else {
                Ok(Self::audio_for(text))
            }
        })
    }
}
