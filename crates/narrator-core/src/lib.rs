use std::fmt;

use thiserror::Error;

pub mod backend;
pub mod config_file;
pub mod extractor;
pub mod gemini;
pub mod generator;
pub mod language;
pub mod mock;
pub mod ocr;
pub mod orchestrator;
pub mod prompt;
pub mod service;
pub mod speech;
pub mod text_processing;
pub mod tts;

// Re-export for convenience
pub use backend::{BackendError, PdfBackend, PdfDocument};
pub use extractor::TextExtractor;
pub use gemini::GeminiClient;
pub use generator::ContentGenerator;
pub use language::{Language, SUPPORTED_LANGUAGES};
pub use ocr::{OcrEngine, OcrError, TesseractOcr};
pub use orchestrator::{Failure, Orchestrator, PipelineEvent, Services, Snapshot, Stage};
pub use service::{GenerativeTextService, ServiceError, SpeechService, TextRequest};
pub use speech::SpeechSynthesizer;
pub use tts::GoogleTranslateTts;

/// A rendered page image handed to an [`OcrEngine`].
///
/// Only lives for the duration of a single page's OCR fallback.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based page index within the document.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded image bytes.
    pub png: Vec<u8>,
}

/// The best-effort plain text of a whole document, pages joined in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    text: String,
    page_count: usize,
    ocr_pages: Vec<usize>,
}

impl ExtractedText {
    pub fn new(text: String, page_count: usize, ocr_pages: Vec<usize>) -> Self {
        Self {
            text,
            page_count,
            ocr_pages,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// True when the document contained no recognizable text at all.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// 0-based indices of pages whose text came from OCR.
    pub fn ocr_pages(&self) -> &[usize] {
        &self.ocr_pages
    }

    /// First `max_chars` characters, with an ellipsis when truncated.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.text.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{}...", head.trim_end())
        } else {
            head
        }
    }
}

impl fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A summary and an explanation produced by one generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedContent {
    pub summary: String,
    pub explanation: String,
}

/// Input to a feedback-driven regeneration.
#[derive(Debug, Clone, Default)]
pub struct FeedbackRequest {
    pub prior_summary: String,
    pub prior_explanation: String,
    pub feedback_text: String,
    /// Earlier feedback of the same session, oldest first.
    pub history: Vec<String>,
}

impl FeedbackRequest {
    pub fn new(prior: &GeneratedContent, feedback_text: impl Into<String>) -> Self {
        Self {
            prior_summary: prior.summary.clone(),
            prior_explanation: prior.explanation.clone(),
            feedback_text: feedback_text.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.history = history;
        self
    }
}

/// Encoding of an [`AudioClip`]'s bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
}

impl AudioFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
        }
    }
}

/// Synthesized speech for one explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioClip {
    pub fn mp3(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            format: AudioFormat::Mp3,
        }
    }

    pub fn empty() -> Self {
        Self::mp3(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Errors surfaced to the presentation layer.
///
/// None of these are retried. Each one ends the current action and leaves the
/// previous stable snapshot (if any) in place.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("could not read PDF: {0}")]
    DocumentParse(String),
    #[error("no text could be extracted from the PDF")]
    EmptyDocument,
    #[error("content generation failed: {0}")]
    Generation(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::DocumentParse(_) => "document_parse",
            PipelineError::EmptyDocument => "empty_document",
            PipelineError::Generation(_) => "generation",
            PipelineError::Synthesis(_) => "synthesis",
            PipelineError::Configuration(_) => "configuration",
            PipelineError::InvalidState(_) => "invalid_state",
            PipelineError::InvalidInput(_) => "invalid_input",
        }
    }

    /// Map a generative-text service failure onto the pipeline taxonomy.
    pub(crate) fn from_generation(err: ServiceError) -> Self {
        match err {
            ServiceError::MissingCredential(msg) => PipelineError::Configuration(msg),
            other => PipelineError::Generation(other.to_string()),
        }
    }

    /// Map a speech service failure onto the pipeline taxonomy.
    pub(crate) fn from_synthesis(err: ServiceError) -> Self {
        match err {
            ServiceError::MissingCredential(msg) => PipelineError::Configuration(msg),
            other => PipelineError::Synthesis(other.to_string()),
        }
    }
}

impl From<BackendError> for PipelineError {
    fn from(err: BackendError) -> Self {
        PipelineError::DocumentParse(err.to_string())
    }
}

/// Whether a feedback-driven regeneration also revises the summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryPolicy {
    /// Always carry the previous summary over.
    Keep,
    /// Always ask the model for a revised summary as well.
    Regenerate,
    /// Keep the summary unless the feedback explicitly mentions it.
    #[default]
    FollowFeedback,
}

impl SummaryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryPolicy::Keep => "keep",
            SummaryPolicy::Regenerate => "regenerate",
            SummaryPolicy::FollowFeedback => "follow",
        }
    }
}

impl std::str::FromStr for SummaryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(SummaryPolicy::Keep),
            "regenerate" => Ok(SummaryPolicy::Regenerate),
            "follow" | "follow-feedback" | "follow_feedback" => Ok(SummaryPolicy::FollowFeedback),
            other => Err(format!(
                "unknown summary policy '{}' (expected keep, regenerate or follow)",
                other
            )),
        }
    }
}

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TTS_BASE_URL: &str = "https://translate.google.com";

/// Configuration for the pipeline, injected into each component at construction.
#[derive(Clone)]
pub struct Config {
    /// Gemini API key. Checked on first use, not at construction.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub tts_base_url: String,
    /// Output language for the generated text and the speech.
    pub language: Language,
    /// Topics the user is particularly interested in.
    pub keywords: Vec<String>,
    pub summary_policy: SummaryPolicy,
    pub ocr_dpi: u32,
    /// Tesseract language code (e.g. "eng", "hin"). When unset, OCR follows
    /// the output language.
    pub ocr_language: Option<String>,
    /// Tesseract binary; resolved through `PATH` when relative.
    pub tesseract_path: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "***"),
            )
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("tts_base_url", &self.tts_base_url)
            .field("language", &self.language)
            .field("keywords", &self.keywords)
            .field("summary_policy", &self.summary_policy)
            .field("ocr_dpi", &self.ocr_dpi)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_path", &self.tesseract_path)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: 0.7,
            request_timeout_secs: 120,
            tts_base_url: DEFAULT_TTS_BASE_URL.to_string(),
            language: Language::default(),
            keywords: vec![],
            summary_policy: SummaryPolicy::default(),
            ocr_dpi: 300,
            ocr_language: None,
            tesseract_path: "tesseract".to_string(),
        }
    }
}

impl Config {
    /// Overlay values from a parsed config file onto `self`.
    ///
    /// Only fields present in the file are applied.
    pub fn apply_file(&mut self, file: &config_file::ConfigFile) {
        if let Some(keys) = &file.api_keys
            && let Some(key) = &keys.gemini_api_key
        {
            self.gemini_api_key = Some(key.clone());
        }
        if let Some(generation) = &file.generation {
            if let Some(model) = &generation.model {
                self.gemini_model = model.clone();
            }
            if let Some(url) = &generation.base_url {
                self.gemini_base_url = url.clone();
            }
            if let Some(t) = generation.temperature {
                self.temperature = t;
            }
            if let Some(secs) = generation.timeout_secs {
                self.request_timeout_secs = secs;
            }
            if let Some(lang) = generation.language.as_deref().and_then(Language::lookup) {
                self.language = lang;
            }
            if let Some(keywords) = &generation.keywords {
                self.keywords = keywords.clone();
            }
            if let Some(policy) = generation
                .summary_policy
                .as_deref()
                .and_then(|p| p.parse().ok())
            {
                self.summary_policy = policy;
            }
        }
        if let Some(speech) = &file.speech
            && let Some(url) = &speech.base_url
        {
            self.tts_base_url = url.clone();
        }
        if let Some(ocr) = &file.ocr {
            if let Some(dpi) = ocr.dpi {
                self.ocr_dpi = dpi;
            }
            if let Some(lang) = &ocr.language {
                self.ocr_language = Some(lang.clone());
            }
            if let Some(path) = &ocr.tesseract_path {
                self.tesseract_path = path.clone();
            }
        }
    }

    /// Overlay values from process environment variables onto `self`.
    pub fn apply_env(&mut self) {
        if let Some(key) = std::env::var("GEMINI_API_KEY")
            .ok()
            .or_else(|| std::env::var("Gemini_API_Key").ok())
            .filter(|k| !k.trim().is_empty())
        {
            self.gemini_api_key = Some(key);
        }
        if let Ok(model) = std::env::var("NARRATOR_MODEL") {
            self.gemini_model = model;
        }
        if let Some(lang) = std::env::var("NARRATOR_LANGUAGE")
            .ok()
            .and_then(|l| Language::lookup(&l))
        {
            self.language = lang;
        }
        if let Some(secs) = std::env::var("NARRATOR_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.request_timeout_secs = secs;
        }
        if let Ok(path) = std::env::var("TESSERACT_PATH") {
            self.tesseract_path = path;
        }
    }

    /// Tesseract language for scanned pages.
    pub fn tesseract_language(&self) -> &str {
        self.ocr_language
            .as_deref()
            .unwrap_or(self.language.tesseract)
    }

    /// Defaults, overlaid by the config files, overlaid by the environment.
    pub fn load() -> Self {
        let mut config = Config::default();
        config.apply_file(&config_file::load_config());
        config.apply_env();
        config
    }
}
