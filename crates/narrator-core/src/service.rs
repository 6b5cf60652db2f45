//! Service traits for the remote text-generation and speech backends.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    MissingCredential(String),
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited or out of quota (429)")]
    RateLimited,
    #[error("request rejected with HTTP {status}; check the API key")]
    Unauthorized { status: u16 },
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("empty response: {0}")]
    EmptyResponse(String),
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Classify a non-success HTTP status.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => ServiceError::RateLimited,
            401 | 403 => ServiceError::Unauthorized { status },
            _ => ServiceError::Status { status, body },
        }
    }
}

/// One prompt sent to a [`GenerativeTextService`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRequest {
    pub system_instruction: Option<String>,
    pub prompt: String,
}

/// A remote model that turns a prompt into text.
pub trait GenerativeTextService: Send + Sync {
    /// Name of the backing service, for logs (e.g., "Gemini").
    fn name(&self) -> &str;

    fn generate<'a>(
        &'a self,
        request: &'a TextRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, ServiceError>> + Send + 'a>>;
}

/// A remote text-to-speech engine producing MP3 bytes.
pub trait SpeechService: Send + Sync {
    fn name(&self) -> &str;

    /// Synthesize `text` spoken in the language identified by `lang_code`
    /// (ISO 639-1).
    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        lang_code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ServiceError>> + Send + 'a>>;
}
