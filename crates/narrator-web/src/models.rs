use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use narrator_core::{PipelineError, Snapshot, Stage};

/// Characters of extracted text included in session responses.
pub const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionJson {
    pub session_id: String,
    pub state: String,
    pub revision: u32,
    pub source_name: String,
    pub summary: String,
    pub explanation: String,
    pub preview: String,
    pub page_count: usize,
    pub ocr_pages: Vec<usize>,
    /// `None` when the explanation had nothing to speak.
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorJson>,
}

impl SessionJson {
    pub fn new(session_id: &str, stage: Stage, snapshot: &Snapshot) -> Self {
        SessionJson {
            session_id: session_id.to_string(),
            state: stage.as_str().to_string(),
            revision: snapshot.revision,
            source_name: snapshot.source_name.clone(),
            summary: snapshot.content.summary.clone(),
            explanation: snapshot.content.explanation.clone(),
            preview: snapshot.extracted.preview(PREVIEW_CHARS),
            page_count: snapshot.extracted.page_count(),
            ocr_pages: snapshot.extracted.ocr_pages().to_vec(),
            audio_url: (!snapshot.audio.is_empty())
                .then(|| format!("/sessions/{}/audio", session_id)),
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorJson {
    pub error: String,
    pub kind: String,
}

/// Errors returned by handlers as `{error, kind}` JSON.
#[derive(Debug)]
pub enum ApiError {
    Pipeline(PipelineError),
    SessionNotFound(String),
    BadUpload(String),
    NoAudio,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(e) => match e {
                PipelineError::InvalidInput(_) | PipelineError::InvalidState(_) => {
                    StatusCode::BAD_REQUEST
                }
                PipelineError::DocumentParse(_) | PipelineError::EmptyDocument => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PipelineError::Generation(_) | PipelineError::Synthesis(_) => {
                    StatusCode::BAD_GATEWAY
                }
                PipelineError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::SessionNotFound(_) | ApiError::NoAudio => StatusCode::NOT_FOUND,
            ApiError::BadUpload(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn to_json(&self) -> ErrorJson {
        let (error, kind) = match self {
            ApiError::Pipeline(e) => (e.to_string(), e.kind()),
            ApiError::SessionNotFound(id) => (format!("Unknown session '{}'", id), "not_found"),
            ApiError::BadUpload(msg) => (msg.clone(), "invalid_input"),
            ApiError::NoAudio => (
                "The current explanation has no audio".to_string(),
                "no_audio",
            ),
        };
        ErrorJson {
            error,
            kind: kind.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = ?self, "request failed");
        }
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_status_codes() {
        let cases = [
            (PipelineError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (PipelineError::InvalidState("x".into()), StatusCode::BAD_REQUEST),
            (PipelineError::DocumentParse("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (PipelineError::EmptyDocument, StatusCode::UNPROCESSABLE_ENTITY),
            (PipelineError::Generation("x".into()), StatusCode::BAD_GATEWAY),
            (PipelineError::Synthesis("x".into()), StatusCode::BAD_GATEWAY),
            (PipelineError::Configuration("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn error_json_carries_kind() {
        let json = ApiError::from(PipelineError::EmptyDocument).to_json();
        assert_eq!(json.kind, "empty_document");
        assert!(json.error.contains("no text"));
    }
}
