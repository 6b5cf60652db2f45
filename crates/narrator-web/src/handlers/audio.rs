use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::models::ApiError;
use crate::state::AppState;

/// `GET /sessions/{id}/audio`: the narrated explanation of the current snapshot.
pub async fn audio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let session = state
        .session(&id)
        .ok_or_else(|| ApiError::SessionNotFound(id.clone()))?;
    let snapshot = session.lock().await.snapshot().ok_or(ApiError::NoAudio)?;
    if snapshot.audio.is_empty() {
        return Err(ApiError::NoAudio);
    }

    let filename = format!(
        "explanation-r{}.{}",
        snapshot.revision,
        snapshot.audio.format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, snapshot.audio.format.mime_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
        ],
        snapshot.audio.bytes.clone(),
    )
        .into_response())
}
