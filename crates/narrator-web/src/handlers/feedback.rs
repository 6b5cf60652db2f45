use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};

use crate::models::{ApiError, FeedbackRequest, SessionJson};
use crate::state::AppState;

/// `POST /sessions/{id}/feedback`: regenerate the explanation and its audio.
///
/// Requests for the same session are serialized by the session lock.
pub async fn feedback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<SessionJson>, ApiError> {
    let session = state
        .session(&id)
        .ok_or_else(|| ApiError::SessionNotFound(id.clone()))?;
    let mut orchestrator = session.lock().await;

    tracing::info!(session = %id, "feedback received");
    let snapshot = orchestrator.submit_feedback(&req.feedback).await?;
    Ok(Json(SessionJson::new(&id, orchestrator.stage(), &snapshot)))
}
