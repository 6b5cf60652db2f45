use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;

use narrator_core::{Language, Orchestrator, PipelineError, PipelineEvent};

use crate::models::{ApiError, ErrorJson, SessionJson};
use crate::state::AppState;
use crate::upload::parse_multipart;

/// `POST /sessions`: run the full pipeline on an uploaded PDF in a new session.
pub async fn create(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<SessionJson>, ApiError> {
    let form = parse_multipart(multipart).await.map_err(ApiError::BadUpload)?;

    let mut config = state.config.clone();
    if let Some(name) = &form.language {
        config.language = Language::lookup(name).ok_or_else(|| {
            ApiError::Pipeline(PipelineError::InvalidInput(format!(
                "Unsupported language '{}'",
                name
            )))
        })?;
    }
    if !form.keywords.is_empty() {
        config.keywords = form.keywords;
    }

    let source = form.file.filename.clone();
    let mut orchestrator = Orchestrator::from_services(&state.services, &config).with_observer(
        move |event: PipelineEvent| match event {
            PipelineEvent::StageChanged { from, to } => {
                tracing::debug!(%from, %to, "session stage change");
            }
            PipelineEvent::OcrFallback { pages } => {
                tracing::info!(?pages, "OCR fallback used");
            }
            PipelineEvent::Failed { stage, kind, .. } => {
                tracing::warn!(%stage, kind, "session action failed");
            }
        },
    );

    tracing::info!(file = %source, language = config.language.code, "new upload");
    let snapshot = orchestrator.process(source, form.file.data).await?;
    let stage = orchestrator.stage();
    let session_id = state.insert_session(orchestrator);

    Ok(Json(SessionJson::new(&session_id, stage, &snapshot)))
}

/// `GET /sessions/{id}`: the session's current snapshot.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionJson>, ApiError> {
    let session = state
        .session(&id)
        .ok_or_else(|| ApiError::SessionNotFound(id.clone()))?;
    let orchestrator = session.lock().await;
    let snapshot = orchestrator.snapshot().ok_or_else(|| {
        ApiError::Pipeline(PipelineError::InvalidState(
            "session has no result yet".to_string(),
        ))
    })?;

    let mut json = SessionJson::new(&id, orchestrator.stage(), &snapshot);
    json.last_error = orchestrator.last_error().map(|f| ErrorJson {
        error: f.message.clone(),
        kind: f.kind.to_string(),
    });
    Ok(Json(json))
}

/// `DELETE /sessions/{id}`: drop the session and everything it holds.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.remove_session(&id) {
        return Err(ApiError::SessionNotFound(id));
    }
    tracing::info!(session = %id, "session deleted");
    Ok(StatusCode::NO_CONTENT)
}
