use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use narrator_core::{Config, Services};
use narrator_pdf_mupdf::MupdfBackend;

mod handlers;
mod models;
mod state;
mod upload;

use state::AppState;

fn app(state: Arc<AppState>) -> axum::Router {
    // Allow uploads of large scanned documents (100MB)
    let body_limit = DefaultBodyLimit::max(100 * 1024 * 1024);

    axum::Router::new()
        .route("/sessions", post(handlers::sessions::create))
        .route(
            "/sessions/{id}",
            get(handlers::sessions::show).delete(handlers::sessions::delete),
        )
        .route("/sessions/{id}/feedback", post(handlers::feedback::feedback))
        .route("/sessions/{id}/audio", get(handlers::audio::audio))
        .layer(body_limit)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("warn,narrator_core=info,narrator_web=info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load();
    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; uploads will fail until it is configured");
    }
    tracing::info!(?config, "configuration loaded");

    let services = Services::live(&config, Arc::new(MupdfBackend::new()));
    let max_sessions = std::env::var("NARRATOR_MAX_SESSIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(state::DEFAULT_MAX_SESSIONS);
    let session_ttl = std::env::var("NARRATOR_SESSION_TTL")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(state::DEFAULT_SESSION_TTL);
    let state = Arc::new(AppState::new(services, config).with_limits(max_sessions, session_ttl));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5001);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
