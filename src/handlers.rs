use crate::config::Config;
use crate::dedup::DedupGuard;
use crate::pipeline::Dispatcher;
use axum::{http::StatusCode, Json};
use std::sync::Arc;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Webhook de-duplication set (process lifetime).
    pub dedup: DedupGuard,
    /// Background dispatch runner with its collaborators and status cache.
    pub dispatcher: Arc<Dispatcher>,
}

/// Root liveness endpoint.
pub async fn root() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "geodesist-dispatch"
        })),
    )
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "service": "geodesist-dispatch",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
