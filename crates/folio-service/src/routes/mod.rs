use crate::AppState;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tracing::warn;

pub mod v1;

async fn health<S: AppState>(State(state): State<S>) -> Response {
    match state.content_store().check_health().await {
        Ok(()) => "OK".into_response(),
        Err(err) => {
            warn!(error = %err, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

/// The full service surface: a root health check and the versioned API.
pub fn create_router<S: AppState>() -> Router<S> {
    Router::new()
        .route("/health", get(health::<S>))
        .nest("/api/v1", v1::create_api_v1_router())
}
