use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::ids::IdError;
use crate::patch::PatchError;
use crate::repositories::StoreError;
use crate::validation::ValidationError;

/// Failures of the content lifecycle operations.
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("failed to read message body")]
    ReadingBody(#[source] std::io::Error),

    #[error("failed to parse json body: {0}")]
    Parse(#[source] serde_json::Error),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("content for this url is already in progress")]
    AlreadyInProgress,

    #[error("content not found")]
    NotFound,

    #[error("content for this url is in progress in another collection")]
    InProgressInOtherCollection,

    #[error("{count} approved items for {url} are scheduled to publish; expected at most one")]
    IntegrityViolation { url: String, count: usize },

    #[error("content store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("failed to generate content id: {0}")]
    IdGeneration(#[from] IdError),
}

impl From<StoreError> for ContentError {
    fn from(err: StoreError) -> Self {
        match err {
            // The in-progress uniqueness constraint is the authoritative
            // signal for a concurrent draft on the same url.
            StoreError::UniqueViolation => ContentError::AlreadyInProgress,
            other => ContentError::StoreUnavailable(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request path: {0}")]
    ValidationError(#[from] ValidationError),

    #[error(transparent)]
    Content(#[from] ContentError),
}

impl From<PatchError> for ApiError {
    fn from(err: PatchError) -> Self {
        ApiError::Content(ContentError::Patch(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::ValidationError(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Content(err) => match err {
                ContentError::ReadingBody(_)
                | ContentError::Parse(_)
                | ContentError::Patch(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                ContentError::AlreadyInProgress => (StatusCode::CONFLICT, err.to_string()),
                ContentError::NotFound | ContentError::InProgressInOtherCollection => {
                    (StatusCode::NOT_FOUND, err.to_string())
                }
                ContentError::IntegrityViolation { .. }
                | ContentError::StoreUnavailable(_)
                | ContentError::IdGeneration(_) => {
                    // Log the detailed error but don't expose it to the client
                    error!(error = %err, "Request failed with an internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
