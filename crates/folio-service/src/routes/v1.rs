use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::AppState;
use crate::errors::ApiError;
use crate::models::{self, ContentItem};
use crate::patch::parse_patches;
use crate::validation::{normalize_content_url, validate_collection_id};

/// Tail used when a route addresses the root page, which `{*url}` cannot match.
const ROOT_URL: &str = "/";

#[derive(Debug, Serialize)]
struct NextPublishDateResponse {
    url: String,
    #[serde(serialize_with = "models::timestamps::serialize_optional")]
    next_publish_date: Option<NaiveDateTime>,
}

#[instrument(skip_all, fields(collection_id = %collection_id, url = %url, body_length = body.len()))]
async fn add_collection_content<S: AppState>(
    State(state): State<S>,
    Path((collection_id, url)): Path<(String, String)>,
    body: Bytes,
) -> Result<(StatusCode, ResponseJson<ContentItem>), ApiError> {
    debug!("Processing add content request");

    let collection_id = validate_collection_id(&collection_id)?;
    let url = normalize_content_url(&url)?;
    debug!(normalized_url = %url, "URL validated and normalized");

    let new_content =
        models::parse_content(body.as_ref(), collection_id, &url, state.id_generator())?;
    let stored = state.content_store().add_draft(&new_content).await?;

    info!(id = %stored.id, "Successfully created draft content");
    Ok((StatusCode::CREATED, ResponseJson(stored)))
}

#[instrument(skip_all, fields(collection_id = %collection_id, url = %url))]
async fn get_collection_content<S: AppState>(
    State(state): State<S>,
    Path((collection_id, url)): Path<(String, String)>,
) -> Result<ResponseJson<ContentItem>, ApiError> {
    debug!("Processing get in-progress content request");

    let collection_id = validate_collection_id(&collection_id)?;
    let url = normalize_content_url(&url)?;

    let content = state
        .content_store()
        .get_in_progress_by_url(&url, collection_id)
        .await?;

    info!(id = %content.id, "Successfully retrieved in-progress content");
    Ok(ResponseJson(content))
}

#[instrument(skip_all, fields(collection_id = %collection_id, url = %url, body_length = body.len()))]
async fn patch_collection_content<S: AppState>(
    State(state): State<S>,
    Path((collection_id, url)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    debug!("Processing patch content request");

    let collection_id = validate_collection_id(&collection_id)?;
    let url = normalize_content_url(&url)?;
    let patches = parse_patches(body.as_ref())?;

    state
        .content_store()
        .patch_content(&url, collection_id, &patches)
        .await?;

    info!(patch_count = patches.len(), "Successfully patched content");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, fields(url = %url))]
async fn get_published_content<S: AppState>(
    State(state): State<S>,
    Path(url): Path<String>,
) -> Result<ResponseJson<ContentItem>, ApiError> {
    debug!("Processing get published content request");

    let url = normalize_content_url(&url)?;
    let mut content = state.content_store().get_published_by_url(&url).await?;

    // The owning collection is an editorial detail of drafts.
    content.collection_id = None;

    info!(id = %content.id, "Successfully retrieved published content");
    Ok(ResponseJson(content))
}

#[instrument(skip_all, fields(url = %url))]
async fn get_next_publish_date<S: AppState>(
    State(state): State<S>,
    Path(url): Path<String>,
) -> Result<ResponseJson<NextPublishDateResponse>, ApiError> {
    debug!("Processing next publish date request");

    let url = normalize_content_url(&url)?;
    let next_publish_date = state.content_store().get_next_publish_date(&url).await?;

    info!(scheduled = next_publish_date.is_some(), "Successfully retrieved next publish date");
    Ok(ResponseJson(NextPublishDateResponse {
        url,
        next_publish_date: next_publish_date.map(|date| date.naive_utc()),
    }))
}

async fn add_collection_root_content<S: AppState>(
    state: State<S>,
    Path(collection_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, ResponseJson<ContentItem>), ApiError> {
    add_collection_content(state, Path((collection_id, ROOT_URL.to_string())), body).await
}

async fn get_collection_root_content<S: AppState>(
    state: State<S>,
    Path(collection_id): Path<String>,
) -> Result<ResponseJson<ContentItem>, ApiError> {
    get_collection_content(state, Path((collection_id, ROOT_URL.to_string()))).await
}

async fn patch_collection_root_content<S: AppState>(
    state: State<S>,
    Path(collection_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    patch_collection_content(state, Path((collection_id, ROOT_URL.to_string())), body).await
}

async fn get_published_root_content<S: AppState>(
    state: State<S>,
) -> Result<ResponseJson<ContentItem>, ApiError> {
    get_published_content(state, Path(ROOT_URL.to_string())).await
}

async fn get_root_next_publish_date<S: AppState>(
    state: State<S>,
) -> Result<ResponseJson<NextPublishDateResponse>, ApiError> {
    get_next_publish_date(state, Path(ROOT_URL.to_string())).await
}

pub fn create_api_v1_router<S: AppState>() -> Router<S> {
    let collection_root = || {
        get(get_collection_root_content::<S>)
            .post(add_collection_root_content::<S>)
            .patch(patch_collection_root_content::<S>)
    };

    Router::new()
        .route(
            "/collections/{collection_id}/content/{*url}",
            get(get_collection_content::<S>)
                .post(add_collection_content::<S>)
                .patch(patch_collection_content::<S>),
        )
        .route("/collections/{collection_id}/content", collection_root())
        .route("/collections/{collection_id}/content/", collection_root())
        .route("/content/{*url}", get(get_published_content::<S>))
        .route("/content", get(get_published_root_content::<S>))
        .route("/content/", get(get_published_root_content::<S>))
        .route("/publish-dates/{*url}", get(get_next_publish_date::<S>))
        .route("/publish-dates", get(get_root_next_publish_date::<S>))
        .route("/publish-dates/", get(get_root_next_publish_date::<S>))
}
