//! HTTP boundary for the browser editor.
//!
//! Thin glue: routes deserialize requests, call the publish façade /
//! content store / watch registry, and map typed errors onto HTTP classes
//! (validation 400, not-found 404, slug conflict 409, hook failure 502).
//! The uploaded-images directory is served statically and CORS is
//! permissive because the editor runs on its own origin.

use crate::{
    publish::{ImportResponse, PublishError, PublishReceipt, PublishRequest, Publisher, UpdateRequest},
    store::{ContentStore, Image, ImageKind, ListFilter, Post, PostKind, StoreError},
    watch::{WatchRegistry, WatcherStatus},
};
use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, services::ServeDir};

// ============================================================================
// State & Router
// ============================================================================

/// Everything the handlers need, shared behind one Arc.
pub struct AppState {
    pub store: ContentStore,
    pub publisher: Publisher,
    pub registry: WatchRegistry,
    /// Poll interval used when a watch request does not name one.
    pub default_watch_interval: Duration,
}

/// Build the API router.
pub fn router(state: Arc<AppState>, images_dir: PathBuf) -> Router {
    Router::new()
        .route("/api/posts", post(create_post).get(list_posts))
        .route(
            "/api/posts/{slug}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route(
            "/api/posts/{slug}/images",
            post(upload_image).get(list_images),
        )
        .route("/api/images/{id}", delete(delete_image))
        .route("/api/import", post(import_file))
        .route("/api/watch/start", post(watch_start))
        .route("/api/watch/stop", post(watch_stop))
        .route("/api/watch/status", get(watch_status))
        .nest_service("/images", ServeDir::new(images_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Error Mapping
// ============================================================================

/// An error plus the HTTP status it should answer with.
#[derive(Debug)]
pub struct ApiError {
    err: anyhow::Error,
    status: StatusCode,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            err: anyhow::anyhow!(message.into()),
            status: StatusCode::BAD_REQUEST,
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            err: anyhow::anyhow!(message.into()),
            status: StatusCode::NOT_FOUND,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.err.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) | StoreError::ImageNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self {
            status: store_status(&err),
            err: err.into(),
        }
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        let status = match &err {
            PublishError::Validation(_) => StatusCode::BAD_REQUEST,
            PublishError::Store(store_err) => store_status(store_err),
            PublishError::HookFailed { .. } | PublishError::HookUnreachable { .. } => {
                StatusCode::BAD_GATEWAY
            }
            PublishError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            err: err.into(),
            status,
        }
    }
}

// ============================================================================
// Post Handlers
// ============================================================================

async fn create_post(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<PublishReceipt>, ApiError> {
    Ok(Json(state.publisher.publish(&request).await?))
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    tag: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let kind = query
        .kind
        .map(|k| PostKind::parse(&k).ok_or_else(|| ApiError::bad_request(format!("unknown type `{k}`"))))
        .transpose()?;

    let filter = ListFilter {
        kind,
        tag: query.tag,
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(state.store.list_posts(&filter).await?))
}

async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.store.get_post(&slug).await?))
}

async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<PublishReceipt>, ApiError> {
    Ok(Json(state.publisher.update(&slug, &request).await?))
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.publisher.delete(&slug).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================================
// Image Handlers
// ============================================================================

async fn upload_image(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Image>, ApiError> {
    let mut kind = ImageKind::Content;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("bad multipart body: {err}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("type") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| ApiError::bad_request(format!("bad type field: {err}")))?;
                kind = ImageKind::parse(text.trim())
                    .ok_or_else(|| ApiError::bad_request(format!("unknown image type `{text}`")))?;
            }
            Some("image") | Some("file") => {
                let filename = field.file_name().unwrap_or("upload.bin").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::bad_request(format!("bad image field: {err}")))?;
                upload = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::bad_request("multipart field `image` is required"))?;
    Ok(Json(
        state
            .publisher
            .add_image(&slug, &filename, kind, &bytes)
            .await?,
    ))
}

async fn list_images(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<Image>>, ApiError> {
    Ok(Json(state.publisher.post_images(&slug).await?))
}

async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.publisher.delete_image(id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================================
// Import Handler
// ============================================================================

async fn import_file(mut multipart: Multipart) -> Result<Json<ImportResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("bad multipart body: {err}")))?
    {
        let name = field.name().map(str::to_string);
        if name.as_deref() == Some("file") {
            let text = field
                .text()
                .await
                .map_err(|err| ApiError::bad_request(format!("bad file field: {err}")))?;
            return Ok(Json(Publisher::import(&text)));
        }
    }
    Err(ApiError::bad_request("multipart field `file` is required"))
}

// ============================================================================
// Watcher Handlers
// ============================================================================

#[derive(Deserialize)]
struct WatchStartRequest {
    directory: PathBuf,
    #[serde(rename = "intervalSecs", alias = "interval")]
    interval_secs: Option<u64>,
}

async fn watch_start(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WatchStartRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let interval = request
        .interval_secs
        .map(Duration::from_secs)
        .unwrap_or(state.default_watch_interval);
    if interval.is_zero() {
        return Err(ApiError::bad_request("intervalSecs must be at least 1"));
    }

    state
        .registry
        .start(request.directory, interval)
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Deserialize)]
struct WatchStopRequest {
    directory: PathBuf,
}

async fn watch_stop(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WatchStopRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if !state.registry.stop(&request.directory) {
        return Err(ApiError::not_found(format!(
            "not watching {}",
            request.directory.display()
        )));
    }
    Ok(Json(SuccessResponse { success: true }))
}

async fn watch_status(State(state): State<Arc<AppState>>) -> Json<Vec<WatcherStatus>> {
    Json(state.registry.status())
}
