//! HTTP surface for the catalog.
//!
//! Thin glue over the stores and the rotation scheduler: handlers
//! translate between JSON models and domain calls and map the error
//! taxonomy onto status codes. Admin routes sit behind a shared-token
//! middleware; the core components below this module know nothing about
//! authentication.

use crate::blob_store::{BlobError, ImageStore};
use crate::catalog::{CatalogRecord, CatalogStore, CATALOG_PARTITION, FEATURED_PARTITION};
use crate::config::ApiConfig;
use crate::rotation::RotationScheduler;
use crate::short_id::ShortId;
use crate::table_store::{PgTableBackend, StoreError};
use anyhow::Context;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CatalogStore>,
    pub rotation: Arc<RotationScheduler>,
    pub images: Arc<ImageStore>,
    pub table_backend: Arc<PgTableBackend>,
    pub admin_token: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.to_string(),
        }),
    )
}

fn store_error(error: StoreError) -> ApiError {
    error!(error = %error, "table operation failed");
    let (status, code) = match error {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        StoreError::AlreadyExists { .. } => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
        StoreError::Conflict { .. } => (StatusCode::PRECONDITION_FAILED, "CONFLICT"),
        StoreError::StorageUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE")
        }
        StoreError::Codec(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CODEC"),
    };
    api_error(status, code, error.to_string())
}

fn blob_error(error: BlobError) -> ApiError {
    error!(error = %error, "blob operation failed");
    let (status, code) = match error {
        BlobError::UploadFailed { .. } => (StatusCode::BAD_GATEWAY, "UPLOAD_FAILED"),
        BlobError::SourceFetch(_) => (StatusCode::BAD_GATEWAY, "SOURCE_FETCH"),
        BlobError::StorageUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE")
        }
    };
    api_error(status, code, error.to_string())
}

/// A record in API responses.
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub image_address: String,
    pub reference_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_date: Option<String>,
    /// Unix timestamp after which clients should re-check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_update: Option<i64>,
}

impl RecordResponse {
    fn from_record(record: CatalogRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            author: record.author,
            year: record.year,
            image_address: record.image_address,
            reference_address: record.reference_address,
            featured_date: record.featured_date,
            next_update: None,
        }
    }
}

/// Payload for create and replace.
#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub title: String,
    pub author: String,
    pub year: i32,
    pub image_address: String,
    pub reference_address: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Outcome of a rotation run.
#[derive(Debug, Serialize)]
pub struct RotationResponse {
    pub message: String,
    pub success: bool,
    pub filled: u32,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    let admin = Router::new()
        .route("/v1/records", get(list_records).post(create_record))
        .route(
            "/v1/records/:id",
            get(get_record).put(replace_record).delete(delete_record),
        )
        .route("/v1/records/featured/all", get(list_featured))
        .route("/v1/records/featured/set/:days", get(run_rotation))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/v1/records/featured", get(get_featured))
        .route("/v1/records/random", get(get_random_any))
        .route("/v1/records/random/:previous", get(get_random))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Shared-token guard for admin routes.
async fn require_admin_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get("authentication")
        .and_then(|value| value.to_str().ok());

    match state.admin_token.as_deref() {
        Some(expected) if provided == Some(expected) => next.run(request).await,
        Some(_) => api_error(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Missing or invalid admin token",
        )
        .into_response(),
        None => api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "ADMIN_DISABLED",
            "No admin token is configured",
        )
        .into_response(),
    }
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "catalog-service"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1")
        .fetch_one(state.table_backend.pool())
        .await
    {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Today's featured record, falling back to an ephemeral random pick.
#[instrument(skip(state))]
async fn get_featured(
    State(state): State<AppState>,
) -> Result<Json<RecordResponse>, ApiError> {
    let pick = state
        .rotation
        .featured_today()
        .await
        .map_err(store_error)?
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                "NO_ACTIVE_RECORDS",
                "The catalog has no active records",
            )
        })?;

    if pick.fallback {
        info!("no featured row for today, serving random fallback");
    }

    metrics::counter!("catalog.api.featured_served").increment(1);

    let mut response = RecordResponse::from_record(pick.record);
    response.next_update = Some(pick.next_update);
    Ok(Json(response))
}

async fn get_random_any(state: State<AppState>) -> Result<Json<RecordResponse>, ApiError> {
    random_avoiding(state, String::new()).await
}

/// A random active record avoiding `previous`.
#[instrument(skip(state))]
async fn get_random(
    state: State<AppState>,
    Path(previous): Path<String>,
) -> Result<Json<RecordResponse>, ApiError> {
    // The avoidance key must be a well-formed identifier token.
    ShortId::decode(&previous)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "INVALID_ID", e.to_string()))?;

    random_avoiding(state, previous).await
}

async fn random_avoiding(
    State(state): State<AppState>,
    previous: String,
) -> Result<Json<RecordResponse>, ApiError> {
    let record = state
        .rotation
        .random_active(&previous)
        .await
        .map_err(store_error)?
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                "NO_ACTIVE_RECORDS",
                "The catalog has no active records",
            )
        })?;

    Ok(Json(RecordResponse::from_record(record)))
}

/// Assign featured records for the next `days` dates.
#[instrument(skip(state))]
async fn run_rotation(
    State(state): State<AppState>,
    Path(days): Path<u32>,
) -> Result<Json<RotationResponse>, ApiError> {
    if days == 0 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_DAYS",
            "days must be at least 1",
        ));
    }

    let filled = state.rotation.run(days).await.map_err(store_error)?;

    Ok(Json(RotationResponse {
        message: "Featured records set.".to_string(),
        success: true,
        filled,
    }))
}

async fn list_records(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogRecord>>, ApiError> {
    let records = state
        .store
        .all_in(CATALOG_PARTITION)
        .await
        .map_err(store_error)?;
    Ok(Json(records))
}

/// The featured schedule, newest date first.
async fn list_featured(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogRecord>>, ApiError> {
    let mut records = state
        .store
        .all_in(FEATURED_PARTITION)
        .await
        .map_err(store_error)?;
    records.sort_by(|a, b| b.featured_date.cmp(&a.featured_date));
    Ok(Json(records))
}

/// Create a record, copying its externally hosted image into the blob
/// store first so the stored row carries the canonical address.
#[instrument(skip(state, payload))]
async fn create_record(
    State(state): State<AppState>,
    Json(payload): Json<RecordRequest>,
) -> Result<(StatusCode, Json<CatalogRecord>), ApiError> {
    let id = ShortId::generate().encode();

    let object_name = image_object_name(&id, &payload.image_address);
    let image_address = state
        .images
        .save_from_url(&object_name, &payload.image_address)
        .await
        .map_err(blob_error)?;

    let record = CatalogRecord {
        partition: CATALOG_PARTITION.to_string(),
        id,
        title: payload.title,
        author: payload.author,
        year: payload.year,
        image_address,
        reference_address: payload.reference_address,
        featured_date: None,
        is_active: payload.is_active,
    };

    let created = state.store.create(record).await.map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CatalogRecord>, ApiError> {
    let record = state
        .store
        .get(CATALOG_PARTITION, &id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "NOT_FOUND", "No such record"))?;
    Ok(Json(record))
}

/// Full replace. An `If-Match` header carries the optimistic concurrency
/// token; without it the write is unconditional.
#[instrument(skip(state, headers, payload))]
async fn replace_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<RecordRequest>,
) -> Result<Json<CatalogRecord>, ApiError> {
    let expected = headers
        .get(header::IF_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(|value| Uuid::parse_str(value.trim_matches('"')))
        .transpose()
        .map_err(|_| {
            api_error(
                StatusCode::BAD_REQUEST,
                "INVALID_ETAG",
                "If-Match is not a valid etag",
            )
        })?;

    let record = CatalogRecord {
        partition: CATALOG_PARTITION.to_string(),
        id,
        title: payload.title,
        author: payload.author,
        year: payload.year,
        image_address: payload.image_address,
        reference_address: payload.reference_address,
        featured_date: None,
        is_active: payload.is_active,
    };

    state
        .store
        .replace(&record, expected)
        .await
        .map_err(store_error)?;

    Ok(Json(record))
}

async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let record = state
        .store
        .get(CATALOG_PARTITION, &id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "NOT_FOUND", "No such record"))?;

    state.store.delete(&record).await.map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Blob object name for a record's image: the record id plus the source
/// file's extension when it has one.
fn image_object_name(id: &str, source_url: &str) -> String {
    let file = source_url.rsplit('/').next().unwrap_or(source_url);
    let file = file.split(['?', '#']).next().unwrap_or(file);

    match file.rsplit_once('.') {
        Some((_, extension)) if !extension.is_empty() => {
            format!("{id}.{}", extension.to_ascii_lowercase())
        }
        _ => id.to_string(),
    }
}

/// Bind and serve the API.
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> anyhow::Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API listener on {addr}"))?;

    info!(addr = %addr, "API server listening");

    axum::serve(listener, router)
        .await
        .context("API server exited")
}
