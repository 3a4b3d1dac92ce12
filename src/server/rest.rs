//! REST API endpoints: search, image discovery, index and watcher control.
//!
//! Search and image queries go through the query router: when indexing is
//! enabled and the store holds rows they are answered from the index,
//! otherwise a live fan-out scan runs. Both paths produce the same response
//! shape.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};

use super::app::AppState;
use super::files::resolve_request_path;
use super::metrics::{
    INDEXED_FILES, INDEX_BUILDS, SEARCH_COUNT, WATCHED_DIRECTORIES, WATCHER_EVENTS,
};
use crate::index::{BuildOutcome, IndexStatus, BUILD_IN_PROGRESS};
use crate::scan::{parallel_scan_async, FileRecord, ScanFilter};
use crate::storage;
use crate::watcher::WatcherStatus;

/// Rows per page when the client paginates without an explicit limit.
const DEFAULT_PAGE_LIMIT: u32 = 100;

/// JSON error body with a mapped status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: message.into(),
        }
    }
}

impl From<crate::Error> for ApiError {
    fn from(e: crate::Error) -> Self {
        tracing::error!(error = %e, "Request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Routes that stay outside authentication.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
}

/// Search, image, index, and watcher routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/images", get(images))
        .route("/api/index", post(trigger_build).delete(clear_index))
        .route("/api/index/status", get(index_status))
        .route("/api/watcher/start", post(watcher_start))
        .route("/api/watcher/stop", post(watcher_stop))
        .route("/api/watcher/status", get(watcher_status))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = match state.db.health_check() {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            "error"
        }
    };

    let response = HealthResponse {
        status: if db_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        }
        .to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status.to_string(),
    };

    let status_code = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

/// Prometheus exposition. Index and watcher gauges are refreshed here so the
/// core modules never touch the registry.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.with_conn(storage::file_count) {
        Ok(count) => INDEXED_FILES.set(i64::try_from(count).unwrap_or(i64::MAX)),
        Err(e) => tracing::warn!(error = %e, "Failed to count indexed files for metrics"),
    }
    let watcher = state.watcher.status();
    WATCHED_DIRECTORIES.set(i64::try_from(watcher.watched_directories).unwrap_or(i64::MAX));
    WATCHER_EVENTS.set(i64::try_from(state.watcher.stats().events_handled).unwrap_or(i64::MAX));

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; charset=utf-8",
            )],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(
                    axum::http::header::CONTENT_TYPE,
                    "text/plain; charset=utf-8",
                )],
                b"Failed to encode metrics".to_vec(),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: Option<String>,
    dir: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

/// Response shape shared by the index and live query paths.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    results: Vec<FileRecord>,
    total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    has_more: Option<bool>,
}

/// Whether queries should be served from the index.
fn index_ready(state: &AppState) -> Result<bool, ApiError> {
    if !state.config.index_enabled {
        return Ok(false);
    }
    Ok(state.indexer.is_built()?)
}

/// Resolve an effective (page, limit) window against a hard cap. Returns
/// whether the client asked for pagination at all.
fn page_window(page: Option<u32>, limit: Option<u32>, cap: u32) -> (u32, u32, bool) {
    let paged = page.is_some() || limit.is_some();
    let window = if paged { DEFAULT_PAGE_LIMIT } else { cap };
    (page.unwrap_or(1).max(1), limit.unwrap_or(window).clamp(1, cap), paged)
}

/// Run a live fan-out scan under `dir_rel` and rewrite paths root-relative.
async fn live_scan(
    state: &AppState,
    dir_abs: std::path::PathBuf,
    dir_rel: &str,
    filter: ScanFilter,
) -> Result<Vec<FileRecord>, ApiError> {
    if !dir_abs.is_dir() {
        return Err(ApiError::bad_request("dir is not a directory"));
    }
    let mut records = parallel_scan_async(dir_abs, filter).await?;
    if !dir_rel.is_empty() {
        for record in &mut records {
            record.path = format!("{dir_rel}/{}", record.path);
        }
    }
    Ok(records)
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Some(query) = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
    else {
        return Err(ApiError::bad_request("query parameter is required"));
    };

    let dir = params.dir.unwrap_or_default();
    let (dir_abs, dir_rel) = resolve_request_path(&state.config.root, &dir)?;

    if index_ready(&state)? {
        SEARCH_COUNT.with_label_values(&["index"]).inc();
        let (page, limit, paged) =
            page_window(params.page, params.limit, storage::SEARCH_RESULT_CAP);
        let query = query.to_string();
        let page_result = state
            .db
            .with_conn(|conn| storage::search_files_page(conn, &query, &dir_rel, page, limit))?;
        return Ok(Json(QueryResponse {
            results: page_result.records,
            total: page_result.total,
            has_more: paged.then_some(page_result.has_more),
        }));
    }

    SEARCH_COUNT.with_label_values(&["live"]).inc();
    let records = live_scan(&state, dir_abs, &dir_rel, ScanFilter::name_contains(query)).await?;
    let total = records.len() as u64;
    Ok(Json(QueryResponse {
        results: records,
        total,
        has_more: None,
    }))
}

async fn images(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<QueryResponse>, ApiError> {
    let dir = params.dir.unwrap_or_default();
    let (dir_abs, dir_rel) = resolve_request_path(&state.config.root, &dir)?;

    if index_ready(&state)? {
        SEARCH_COUNT.with_label_values(&["index"]).inc();
        let (page, limit, paged) =
            page_window(params.page, params.limit, storage::IMAGE_RESULT_CAP);
        let page_result = state
            .db
            .with_conn(|conn| storage::find_images_page(conn, &dir_rel, page, limit))?;
        return Ok(Json(QueryResponse {
            results: page_result.records,
            total: page_result.total,
            has_more: paged.then_some(page_result.has_more),
        }));
    }

    SEARCH_COUNT.with_label_values(&["live"]).inc();
    let records = live_scan(&state, dir_abs, &dir_rel, ScanFilter::Images).await?;
    let total = records.len() as u64;
    Ok(Json(QueryResponse {
        results: records,
        total,
        has_more: None,
    }))
}

async fn trigger_build(State(state): State<AppState>) -> Result<Json<BuildOutcome>, ApiError> {
    if !state.config.index_enabled {
        return Err(ApiError::bad_request("indexing is disabled by configuration"));
    }

    let outcome = state.indexer.build_async().await?;
    let label = if outcome.success {
        "completed"
    } else if outcome.message == BUILD_IN_PROGRESS {
        "rejected"
    } else {
        "failed"
    };
    INDEX_BUILDS.with_label_values(&[label]).inc();

    Ok(Json(outcome))
}

async fn index_status(State(state): State<AppState>) -> Result<Json<IndexStatus>, ApiError> {
    Ok(Json(state.indexer.status()?))
}

async fn clear_index(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.indexer.clear()?;
    tracing::info!("Index cleared by request");
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Index cleared"
    })))
}

async fn watcher_start(State(state): State<AppState>) -> Result<Json<WatcherStatus>, ApiError> {
    state.watcher.start()?;
    Ok(Json(state.watcher.status()))
}

async fn watcher_stop(State(state): State<AppState>) -> Json<WatcherStatus> {
    state.watcher.stop().await;
    Json(state.watcher.status())
}

async fn watcher_status(State(state): State<AppState>) -> Json<WatcherStatus> {
    Json(state.watcher.status())
}
