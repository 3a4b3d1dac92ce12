//! File management endpoints: listing, download, preview, upload, and
//! directory manipulation.
//!
//! Every client-supplied path is resolved against the served root before the
//! filesystem is touched; anything that would escape it is answered with 403.

use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use super::app::AppState;
use super::rest::ApiError;
use crate::classify::{content_type_for_path, FileCategory};
use crate::scan::{walker, FileRecord};
use crate::storage;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/files", get(list_files))
        .route("/api/download", get(download))
        .route("/api/content", get(content))
        .route("/api/upload", post(upload))
        .route("/api/mkdir", post(mkdir))
        .route("/api/rmdir", post(rmdir))
        .route("/api/rename", post(rename))
        .route("/api/delete", delete(delete_entry))
}

/// Resolve a client-supplied path against the root. Leading slashes are
/// treated as root-relative; `..` and other non-normal components are
/// rejected outright. Returns the absolute path and the normalized
/// root-relative form used as the index key.
pub(super) fn resolve_request_path(
    root: &Path,
    raw: &str,
) -> Result<(PathBuf, String), ApiError> {
    let trimmed = raw.trim_start_matches('/');
    let mut rel = String::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => {
                if !rel.is_empty() {
                    rel.push('/');
                }
                rel.push_str(&part.to_string_lossy());
            }
            Component::CurDir => {}
            _ => return Err(ApiError::forbidden("path escapes the served root")),
        }
    }
    let abs = if rel.is_empty() {
        root.to_path_buf()
    } else {
        root.join(&rel)
    };
    Ok((abs, rel))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    dir: Option<String>,
    cover: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PathParam {
    path: String,
}

/// Listing entry: the record plus an optional cover image name for
/// directories.
#[derive(Debug, Serialize)]
struct ListedEntry {
    #[serde(flatten)]
    record: FileRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    cover: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    files: Vec<ListedEntry>,
    total: usize,
}

/// First image child of a directory, alphabetically.
fn first_image_name(dir: &Path) -> Option<String> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut names: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| FileCategory::from_path(Path::new(name)) == FileCategory::Image)
        .collect();
    names.sort();
    names.into_iter().next()
}

async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let dir = params.dir.unwrap_or_default();
    let (dir_abs, _) = resolve_request_path(&state.config.root, &dir)?;
    if !dir_abs.is_dir() {
        return Err(ApiError::bad_request("dir is not a directory"));
    }

    let with_cover = params.cover.unwrap_or(false);
    let root = state.config.root.clone();
    let files = tokio::task::spawn_blocking(move || -> crate::Result<Vec<ListedEntry>> {
        let mut records = walker::list_entries(&dir_abs, &root)?;
        records.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(records
            .into_iter()
            .map(|record| {
                let cover = (with_cover && record.is_directory)
                    .then(|| first_image_name(&root.join(&record.path)))
                    .flatten();
                ListedEntry { record, cover }
            })
            .collect())
    })
    .await
    .map_err(|e| crate::Error::internal(format!("listing task failed: {e}")))??;

    let total = files.len();
    Ok(Json(ListResponse { files, total }))
}

/// RFC 5987 percent-encoding for the Content-Disposition filename.
fn encode_rfc5987(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'0'..=b'9'
            | b'A'..=b'Z'
            | b'a'..=b'z'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

async fn download(
    State(state): State<AppState>,
    Query(params): Query<PathParam>,
) -> Result<Response, ApiError> {
    let (abs, rel) = resolve_request_path(&state.config.root, &params.path)?;
    let meta = tokio::fs::metadata(&abs)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    if meta.is_dir() {
        return Err(ApiError::bad_request("path is a directory"));
    }

    let file = tokio::fs::File::open(&abs)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    let name = abs
        .file_name()
        .map_or_else(|| "download".to_string(), |n| n.to_string_lossy().into_owned());

    tracing::debug!(path = %rel, size = meta.len(), "Serving download");

    let headers = [
        (
            header::CONTENT_TYPE,
            content_type_for_path(&abs).to_string(),
        ),
        (header::CONTENT_LENGTH, meta.len().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename*=UTF-8''{}", encode_rfc5987(&name)),
        ),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

async fn content(
    State(state): State<AppState>,
    Query(params): Query<PathParam>,
) -> Result<Response, ApiError> {
    let (abs, _) = resolve_request_path(&state.config.root, &params.path)?;
    let meta = tokio::fs::metadata(&abs)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    if meta.is_dir() {
        return Err(ApiError::bad_request("path is a directory"));
    }
    if meta.len() > state.config.max_content_bytes {
        return Err(ApiError::payload_too_large(format!(
            "file exceeds the {} byte preview limit",
            state.config.max_content_bytes
        )));
    }

    let bytes = tokio::fs::read(&abs).await.map_err(crate::Error::from)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    dir: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    files: Vec<FileRecord>,
    total: usize,
}

async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let dir = params.dir.unwrap_or_default();
    let (dir_abs, _) = resolve_request_path(&state.config.root, &dir)?;
    tokio::fs::create_dir_all(&dir_abs)
        .await
        .map_err(crate::Error::from)?;

    let mut stored = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart request: {e}")))?
    {
        let Some(raw_name) = field.file_name().map(ToString::to_string) else {
            continue;
        };
        // Clients may send paths; keep only the base name.
        let file_name = Path::new(&raw_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ApiError::bad_request("invalid file name"))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
        if data.len() as u64 > state.config.max_upload_bytes {
            return Err(ApiError::payload_too_large(format!(
                "file exceeds the {} byte upload limit",
                state.config.max_upload_bytes
            )));
        }

        let target = dir_abs.join(&file_name);
        tokio::fs::write(&target, &data)
            .await
            .map_err(crate::Error::from)?;
        let meta = std::fs::metadata(&target).map_err(crate::Error::from)?;
        if let Some(record) = FileRecord::for_file(&target, &state.config.root, &meta) {
            tracing::info!(path = %record.path, size = record.size, "Stored uploaded file");
            stored.push(record);
        }
    }

    if stored.is_empty() {
        return Err(ApiError::bad_request("no file fields in upload"));
    }
    let total = stored.len();
    Ok(Json(UploadResponse {
        files: stored,
        total,
    }))
}

async fn mkdir(
    State(state): State<AppState>,
    Query(params): Query<PathParam>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (abs, rel) = resolve_request_path(&state.config.root, &params.path)?;
    if rel.is_empty() {
        return Err(ApiError::bad_request("path is required"));
    }

    tokio::fs::create_dir_all(&abs)
        .await
        .map_err(crate::Error::from)?;
    tracing::info!(path = %rel, "Created directory");
    Ok(Json(serde_json::json!({ "success": true, "path": rel })))
}

async fn rmdir(
    State(state): State<AppState>,
    Query(params): Query<PathParam>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (abs, rel) = resolve_request_path(&state.config.root, &params.path)?;
    if rel.is_empty() {
        return Err(ApiError::bad_request("cannot remove the served root"));
    }
    let meta = tokio::fs::metadata(&abs)
        .await
        .map_err(|_| ApiError::not_found("directory not found"))?;
    if !meta.is_dir() {
        return Err(ApiError::bad_request("path is not a directory"));
    }

    tokio::fs::remove_dir_all(&abs)
        .await
        .map_err(crate::Error::from)?;
    tracing::info!(path = %rel, "Removed directory");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
struct RenameParams {
    path: String,
    #[serde(rename = "newName")]
    new_name: String,
}

async fn rename(
    State(state): State<AppState>,
    Query(params): Query<RenameParams>,
) -> Result<Json<FileRecord>, ApiError> {
    let (abs, rel) = resolve_request_path(&state.config.root, &params.path)?;
    if rel.is_empty() {
        return Err(ApiError::bad_request("cannot rename the served root"));
    }
    tokio::fs::metadata(&abs)
        .await
        .map_err(|_| ApiError::not_found("path not found"))?;

    let new_name = params.new_name.trim();
    let mut components = Path::new(new_name).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Err(ApiError::bad_request("newName must be a bare file name"));
    }

    let target = abs
        .parent()
        .map(|parent| parent.join(new_name))
        .ok_or_else(|| ApiError::forbidden("path escapes the served root"))?;
    if tokio::fs::metadata(&target).await.is_ok() {
        return Err(ApiError::bad_request("target already exists"));
    }

    tokio::fs::rename(&abs, &target)
        .await
        .map_err(crate::Error::from)?;
    tracing::info!(from = %rel, to = %new_name, "Renamed entry");

    // Keep the index in step for the entry itself; children of a renamed
    // directory are picked up by the watcher or the next rebuild.
    if let Err(e) = state.db.with_conn(|conn| storage::delete_file(conn, &rel)) {
        tracing::warn!(path = %rel, error = %e, "Failed to drop renamed entry from index");
    }

    let meta = std::fs::metadata(&target).map_err(crate::Error::from)?;
    let record = if meta.is_dir() {
        FileRecord::for_directory(&target, &state.config.root, &meta)
    } else {
        FileRecord::for_file(&target, &state.config.root, &meta)
    }
    .ok_or_else(|| crate::Error::internal("renamed entry has no name"))?;

    if !record.is_directory {
        if let Err(e) = state
            .db
            .with_conn(|conn| storage::upsert_files(conn, std::slice::from_ref(&record)))
        {
            tracing::warn!(path = %record.path, error = %e, "Failed to reindex renamed file");
        }
    }

    Ok(Json(record))
}

async fn delete_entry(
    State(state): State<AppState>,
    Query(params): Query<PathParam>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (abs, rel) = resolve_request_path(&state.config.root, &params.path)?;
    if rel.is_empty() {
        return Err(ApiError::bad_request("path is required"));
    }
    let meta = tokio::fs::metadata(&abs)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    if meta.is_dir() {
        return Err(ApiError::bad_request(
            "path is a directory; use rmdir to remove directories",
        ));
    }

    tokio::fs::remove_file(&abs)
        .await
        .map_err(crate::Error::from)?;
    if let Err(e) = state.db.with_conn(|conn| storage::delete_file(conn, &rel)) {
        tracing::warn!(path = %rel, error = %e, "Failed to drop deleted entry from index");
    }
    tracing::info!(path = %rel, "Deleted file");
    Ok(Json(serde_json::json!({ "success": true })))
}
