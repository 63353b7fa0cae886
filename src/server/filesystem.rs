use crate::core::errors::{Error, Result};
use crate::fs::entry::Listing;
use crate::fs::{self, entry, ops, ClientPath};
use crate::index::IndexedFile;
use crate::server::AppState;
use axum::body::Body;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Response;
use axum::Json;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

const PATH_HEADER: &str = "X-Filesystem-Path";
const PATHS_HEADER: &str = "X-Filesystem-Paths";
const UPLOAD_ID_HEADER: &str = "X-Upload-ID";
const IS_DIRECTORY_HEADER: &str = "X-Is-Directory";

pub async fn list_entries(headers: HeaderMap) -> Result<Json<Listing>> {
    let raw = header_str(&headers, PATH_HEADER)?;
    let path = if raw.is_empty() || raw == "/" {
        PathBuf::from("/")
    } else {
        raw.to_native()
    };

    let listing = entry::read_listing(path).await?;
    Ok(Json(listing))
}

pub async fn new_entry(headers: HeaderMap) -> Result<StatusCode> {
    let path = header_str(&headers, PATH_HEADER)?.to_native();
    let is_directory = headers
        .get(IS_DIRECTORY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == "true")
        .unwrap_or(false);

    ops::create_entry(path, is_directory).await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct TransferRequest {
    entries: Vec<String>,
    path: String,
}

pub async fn copy_filesystem_entries(
    Json(request): Json<TransferRequest>,
) -> Result<Json<Value>> {
    let sources = request.entries.iter().map(|e| e.to_native()).collect();
    ops::copy_entries(sources, request.path.to_native()).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Entries copied successfully"
    })))
}

pub async fn move_filesystem_entries(
    Json(request): Json<TransferRequest>,
) -> Result<Json<Value>> {
    let sources = request.entries.iter().map(|e| e.to_native()).collect();
    ops::move_entries(sources, request.path.to_native()).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Entries moved successfully"
    })))
}

pub async fn delete_filesystem_entries(headers: HeaderMap) -> Result<Json<Value>> {
    let raw = header_str(&headers, PATHS_HEADER)?;
    let paths: Vec<String> = serde_json::from_str(raw).map_err(|e| {
        Error::invalid_input(format!("{PATHS_HEADER} header is not a valid JSON array: {e}"))
    })?;
    let paths = paths.iter().map(|p| p.to_native()).collect();

    ops::delete_entries(paths).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Entries deleted successfully"
    })))
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    cwd: String,
    #[serde(default)]
    items: String,
}

/// Streams one file verbatim, or a zip built on the fly for directories and
/// multi-selections.
pub async fn download(Query(query): Query<DownloadQuery>) -> Result<Response> {
    let cwd = query.cwd.to_native();
    let items: Vec<PathBuf> = query
        .items
        .split(',')
        .filter(|name| !name.is_empty())
        .map(|name| cwd.join(name))
        .collect();
    if items.is_empty() {
        return Err(Error::invalid_input("no items requested"));
    }

    let is_single = items.len() == 1;
    let is_single_dir = is_single && items[0].is_dir();

    let filename = if is_single {
        let fallback = uuid::Uuid::new_v4().to_string();
        let name = items[0]
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(fallback);
        if is_single_dir {
            format!("{name}.zip")
        } else {
            name
        }
    } else {
        format!("{}.zip", uuid::Uuid::new_v4())
    };

    if is_single && !is_single_dir {
        debug!("downloading single file {}", items[0].display());
        let file = tokio::fs::File::open(&items[0]).await?;
        let body = Body::from_stream(ReaderStream::new(file));
        return attachment_response("application/octet-stream", &filename, body);
    }

    let reader = fs::download::spawn_zip_stream(cwd, items, is_single_dir);
    let body = Body::from_stream(ReaderStream::new(reader));
    attachment_response("application/zip", &filename, body)
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
    filename_only: Option<bool>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<IndexedFile>>> {
    let term = query
        .q
        .ok_or_else(|| Error::invalid_input("Search query is required"))?;
    let filename_only = query.filename_only.unwrap_or(false);

    let index = state.index.clone();
    let results = task::spawn_blocking(move || index.search(&term, filename_only))
        .await
        .map_err(|e| Error::Internal(e.into()))??;
    Ok(Json(results))
}

pub async fn refresh_index(State(state): State<AppState>) -> StatusCode {
    let index = state.index.clone();
    let settings = state.settings.clone();
    task::spawn_blocking(move || {
        let filter = crate::index::IndexFilter::from_settings(&settings.current());
        if let Err(e) = index.rebuild(&filter) {
            error!("file index rebuild failed: {e}");
        }
    });
    StatusCode::OK
}

pub async fn indexer_stats(State(state): State<AppState>) -> Result<Json<Value>> {
    let index = state.index.clone();
    let stats = task::spawn_blocking(move || index.stats())
        .await
        .map_err(|e| Error::Internal(e.into()))??;

    Ok(Json(json!({
        "status": "success",
        "stats": {
            "fileCount": stats.file_count,
            "totalSize": stats.total_size,
            "averageSize": stats.average_size,
            "humanReadableTotalSize": format_size(stats.total_size),
            "humanReadableAverageSize": format_size(stats.average_size),
        }
    })))
}

/// Registers an SSE stream the matching `POST /upload` will report into.
pub async fn upload_progress(
    State(state): State<AppState>,
    UrlPath(upload_id): UrlPath<String>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.trackers.uploads.register(upload_id).await;
    sse_response(rx)
}

/// Writes the raw request body to the target file, streaming byte counts to
/// the subscribed progress channel.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Value>> {
    let upload_id = header_str(&headers, UPLOAD_ID_HEADER)?.to_string();
    let path = header_str(&headers, PATH_HEADER)?.to_native();

    let progress = state.trackers.uploads.sender(&upload_id).await;

    let mut file = tokio::fs::File::create(&path).await?;
    let mut stream = body.into_data_stream();
    let mut total_bytes: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let bytes = chunk
            .map_err(|e| Error::invalid_input(format!("failed to read upload data: {e}")))?;
        file.write_all(&bytes).await?;
        total_bytes += bytes.len() as u64;

        if let Some(sender) = &progress {
            let _ = sender.send(upload_event("progress", total_bytes)).await;
        }
    }
    file.flush().await?;

    if let Some(sender) = progress {
        let _ = sender.send(upload_event("complete", total_bytes)).await;
        state.trackers.uploads.remove(&upload_id).await;
    }

    Ok(Json(json!({
        "status": "success",
        "bytesUploaded": total_bytes
    })))
}

#[derive(Deserialize)]
pub struct ArchiveRequest {
    entries: Vec<String>,
    cwd: String,
    filename: String,
    tracker_id: String,
}

/// Registers an SSE stream the matching `POST /archive` will report into.
pub async fn archive_status(
    State(state): State<AppState>,
    UrlPath(tracker_id): UrlPath<String>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.trackers.archives.register(tracker_id).await;
    sse_response(rx)
}

pub async fn archive(
    State(state): State<AppState>,
    Json(request): Json<ArchiveRequest>,
) -> Result<StatusCode> {
    let cwd = request.cwd.to_native();
    let entries: Vec<PathBuf> = request.entries.iter().map(|name| cwd.join(name)).collect();
    let archive_path = cwd.join(&request.filename);

    let sender = state
        .trackers
        .archives
        .sender(&request.tracker_id)
        .await
        .ok_or_else(|| Error::invalid_input("invalid tracker id"))?;

    task::spawn_blocking(move || fs::archive::create_archive(&archive_path, entries, &sender))
        .await
        .map_err(|e| Error::Internal(e.into()))??;

    state.trackers.archives.remove(&request.tracker_id).await;
    Ok(StatusCode::OK)
}

fn sse_response(
    rx: tokio::sync::mpsc::Receiver<Event>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(rx).map(Ok);
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(3)))
}

fn upload_event(status: &str, bytes_uploaded: u64) -> Event {
    Event::default().data(
        json!({
            "status": status,
            "bytesUploaded": bytes_uploaded
        })
        .to_string(),
    )
}

fn attachment_response(content_type: &str, filename: &str, body: Body) -> Result<Response> {
    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(body)
        .map_err(|e| Error::Internal(e.into()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .ok_or_else(|| Error::invalid_input(format!("{name} header is missing")))?
        .to_str()
        .map_err(|_| Error::invalid_input(format!("{name} header is not a valid string")))
}

pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if size < KB {
        format!("{size} B")
    } else if size < MB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else if size < GB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size < TB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else {
        format!("{:.2} TB", size as f64 / TB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_picks_sensible_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn missing_header_is_rejected() {
        let headers = HeaderMap::new();
        assert!(header_str(&headers, PATH_HEADER).is_err());
    }
}
