//! HTTP surface: health probe, download, transcript, listing and file serving.
//!
//! Handlers do no media work themselves. They name the artifact, hand the
//! URL to the [`MediaFetcher`], and then talk to the [`ArtifactStore`].

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::fetch::{validate_url, MediaFetcher, AUDIO_FORMAT};
use crate::media::{guess_media_type, is_text_caption, CAPTION_SUFFIXES};
use crate::naming::generate_name;
use crate::store::ArtifactStore;

const TRANSCRIPT_NOT_FOUND: &str = "English transcript not found for this video";
const FILE_NOT_FOUND: &str = "File not found";

/// Shared state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: ArtifactStore,
    pub fetcher: Arc<dyn MediaFetcher>,
    /// Reported by the health probe.
    pub port: u16,
}

impl AppState {
    pub fn new(store: ArtifactStore, fetcher: Arc<dyn MediaFetcher>, port: u16) -> Self {
        Self {
            store,
            fetcher,
            port,
        }
    }
}

/// Build the service router, including the `/downloads` static mount.
pub fn router(state: AppState) -> Router {
    let files = ServeDir::new(state.store.root());
    Router::new()
        .route("/", get(health))
        .route("/api/download/{*url}", get(download_audio))
        .route("/api/transcript/{*url}", get(fetch_transcript))
        .route("/api/files", get(list_files))
        .route("/api/files/{filename}", get(serve_file))
        .nest_service("/downloads", files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Errors returned to HTTP clients.
///
/// Upstream failures carry a generic message; the tool's own output only
/// goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("download failed for internal server error")]
    Upstream,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream => StatusCode::VARIANT_ALSO_NEGOTIATES,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound { .. } => ApiError::NotFound(FILE_NOT_FOUND),
            Error::InvalidName(_) | Error::InvalidUrl(_) => ApiError::BadRequest(e.to_string()),
            e if e.is_upstream() => ApiError::Upstream,
            e => {
                error!(error = %e, "request failed");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "detail": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct FileCreated {
    pub status: &'static str,
    pub file_name: String,
}

impl FileCreated {
    fn success(file_name: String) -> Self {
        Self {
            status: "success",
            file_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileList {
    pub files: Vec<String>,
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "success": "true",
        "message": format!("downloader service running on port {}", state.port),
    }))
}

/// The `{*url}` capture stops at `?`; glue the query string back on.
fn target_url(url: String, query: Option<String>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{url}?{q}"),
        _ => url,
    }
}

async fn download_audio(
    State(state): State<AppState>,
    Path(url): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<FileCreated>> {
    let url = target_url(url, query);
    validate_url(&url)?;

    let stem = generate_name();
    let file_name = format!("{stem}.{AUDIO_FORMAT}");
    let output = state.store.path_of(&file_name)?;

    if let Err(e) = state.fetcher.fetch_audio(&url, &output).await {
        warn!(%url, %file_name, error = %e, "audio download failed");
        discard_partials(&state.store, &stem).await;
        return Err(upstream(e));
    }

    // A successful run must have produced exactly the requested file.
    if let Err(e) = state.store.resolve_exact(&file_name).await {
        warn!(%url, %file_name, error = %e, "downloader reported success but wrote no file");
        discard_partials(&state.store, &stem).await;
        return Err(ApiError::Upstream);
    }

    info!(%url, %file_name, "audio ready");
    Ok(Json(FileCreated::success(file_name)))
}

async fn fetch_transcript(
    State(state): State<AppState>,
    Path(url): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<FileCreated>> {
    let url = target_url(url, query);
    validate_url(&url)?;

    let prefix = generate_name();
    let output = state.store.path_of(&prefix)?;

    if let Err(e) = state.fetcher.fetch_captions(&url, &output).await {
        warn!(%url, %prefix, error = %e, "caption fetch failed");
        discard_partials(&state.store, &prefix).await;
        return Err(upstream(e));
    }

    // The tool appends `.<lang>.<ext>`; anchor on the dot so a longer
    // generated name sharing these digits cannot match.
    let caption = state
        .store
        .resolve_by_prefix(&format!("{prefix}."), &CAPTION_SUFFIXES)
        .await
        .map_err(|e| match e {
            Error::NotFound { .. } => ApiError::NotFound(TRANSCRIPT_NOT_FOUND),
            e => e.into(),
        })?;

    info!(%url, file_name = %caption.name, "transcript ready");
    Ok(Json(FileCreated::success(caption.name)))
}

async fn list_files(State(state): State<AppState>) -> ApiResult<Json<FileList>> {
    let files = state.store.list_all().await?;
    Ok(Json(FileList { files }))
}

async fn serve_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    if is_text_caption(&filename) {
        let text = state.store.read_text(&filename).await?;
        let mut response = text.into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        return Ok(response);
    }

    let reader = state.store.read_bytes(&filename).await?;
    let len = reader.artifact.len;
    let content_type = HeaderValue::from_str(&guess_media_type(&filename))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut response = Body::from_stream(reader.into_stream()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    Ok(response)
}

/// Remove whatever a failed fetch left under the generated name `stem`.
///
/// The tool only ever appends `.<ext>` parts, so matching on `stem.` keeps
/// a longer generated name sharing these digits out of reach.
async fn discard_partials(store: &ArtifactStore, stem: &str) -> usize {
    store.discard_prefix(&format!("{stem}.")).await
}

/// Any fetch failure is reported as an upstream failure, except bad input.
fn upstream(e: Error) -> ApiError {
    match e {
        Error::InvalidUrl(_) | Error::InvalidName(_) => e.into(),
        _ => ApiError::Upstream,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path as FsPath;

    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::Request;
    use serde_json::Value;
    use tempfile::tempdir;
    use tower::ServiceExt;

    use super::*;

    /// Fetcher that must never be reached.
    struct Unreachable;

    #[async_trait]
    impl MediaFetcher for Unreachable {
        async fn fetch_audio(&self, _url: &str, _output: &FsPath) -> crate::Result<()> {
            panic!("fetcher called")
        }

        async fn fetch_captions(&self, _url: &str, _prefix: &FsPath) -> crate::Result<()> {
            panic!("fetcher called")
        }
    }

    fn app(dir: &tempfile::TempDir) -> Router {
        let store = ArtifactStore::open(dir.path()).unwrap();
        router(AppState::new(store, Arc::new(Unreachable), 8000))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Response) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        (response.status(), response)
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[test]
    fn test_target_url_reattaches_query() {
        assert_eq!(
            target_url("https://example.com/watch".into(), Some("v=abc&t=3".into())),
            "https://example.com/watch?v=abc&t=3"
        );
        assert_eq!(
            target_url("https://example.com/watch".into(), None),
            "https://example.com/watch"
        );
        assert_eq!(
            target_url("https://example.com/watch".into(), Some(String::new())),
            "https://example.com/watch"
        );
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(ApiError::NotFound(FILE_NOT_FOUND).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Upstream.status().as_u16(), 506);
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(Error::not_found("x")).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempdir().unwrap();
        let (status, response) = get(app(&dir), "/").await;
        assert_eq!(status, StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], "true");
        assert_eq!(body["message"], "downloader service running on port 8000");
    }

    #[tokio::test]
    async fn test_list_files() {
        let dir = tempdir().unwrap();
        let app = app(&dir);
        fs::write(dir.path().join("1.m4a"), b"a").unwrap();
        fs::write(dir.path().join("2.en.srt"), b"b").unwrap();

        let (status, response) = get(app, "/api/files").await;
        assert_eq!(status, StatusCode::OK);
        let body = body_json(response).await;
        let mut files: Vec<String> = body["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        files.sort();
        assert_eq!(files, vec!["1.m4a", "2.en.srt"]);
    }

    #[tokio::test]
    async fn test_serve_audio_streams_bytes() {
        let dir = tempdir().unwrap();
        let app = app(&dir);
        let bytes = vec![7u8; 100_000];
        fs::write(dir.path().join("3.m4a"), &bytes).unwrap();

        let (status, response) = get(app, "/api/files/3.m4a").await;
        assert_eq!(status, StatusCode::OK);
        let ct = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(ct.starts_with("audio/"), "{ct}");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100000");
        assert_eq!(body_bytes(response).await, bytes);
    }

    #[tokio::test]
    async fn test_serve_srt_as_plain_text() {
        let dir = tempdir().unwrap();
        let app = app(&dir);
        fs::write(dir.path().join("4.en.srt"), "1\n00:00:00,000 --> 00:00:01,000\nhi\n").unwrap();

        let (status, response) = get(app, "/api/files/4.en.srt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    }

    #[tokio::test]
    async fn test_serve_vtt_as_raw_text() {
        let dir = tempdir().unwrap();
        let app = app(&dir);
        let vtt = "WEBVTT\n\n00:00.000 --> 00:01.000\nhello\n";
        fs::write(dir.path().join("5.en.vtt"), vtt).unwrap();

        let (status, response) = get(app, "/api/files/5.en.vtt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_bytes(response).await, vtt.as_bytes());
    }

    #[tokio::test]
    async fn test_serve_missing_file() {
        let dir = tempdir().unwrap();
        for uri in ["/api/files/nope.m4a", "/api/files/nope.en.vtt"] {
            let (status, response) = get(app(&dir), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body_json(response).await["detail"], "File not found");
        }
    }

    #[tokio::test]
    async fn test_serve_rejects_dot_dot() {
        let dir = tempdir().unwrap();
        let (status, _) = get(app(&dir), "/api/files/..").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_static_mount() {
        let dir = tempdir().unwrap();
        let app = app(&dir);
        fs::write(dir.path().join("6.m4a"), b"static bytes").unwrap();

        let (status, response) = get(app, "/downloads/6.m4a").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"static bytes");
    }

    #[tokio::test]
    async fn test_discard_partials_spares_longer_names() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("1700000000000.12.en.vtt.part"), b"half").unwrap();
        fs::write(dir.path().join("1700000000000.12.m4a.m4a"), b"odd").unwrap();
        fs::write(dir.path().join("1700000000000.123.en.srt"), b"other").unwrap();
        fs::write(dir.path().join("1700000000000.125.m4a"), b"other").unwrap();

        assert_eq!(discard_partials(&store, "1700000000000.12").await, 2);

        let mut left = store.list_all().await.unwrap();
        left.sort();
        assert_eq!(left, vec!["1700000000000.123.en.srt", "1700000000000.125.m4a"]);
    }

    #[tokio::test]
    async fn test_serve_directory_named_like_caption() {
        let dir = tempdir().unwrap();
        let app = app(&dir);
        fs::create_dir(dir.path().join("7.en.vtt")).unwrap();

        let (status, response) = get(app, "/api/files/7.en.vtt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["detail"], "File not found");
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_fetch() {
        let dir = tempdir().unwrap();
        let (status, _) = get(app(&dir), "/api/download/ftp://example.com/a.mp3").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get(app(&dir), "/api/transcript/not-a-url").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
