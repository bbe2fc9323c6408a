//! Document Q&A HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Serve the HTML client page |
//! | `POST` | `/upload` | Upload a document (`multipart/form-data`, first file part) |
//! | `POST` | `/` | Ask a question: `{"question": "..."}` → `{"answer", "similarity"}` |
//!
//! Any other `GET` path answers 404.
//!
//! # Error Contract
//!
//! Every error response is a JSON object with a single `message` field:
//!
//! ```json
//! { "message": "No PDF uploaded or processed" }
//! ```
//!
//! Caller errors are 400, unexpected failures are 500 with the message
//! prefixed by `Server error: `.
//!
//! # CORS
//!
//! Every response allows any origin. `OPTIONS` requests are answered as
//! preflights (200, empty body) allowing `GET, POST, OPTIONS` and the
//! `content-type` header.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::analyzer::EnglishAnalyzer;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::QaError;
use crate::extract::{DocumentExtractor, TextExtractor};
use crate::multipart;
use crate::retrieval::{MatchResult, RetrievalEngine};
use crate::session::{DocumentSession, LoadedDocument};
use crate::upload::UploadStore;

/// Page served at `GET /` when `server.index_page` is not configured.
const BUILTIN_INDEX_PAGE: &str = include_str!("../assets/index.html");

pub const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded successfully";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<RetrievalEngine>,
    session: Arc<DocumentSession>,
    uploads: Arc<UploadStore>,
    extractor: Arc<dyn TextExtractor>,
    index_page: Arc<str>,
}

impl AppState {
    pub fn new(
        engine: RetrievalEngine,
        uploads: UploadStore,
        extractor: Arc<dyn TextExtractor>,
        index_page: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            session: Arc::new(DocumentSession::new()),
            uploads: Arc::new(uploads),
            extractor,
            index_page: index_page.into(),
        }
    }

    /// Builds the full production state: upload directory, embedding model,
    /// index page. Any failure here is fatal to startup.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let uploads = UploadStore::open(&config.server.upload_dir)?;
        let embedder = create_embedder(&config.embedding)?;
        tracing::info!(
            provider = %config.embedding.provider,
            model = embedder.model_name(),
            "Embedding model ready"
        );
        let engine = RetrievalEngine::new(Arc::new(EnglishAnalyzer), embedder, &config.retrieval);

        let index_page = match &config.server.index_page {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                anyhow::anyhow!("Failed to read index page {}: {}", path.display(), e)
            })?,
            None => BUILTIN_INDEX_PAGE.to_string(),
        };

        Ok(Self::new(
            engine,
            uploads,
            Arc::new(DocumentExtractor),
            index_page,
        ))
    }
}

/// Assembles the router with CORS, request tracing, and the upload size limit.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/", get(handle_index).post(handle_query))
        .route("/upload", post(handle_upload).fallback(handle_not_found))
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` and serves until Ctrl-C.
///
/// # Returns
///
/// Returns `Ok(())` when the server shuts down, or an error if startup or
/// binding fails.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let app = build_router(state, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        upload_dir = %config.server.upload_dir.display(),
        "Document Q&A server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ============ Error response ============

#[derive(Serialize)]
struct MessageBody {
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl From<QaError> for AppError {
    fn from(err: QaError) -> Self {
        if err.is_caller_error() {
            tracing::warn!(error = %err, "Rejected request");
            AppError {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
            }
        } else {
            tracing::error!(error = %format!("{:#}", err), "Request failed");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("Server error: {}", err),
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(MessageBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

// ============ GET / ============

async fn handle_index(State(state): State<AppState>) -> Html<String> {
    Html(state.index_page.to_string())
}

async fn handle_not_found() -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: "Not Found".to_string(),
    }
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    filename: String,
    stored_path: String,
}

/// Handler for `POST /upload`.
///
/// Stores the first file part verbatim, extracts its text, and makes it the
/// document every subsequent query runs against.
async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| QaError::malformed("Content-Type must be multipart/form-data"))?;
    let boundary = multipart::boundary_from_content_type(content_type)?;
    let file = multipart::extract(&body, boundary.as_bytes())?;

    let stored_path = state.uploads.save(&file).await?;

    let extractor = Arc::clone(&state.extractor);
    let filename = file.filename.clone();
    let text = tokio::task::spawn_blocking(move || extractor.extract(&file.filename, &file.bytes))
        .await
        .map_err(|e| QaError::Unexpected(e.into()))?
        .map_err(|e| QaError::Unexpected(e.into()))?;

    tracing::info!(
        filename = %filename,
        path = %stored_path.display(),
        chars = text.chars().count(),
        "Document loaded"
    );

    state
        .session
        .set(LoadedDocument {
            filename: filename.clone(),
            stored_path: stored_path.clone(),
            text,
        })
        .await;

    Ok(Json(UploadResponse {
        message: UPLOAD_SUCCESS_MESSAGE,
        filename,
        stored_path: stored_path.display().to_string(),
    }))
}

// ============ POST / ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    question: String,
}

/// Handler for `POST /`.
///
/// Answers against the most recently uploaded document. The body is parsed
/// as JSON regardless of its declared content type.
async fn handle_query(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MatchResult>, AppError> {
    let request: QueryRequest = serde_json::from_slice(&body)
        .map_err(|e| QaError::InvalidRequest(format!("Invalid JSON body: {}", e)))?;

    let document = state.session.get().await.ok_or(QaError::EmptyDocument)?;
    let result = state.engine.answer(&document.text, &request.question).await?;

    tracing::info!(
        filename = %document.filename,
        similarity = result.similarity,
        sentence = result.sentence_index,
        "Answered question"
    );

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::embedding::HashEmbedder;

    const BOUNDARY: &str = "XyZ123";

    async fn spawn_app() -> (String, tempfile::TempDir) {
        spawn_app_with_limit(1024 * 1024).await
    }

    /// Serves a router backed by the hash embedder on an ephemeral port.
    async fn spawn_app_with_limit(max_body_bytes: usize) -> (String, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let engine = RetrievalEngine::new(
            Arc::new(EnglishAnalyzer),
            Arc::new(HashEmbedder::new(384)),
            &RetrievalConfig::default(),
        );
        let uploads = UploadStore::open(tmp.path().join("uploads")).unwrap();
        let extractor = Arc::new(DocumentExtractor);
        let state = AppState::new(engine, uploads, extractor, "<html>hi</html>");
        let app = build_router(state, max_body_bytes);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), tmp)
    }

    fn multipart_body(filename: &str, content: &str) -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: text/plain\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = filename,
            c = content
        )
    }

    async fn upload(
        client: &reqwest::Client,
        base: &str,
        filename: &str,
        content: &str,
    ) -> reqwest::Response {
        client
            .post(format!("{}/upload", base))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(multipart_body(filename, content))
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn query_before_upload_is_rejected() {
        let (base, _tmp) = spawn_app().await;
        let resp = reqwest::Client::new()
            .post(&base)
            .json(&serde_json::json!({ "question": "anything" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "No PDF uploaded or processed");
    }

    #[tokio::test]
    async fn upload_then_query_answers_from_document() {
        let (base, tmp) = spawn_app().await;
        let client = reqwest::Client::new();

        let story = "The cat sat on the mat. The dog ran fast.";
        let resp = upload(&client, &base, "story.txt", story).await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["message"], UPLOAD_SUCCESS_MESSAGE);
        assert_eq!(body["filename"], "story.txt");
        assert!(tmp.path().join("uploads").join("story.txt").is_file());

        let resp = client
            .post(&base)
            .json(&serde_json::json!({ "question": "Where did the cat sit?" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["answer"], "The cat sat on the mat.");
        assert!(body["similarity"].as_f64().unwrap() >= 0.3);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let (base, tmp) = spawn_app_with_limit(64).await;
        let client = reqwest::Client::new();
        let resp = upload(&client, &base, "big.txt", &"The cat sat. ".repeat(20)).await;
        assert_eq!(resp.status(), 413);
        assert!(!tmp.path().join("uploads").join("big.txt").exists());

        let resp = client
            .post(&base)
            .json(&serde_json::json!({ "question": "x".repeat(100) }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 413);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (base, _tmp) = spawn_app().await;
        let resp = reqwest::Client::new()
            .post(&base)
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn unsupported_upload_is_server_error() {
        let (base, _tmp) = spawn_app().await;
        let resp = upload(&reqwest::Client::new(), &base, "photo.png", "not text").await;
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Server error: "));
    }

    #[tokio::test]
    async fn every_response_allows_any_origin() {
        let (base, _tmp) = spawn_app().await;
        let client = reqwest::Client::new();

        let resp = client.get(&base).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert_eq!(resp.text().await.unwrap(), "<html>hi</html>");

        let resp = client.get(format!("{}/nope", base)).send().await.unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");

        let resp = client
            .request(reqwest::Method::OPTIONS, format!("{}/upload", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert!(resp.text().await.unwrap().is_empty());
    }

    #[test]
    fn caller_errors_map_to_400_and_others_to_500() {
        let err = AppError::from(QaError::EmptyDocument);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "No PDF uploaded or processed");

        let err = AppError::from(QaError::Unexpected(anyhow::anyhow!("model crashed")));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Server error: model crashed");
    }
}
