//! HTTP and WebSocket surface.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Answer `{query, context}` → `{result}` |
//! | `POST` | `/upload` | Multipart upload (field `document`), then scoped ingestion |
//! | `POST` | `/embed` | Scoped ingestion of `{documentName}` |
//! | `GET`  | `/check-new-documents` | Full ingestion pass |
//! | `GET`  | `/document-list` | Raw listing of the documents directory |
//! | `GET`  | `/health` | Status, version and readiness |
//! | `GET`  | `/agent` | WebSocket live progress channel |
//!
//! # Error Contract
//!
//! Every error response is `{"error": "<message>"}`: 400 for missing input,
//! 503 while the model is not ready yet, 500 for internal failures. Internal
//! details are logged, never returned.
//!
//! # Live progress channel
//!
//! After connecting to `/agent` the client sends `clientReady` (plain text or
//! `{"type":"clientReady"}`). The server then replays the buffered
//! `embeddingStatus` events and the `agentReady` flag, and streams live events
//! as `{"event": ..., "data": ...}` text frames until the socket closes.

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use crate::coordinator::{sanitize_filename, AppContext};
use crate::error::DocentError;
use crate::events::Subscription;

/// Upper bound on an uploaded document.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Build the router over a shared context. Used by [`run_server`] and tests.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/query", post(handle_query))
        .route(
            "/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/embed", post(handle_embed))
        .route("/check-new-documents", get(handle_check_documents))
        .route("/document-list", get(handle_document_list))
        .route("/health", get(handle_health))
        .route("/agent", get(handle_agent_socket))
        .layer(cors)
        .with_state(ctx)
}

/// Bind `[server].bind` and serve until the process ends.
pub async fn run_server(ctx: Arc<AppContext>) -> anyhow::Result<()> {
    let bind_addr = ctx.config().server.bind.clone();
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn not_ready() -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: "The agent is still initializing, please try again shortly".to_string(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

/// Treat missing, blank and absent fields alike.
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============ POST /query ============

#[derive(Deserialize, Default)]
struct QueryRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    result: String,
}

async fn handle_query(
    State(ctx): State<Arc<AppContext>>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;
    let query = required(request.query).ok_or_else(|| bad_request("Query is required"))?;
    let context =
        required(request.context).ok_or_else(|| bad_request("Context file is required"))?;

    match ctx.answer(&query, &context).await {
        Ok(result) => Ok(Json(QueryResponse { result })),
        Err(DocentError::AgentNotReady) => Err(not_ready()),
        Err(e) => {
            error!(error = %e, "error processing query");
            Err(internal("An error occurred while processing your query"))
        }
    }
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    filename: String,
}

async fn handle_upload(
    State(ctx): State<Arc<AppContext>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        if field.name() != Some("document") {
            continue;
        }
        let name = field
            .file_name()
            .and_then(sanitize_filename)
            .ok_or_else(|| bad_request("Uploaded file has no usable name"))?;
        let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;

        let filename = ctx.save_upload(&name, &bytes).await.map_err(|e| {
            error!(error = %e, "failed to store upload");
            internal("An error occurred while storing the upload")
        })?;

        if ctx.is_ready() {
            ctx.spawn_embed(filename.clone());
        } else {
            debug!(filename = %filename, "upload stored, ingestion deferred to startup pass");
        }

        return Ok(Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            filename,
        }));
    }

    Err(bad_request("No file uploaded."))
}

// ============ POST /embed ============

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    #[serde(default)]
    document_name: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_embed(
    State(ctx): State<Arc<AppContext>>,
    body: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;
    let name = required(request.document_name).ok_or_else(|| bad_request("File is required"))?;
    let filename = sanitize_filename(&name).ok_or_else(|| bad_request("Invalid document name"))?;
    if !ctx.is_ready() {
        return Err(not_ready());
    }

    info!(filename = %filename, "document embed received");
    ctx.spawn_embed(filename.clone());
    Ok(Json(MessageResponse {
        message: format!("File being processed: {}", filename),
    }))
}

// ============ GET /check-new-documents ============

async fn handle_check_documents(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<MessageResponse>, AppError> {
    if !ctx.is_ready() {
        return Err(not_ready());
    }
    ctx.check_documents().await.map_err(|e| {
        error!(error = %e, "error checking for new documents");
        internal("An error occurred while checking for new documents")
    })?;
    Ok(Json(MessageResponse {
        message: "Document check completed successfully.".to_string(),
    }))
}

// ============ GET /document-list ============

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<String>,
}

async fn handle_document_list(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = ctx.list_documents().map_err(|e| {
        error!(error = %e, "error reading document list");
        internal("An error occurred while reading the document list")
    })?;
    Ok(Json(DocumentListResponse { documents }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    ready: bool,
}

async fn handle_health(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ready: ctx.is_ready(),
    })
}

// ============ GET /agent (WebSocket) ============

async fn handle_agent_socket(
    State(ctx): State<Arc<AppContext>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| agent_socket(socket, ctx))
}

/// Accepts `clientReady` as plain text or as `{"type": "clientReady"}` / `{"event": "clientReady"}`.
pub(crate) fn is_client_ready(text: &str) -> bool {
    let text = text.trim();
    if text == "clientReady" {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .map(|v| {
            v.get("type").and_then(|t| t.as_str()) == Some("clientReady")
                || v.get("event").and_then(|t| t.as_str()) == Some("clientReady")
        })
        .unwrap_or(false)
}

async fn agent_socket(socket: WebSocket, ctx: Arc<AppContext>) {
    let Subscription { id, mut events } = ctx.events().subscribe();
    let (mut sender, mut receiver) = socket.split();
    info!(observer = ?id, "client connected");

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if is_client_ready(text.as_str()) {
                        debug!(observer = ?id, "client ready");
                        ctx.events().ready(id);
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            Some(event) = events.recv() => {
                let Ok(payload) = serde_json::to_string(&event) else {
                    continue;
                };
                if sender.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    ctx.events().unsubscribe(id);
    info!(observer = ?id, "client disconnected");
}
