//! Prism HTTP REST API
//!
//! Axum-based HTTP server exposing feedback, preferences, scoring and organizer
//! views. Runs alongside the Unix socket IPC server on port 8767 (configurable).
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, serde_json::Value)`. Inner functions go through the IPC
//! router, so both transports share one dispatch path and one error mapping:
//! NotFound → 404, InvalidArgument → 400, StorageUnavailable → 503, others → 500.
//!
//! Endpoints:
//! - GET  /health                   health check with storage backend
//! - GET  /version                  server version info
//! - POST /feedback                 record a feedback event
//! - GET  /feedback/stats           feedback counts and top preferences
//! - GET  /feedback/:id             feedback events for one record
//! - GET  /preferences              known preferences by dimension
//! - POST /preferences/replay       rebuild preferences from the feedback log
//! - GET  /content/:id/adjustment   score adjustment for one record
//! - GET  /content/:id/category     category, topic and complexity for one record
//! - POST /content                  insert or replace a content record
//! - GET  /trending?days=N          trending tags and topics
//! - GET  /recommendations?limit=N  records ranked by adjusted score
//! - GET  /collections              grouped and curated collections
//! - GET  /export/markdown          markdown rendering of the collections

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use prism_core::ipc::{ErrorKind, PrismRequest, PrismResponse};
use prism_core::{ContentRecord, FeedbackType, PrismConfig, Store};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub store: Arc<dyn Store>,
    pub config: PrismConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/feedback", post(feedback_handler))
        .route("/feedback/stats", get(feedback_stats_handler))
        .route("/feedback/:id", get(feedback_for_handler))
        .route("/preferences", get(preferences_handler))
        .route("/preferences/replay", post(replay_handler))
        .route("/content", post(upsert_content_handler))
        .route("/content/:id/adjustment", get(adjustment_handler))
        .route("/content/:id/category", get(category_handler))
        .route("/trending", get(trending_handler))
        .route("/recommendations", get(recommendations_handler))
        .route("/collections", get(collections_handler))
        .route("/export/markdown", get(markdown_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    store: Arc<dyn Store>,
    config: PrismConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { store, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Prism HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct FeedbackRequest {
    pub content_id: Option<String>,
    /// gold | good | poor | irrelevant (case-insensitive)
    pub feedback_type: Option<String>,
    pub rating: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TrendingQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RecommendationsQuery {
    pub limit: Option<usize>,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner health check: asks the store and returns (status_code, json_body).
pub async fn health_inner(store: &dyn Store, socket_path: &str) -> (StatusCode, serde_json::Value) {
    match store.health_check().await {
        Ok(backend) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "backend": backend,
                "socket": socket_path,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "prism/1",
    })
}

/// Inner feedback: validates the raw body, then records through the router.
pub async fn feedback_inner(
    store: &dyn Store,
    config: &PrismConfig,
    req: FeedbackRequest,
) -> (StatusCode, serde_json::Value) {
    let content_id = match req.content_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => return bad_request("content_id field is required"),
    };

    let feedback_type = match req.feedback_type.as_deref().map(FeedbackType::from_str) {
        None => None,
        Some(Ok(t)) => Some(t),
        Some(Err(e)) => return bad_request(e.to_string()),
    };

    let request = PrismRequest::RecordFeedback {
        content_id,
        feedback_type,
        rating: req.rating,
        notes: req.notes.unwrap_or_default(),
    };
    dispatch(request, store, config).await
}

pub async fn trending_inner(
    store: &dyn Store,
    config: &PrismConfig,
    query: TrendingQuery,
) -> (StatusCode, serde_json::Value) {
    let request = PrismRequest::Trending {
        window_days: query.days,
    };
    dispatch(request, store, config).await
}

pub async fn recommendations_inner(
    store: &dyn Store,
    config: &PrismConfig,
    query: RecommendationsQuery,
) -> (StatusCode, serde_json::Value) {
    let request = PrismRequest::Recommendations { limit: query.limit };
    dispatch(request, store, config).await
}

/// Route a request through the IPC router and map the envelope to HTTP.
pub async fn dispatch(
    request: PrismRequest,
    store: &dyn Store,
    config: &PrismConfig,
) -> (StatusCode, serde_json::Value) {
    let response = crate::router::handle_request(request, store, config).await;
    match response_to_http(response) {
        Ok(data) => (StatusCode::OK, data),
        Err((status, error)) => (
            status,
            serde_json::json!({
                "error": error,
                "status": "error",
            }),
        ),
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

type Reply = (StatusCode, Json<serde_json::Value>);

fn reply((status, body): (StatusCode, serde_json::Value)) -> Reply {
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    reply(health_inner(state.store.as_ref(), &state.config.service.socket_path).await)
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn feedback_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<FeedbackRequest>,
) -> impl IntoResponse {
    reply(feedback_inner(state.store.as_ref(), &state.config, req).await)
}

pub async fn feedback_stats_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    reply(dispatch(PrismRequest::FeedbackStats, state.store.as_ref(), &state.config).await)
}

pub async fn feedback_for_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let request = PrismRequest::FeedbackFor { content_id: id };
    reply(dispatch(request, state.store.as_ref(), &state.config).await)
}

pub async fn preferences_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    reply(dispatch(PrismRequest::GetPreferences, state.store.as_ref(), &state.config).await)
}

pub async fn replay_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    reply(dispatch(PrismRequest::Replay, state.store.as_ref(), &state.config).await)
}

pub async fn upsert_content_handler(
    State(state): State<Arc<HttpState>>,
    Json(record): Json<ContentRecord>,
) -> impl IntoResponse {
    let request = PrismRequest::UpsertContent { record };
    reply(dispatch(request, state.store.as_ref(), &state.config).await)
}

pub async fn adjustment_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let request = PrismRequest::GetAdjustment { content_id: id };
    reply(dispatch(request, state.store.as_ref(), &state.config).await)
}

pub async fn category_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let request = PrismRequest::Categorize { content_id: id };
    reply(dispatch(request, state.store.as_ref(), &state.config).await)
}

pub async fn trending_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<TrendingQuery>,
) -> impl IntoResponse {
    reply(trending_inner(state.store.as_ref(), &state.config, query).await)
}

pub async fn recommendations_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<RecommendationsQuery>,
) -> impl IntoResponse {
    reply(recommendations_inner(state.store.as_ref(), &state.config, query).await)
}

pub async fn collections_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    reply(dispatch(PrismRequest::Collections, state.store.as_ref(), &state.config).await)
}

pub async fn markdown_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    reply(dispatch(PrismRequest::ExportMarkdown, state.store.as_ref(), &state.config).await)
}

// ============================================================================
// Helpers
// ============================================================================

fn bad_request(msg: impl Into<String>) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::BAD_REQUEST,
        serde_json::json!({
            "error": msg.into(),
            "status": "error",
        }),
    )
}

pub fn status_for(kind: Option<ErrorKind>) -> StatusCode {
    match kind {
        Some(ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorKind::InvalidArgument) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::StorageUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
        Some(ErrorKind::Internal) | None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert an IPC `PrismResponse` into an HTTP body value, or a status and error string.
pub fn response_to_http(
    response: PrismResponse,
) -> std::result::Result<serde_json::Value, (StatusCode, String)> {
    if response.is_ok() {
        Ok(response.data.unwrap_or(serde_json::json!({})))
    } else {
        Err((
            status_for(response.error_kind),
            response.error.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
