//! Route handler functions for all API endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bits_chat::{ChatOutcome, MemorySnapshot};
use bits_core::types::{DocType, Mode};
use bits_vector::{IngestOptions, IngestReport};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequestBody {
    pub message: String,
    /// Answer in this mode once, leaving the session mode alone.
    #[serde(default)]
    pub mode: Option<Mode>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModeResponse {
    pub mode: Mode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub text: String,
    pub source: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub doc_type: DocType,
    #[serde(default)]
    pub subtype: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub mode: Mode,
    pub backend: String,
    /// `None` when the backend could not be counted.
    pub indexed_chunks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_error: Option<String>,
}

// =============================================================================
// Handler functions
// =============================================================================

/// POST /chat - answer one message.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatOutcome>, ApiError> {
    let outcome = match body.mode {
        Some(mode) => state.session.respond_in(body.message, mode).await?,
        None => state.session.respond(body.message).await?,
    };
    debug!(mode = %outcome.mode, failed = outcome.failed, "Chat handled");
    Ok(Json(outcome))
}

/// GET /mode
pub async fn get_mode(State(state): State<AppState>) -> Result<Json<ModeResponse>, ApiError> {
    let mode = state.session.mode().await?;
    Ok(Json(ModeResponse { mode }))
}

/// POST /mode/{mode} - toggle; toggling the active mode returns to normal.
pub async fn toggle_mode(
    State(state): State<AppState>,
    Path(requested): Path<String>,
) -> Result<Json<ModeResponse>, ApiError> {
    let requested: Mode = requested
        .parse()
        .map_err(|e: bits_core::BitsError| ApiError::BadRequest(e.to_string()))?;
    let mode = state.session.toggle_mode(requested).await?;
    Ok(Json(ModeResponse { mode }))
}

/// POST /memory/clear
pub async fn clear_memory(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    state.session.clear_memory().await?;
    Ok(Json(ClearResponse { cleared: true }))
}

/// GET /memory - summary and buffered turns.
pub async fn get_memory(State(state): State<AppState>) -> Result<Json<MemorySnapshot>, ApiError> {
    Ok(Json(state.session.snapshot().await?))
}

/// POST /documents - split, tag, and index one document.
pub async fn ingest_document(
    State(state): State<AppState>,
    Json(body): Json<DocumentRequest>,
) -> Result<Json<IngestReport>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::BadRequest("'text' must not be empty".to_string()));
    }
    if body.source.trim().is_empty() {
        return Err(ApiError::BadRequest("'source' must not be empty".to_string()));
    }

    let options = IngestOptions {
        source: body.source,
        title: body.title,
        doc_type: body.doc_type,
        subtype: body.subtype,
    };
    let report = state.ingest.ingest_text(&body.text, &options).await?;
    Ok(Json(report))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let backend = state.ingest.backend();
    let (status, indexed_chunks, backend_error) = match backend.count().await {
        Ok(count) => ("healthy", Some(count), None),
        Err(e) => {
            warn!(backend = backend.name(), error = %e, "Health check could not count chunks");
            ("degraded", None, Some(e.to_string()))
        }
    };
    let mode = state.session.mode().await?;

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        mode,
        backend: backend.name().to_string(),
        indexed_chunks,
        backend_error,
    }))
}
