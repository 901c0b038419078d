//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use bits_chat::SessionHandle;
use bits_core::config::BitsConfig;
use bits_vector::IngestPipeline;

/// Shared application state, passed to handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BitsConfig>,
    /// The single chat session. Handlers never touch memory directly.
    pub session: SessionHandle,
    pub ingest: Arc<IngestPipeline>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: BitsConfig, session: SessionHandle, ingest: IngestPipeline) -> Self {
        Self {
            config: Arc::new(config),
            session,
            ingest: Arc::new(ingest),
            start_time: Instant::now(),
        }
    }
}
