use async_trait::async_trait;

use bits_core::error::Result;
use bits_core::types::{DocumentChunk, StructuredFilter};

/// A chunk returned from a backend query with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f64,
}

/// Hybrid (dense + sparse) vector store holding the knowledge chunks.
///
/// Chunks are keyed by their content hash, so upserting identical content
/// twice leaves a single entry.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Human-readable backend name, for logging.
    fn name(&self) -> &str;

    /// Whether the collection has been created.
    async fn collection_exists(&self) -> Result<bool>;

    /// Insert or replace chunks. Returns the number written.
    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<usize>;

    /// Top `limit` chunks for `text`, ranked by descending score, optionally
    /// restricted by `filter`.
    async fn query(
        &self,
        text: &str,
        filter: Option<StructuredFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Number of stored chunks.
    async fn count(&self) -> Result<usize>;
}
