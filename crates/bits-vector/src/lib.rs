//! bits vector crate - embeddings, sparse encoding, hybrid indexes, and ingestion.
//!
//! Provides the [`VectorBackend`] contract used by the retrieval engine, an
//! in-process hybrid index, a Qdrant REST backend, embedding services, and
//! the text chunking pipeline that feeds them.

pub mod backend;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod qdrant;
pub mod sparse;

pub use backend::{ScoredChunk, VectorBackend};
pub use embedding::{DynEmbeddingService, EmbeddingService, HashEmbedding, OllamaEmbedding};
pub use index::MemoryIndex;
pub use ingest::{IngestOptions, IngestPipeline, IngestReport, TextSplitter};
pub use qdrant::{QdrantBackend, QdrantConfig};
pub use sparse::SparseVector;
