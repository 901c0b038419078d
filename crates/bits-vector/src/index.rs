//! In-process hybrid index with brute-force dense and sparse scoring.
//!
//! Dense similarity is cosine over embeddings from an [`EmbeddingService`];
//! sparse similarity is the dot product of [`SparseVector`]s. The two
//! rankings are combined with reciprocal rank fusion, the same fusion the
//! Qdrant query API applies. All searches are O(n), fine for a lab-sized
//! knowledge base.
//!
//! [`EmbeddingService`]: crate::embedding::EmbeddingService

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use bits_core::error::{BitsError, Result};
use bits_core::types::{DocumentChunk, StructuredFilter};

use crate::backend::{ScoredChunk, VectorBackend};
use crate::embedding::DynEmbeddingService;
use crate::sparse::SparseVector;

/// Rank constant for reciprocal rank fusion.
pub const RRF_K: f64 = 60.0;

#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: DocumentChunk,
    dense: Vec<f32>,
    sparse: SparseVector,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    chunk: DocumentChunk,
    dense: Vec<f32>,
}

/// In-memory [`VectorBackend`].
///
/// Thread-safe via interior RwLock; clones share the same entries. When a
/// snapshot path is set, the index is loaded from it on open and rewritten
/// after every upsert.
#[derive(Clone)]
pub struct MemoryIndex {
    embedder: Arc<dyn DynEmbeddingService>,
    entries: Arc<RwLock<BTreeMap<String, IndexEntry>>>,
    created: Arc<AtomicBool>,
    snapshot: Option<PathBuf>,
}

impl MemoryIndex {
    pub fn new(embedder: Arc<dyn DynEmbeddingService>) -> Self {
        Self {
            embedder,
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            created: Arc::new(AtomicBool::new(false)),
            snapshot: None,
        }
    }

    /// Open an index persisted at `path`, starting empty if the file is absent.
    pub fn open(embedder: Arc<dyn DynEmbeddingService>, path: &Path) -> Result<Self> {
        let mut index = Self::new(embedder);
        index.snapshot = Some(path.to_path_buf());

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let saved: Vec<SnapshotEntry> = serde_json::from_str(&content)?;
            let mut entries = index.write_entries()?;
            for entry in saved {
                let sparse = SparseVector::encode(&entry.chunk.content);
                entries.insert(
                    entry.chunk.metadata.content_hash.clone(),
                    IndexEntry {
                        chunk: entry.chunk,
                        dense: entry.dense,
                        sparse,
                    },
                );
            }
            info!(path = %path.display(), chunks = entries.len(), "Loaded index snapshot");
            drop(entries);
            index.created.store(true, Ordering::SeqCst);
        }

        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_entries(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, IndexEntry>>> {
        self.entries
            .write()
            .map_err(|e| BitsError::Storage(format!("Lock poisoned: {}", e)))
    }

    fn read_entries(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, IndexEntry>>> {
        self.entries
            .read()
            .map_err(|e| BitsError::Storage(format!("Lock poisoned: {}", e)))
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let saved: Vec<SnapshotEntry> = self
            .read_entries()?
            .values()
            .map(|e| SnapshotEntry {
                chunk: e.chunk.clone(),
                dense: e.dense.clone(),
            })
            .collect();
        let content = serde_json::to_string(&saved)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for MemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn collection_exists(&self) -> Result<bool> {
        Ok(self.created.load(Ordering::SeqCst))
    }

    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        let mut prepared = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let dense = self.embedder.embed_boxed(&chunk.content).await?;
            prepared.push(IndexEntry {
                chunk: chunk.clone(),
                dense,
                sparse: SparseVector::encode(&chunk.content),
            });
        }

        {
            let mut entries = self.write_entries()?;
            for entry in prepared {
                entries.insert(entry.chunk.metadata.content_hash.clone(), entry);
            }
        }
        self.created.store(true, Ordering::SeqCst);
        self.persist().await?;

        debug!(written = chunks.len(), total = self.len(), "Upserted chunks");
        Ok(chunks.len())
    }

    async fn query(
        &self,
        text: &str,
        filter: Option<StructuredFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let dense_query = self.embedder.embed_boxed(text).await?;
        let sparse_query = SparseVector::encode(text);

        let entries = self.read_entries()?;
        let candidates: Vec<&IndexEntry> = entries
            .values()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.chunk.metadata)))
            .collect();

        let mut dense_ranked: Vec<(usize, f64)> = candidates
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(&dense_query, &e.dense)))
            .collect();
        dense_ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut sparse_ranked: Vec<(usize, f64)> = candidates
            .iter()
            .enumerate()
            .map(|(i, e)| (i, sparse_query.dot(&e.sparse)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        sparse_ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let fused = reciprocal_rank_fusion(&[dense_ranked, sparse_ranked]);

        let mut scored: Vec<ScoredChunk> = fused
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: candidates[i].chunk.clone(),
                score,
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read_entries()?.len())
    }
}

/// Fuse ranked lists of `(candidate, score)` by summing `1 / (k + rank)`.
fn reciprocal_rank_fusion(rankings: &[Vec<(usize, f64)>]) -> Vec<(usize, f64)> {
    let mut fused: HashMap<usize, f64> = HashMap::new();
    for ranking in rankings {
        for (rank, (candidate, _)) in ranking.iter().enumerate() {
            *fused.entry(*candidate).or_insert(0.0) += 1.0 / (RRF_K + rank as f64 + 1.0);
        }
    }
    fused.into_iter().collect()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
