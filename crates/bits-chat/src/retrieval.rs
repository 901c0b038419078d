//! Metadata-filtered hybrid retrieval over the knowledge base.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use bits_core::types::StructuredFilter;
use bits_vector::{ScoredChunk, VectorBackend};

use crate::classifier::{ClassifierDebug, MetadataClassifier};
use crate::error::{bounded, ChatError};

/// One retrieved excerpt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalEntry {
    pub content: String,
    pub source: String,
    pub score: f64,
    pub content_hash: String,
}

impl From<ScoredChunk> for RetrievalEntry {
    fn from(hit: ScoredChunk) -> Self {
        let source = if hit.chunk.metadata.source.is_empty() {
            "unknown".to_string()
        } else {
            hit.chunk.metadata.source
        };
        Self {
            content: hit.chunk.content,
            source,
            score: hit.score,
            content_hash: hit.chunk.metadata.content_hash,
        }
    }
}

/// Ranked, deduplicated retrieval output plus how it was obtained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub entries: Vec<RetrievalEntry>,
    pub classification: ClassifierDebug,
    /// Filter used for the first query, if the classifier produced one.
    pub filter: Option<StructuredFilter>,
    /// True when the filtered query was empty and the unfiltered one was used.
    pub relaxed: bool,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries rendered as numbered blocks separated by blank lines.
    pub fn context(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| format!("Document {} (Source: {})\n{}", i + 1, e.source, e.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Classify, query, relax, rank.
pub struct HybridRetriever {
    backend: Arc<dyn VectorBackend>,
    classifier: MetadataClassifier,
    query_limit: usize,
    max_results: usize,
    timeout: Duration,
}

impl HybridRetriever {
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        classifier: MetadataClassifier,
        query_limit: usize,
        max_results: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            classifier,
            query_limit: query_limit.max(1),
            max_results,
            timeout,
        }
    }

    pub fn backend(&self) -> &Arc<dyn VectorBackend> {
        &self.backend
    }

    /// Retrieve context for `question`.
    ///
    /// A missing collection yields an empty result. A backend that errors or
    /// times out fails the call.
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult, ChatError> {
        let (filter, classification) = self.classifier.classify(question).await;

        let exists = bounded(
            "collection check",
            self.timeout,
            self.backend.collection_exists(),
        )
        .await?;
        if !exists {
            info!(backend = self.backend.name(), "Collection does not exist; no context");
            return Ok(RetrievalResult {
                classification,
                filter,
                ..RetrievalResult::default()
            });
        }

        let mut entries = self.run_query(question, filter).await?;
        let mut relaxed = false;
        if filter.is_some() && entries.is_empty() {
            debug!("Filtered query returned nothing; retrying without filter");
            entries = self.run_query(question, None).await?;
            relaxed = true;
        }

        entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        entries.truncate(self.max_results);

        debug!(
            hits = entries.len(),
            doc_type = %classification.doc_type,
            relaxed,
            "Retrieved context"
        );
        Ok(RetrievalResult {
            entries,
            classification,
            filter,
            relaxed,
        })
    }

    async fn run_query(
        &self,
        question: &str,
        filter: Option<StructuredFilter>,
    ) -> Result<Vec<RetrievalEntry>, ChatError> {
        let hits = bounded(
            "vector query",
            self.timeout,
            self.backend.query(question, filter, self.query_limit),
        )
        .await?;

        let mut seen = HashSet::new();
        Ok(hits
            .into_iter()
            .map(RetrievalEntry::from)
            .filter(|e| seen.insert(e.content_hash.clone()))
            .collect())
    }
}
