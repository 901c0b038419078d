//! Document ingestion: chunk text and upsert it into a vector backend.
//!
//! Text extraction from binary formats happens upstream; this pipeline takes
//! UTF-8 text or Markdown.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use bits_core::error::{BitsError, Result};
use bits_core::types::{DocType, DocumentChunk};

use crate::backend::VectorBackend;

/// Separators tried in order, coarsest first. Markdown headings split before
/// paragraphs, paragraphs before lines, lines before words.
const SEPARATORS: &[&str] = &["\n# ", "\n## ", "\n### ", "\n\n", "\n", " ", ""];

// ---------------------------------------------------------------------------
// TextSplitter
// ---------------------------------------------------------------------------

/// Recursive character splitter with overlap, measured in characters.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Split `text` into trimmed, non-empty chunks of at most `chunk_size`
    /// characters.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.trim().to_string());
            } else {
                chunks.extend(self.split_with(&piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }
        chunks
    }

    /// Greedily pack pieces into chunks, carrying up to `chunk_overlap`
    /// trailing characters into the next chunk.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                chunks.push(window.iter().copied().collect::<String>().trim().to_string());
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }
        if !window.is_empty() {
            chunks.push(window.iter().copied().collect::<String>().trim().to_string());
        }
        chunks
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(500, 100)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut pieces = Vec::new();
    for (i, part) in text.split(separator).enumerate() {
        if i == 0 {
            if !part.is_empty() {
                pieces.push(part.to_string());
            }
        } else {
            pieces.push(format!("{}{}", separator, part));
        }
    }
    pieces
}

// ---------------------------------------------------------------------------
// IngestPipeline
// ---------------------------------------------------------------------------

/// Per-document metadata supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Origin label shown in retrieval context (usually the file name).
    pub source: String,
    /// Defaults to `source`.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub doc_type: DocType,
    /// Defaults to the file stem of `source`.
    #[serde(default)]
    pub subtype: Option<String>,
}

impl IngestOptions {
    pub fn new(source: impl Into<String>, doc_type: DocType) -> Self {
        Self {
            source: source.into(),
            doc_type,
            ..Self::default()
        }
    }
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub chunks_stored: usize,
    /// Chunks dropped because they repeat earlier text of the same document.
    pub chunks_skipped: usize,
}

/// Splits documents and upserts the chunks into a [`VectorBackend`].
pub struct IngestPipeline {
    backend: Arc<dyn VectorBackend>,
    splitter: TextSplitter,
}

impl IngestPipeline {
    pub fn new(backend: Arc<dyn VectorBackend>, splitter: TextSplitter) -> Self {
        Self { backend, splitter }
    }

    pub fn backend(&self) -> &Arc<dyn VectorBackend> {
        &self.backend
    }

    /// Build the chunks for `text` without storing them.
    pub fn prepare(&self, text: &str, options: &IngestOptions) -> (Vec<DocumentChunk>, usize) {
        let title = options
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| options.source.clone());
        let subtype = options
            .subtype
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| file_stem(&options.source));

        let mut seen = HashSet::new();
        let mut skipped = 0;
        let mut chunks = Vec::new();
        for piece in self.splitter.split(text) {
            let chunk = DocumentChunk::new(
                piece,
                title.clone(),
                options.source.clone(),
                options.doc_type,
                subtype.clone(),
                chunks.len(),
            );
            if !seen.insert(chunk.metadata.content_hash.clone()) {
                skipped += 1;
                continue;
            }
            chunks.push(chunk);
        }
        (chunks, skipped)
    }

    /// Split, tag, and store `text`.
    pub async fn ingest_text(&self, text: &str, options: &IngestOptions) -> Result<IngestReport> {
        if options.source.trim().is_empty() {
            return Err(BitsError::Storage("document source is required".to_string()));
        }

        let (chunks, skipped) = self.prepare(text, options);
        if chunks.is_empty() {
            debug!(source = %options.source, "Skipping document with no text");
            return Ok(IngestReport {
                chunks_stored: 0,
                chunks_skipped: skipped,
            });
        }

        let stored = self.backend.upsert(&chunks).await?;
        info!(
            source = %options.source,
            doc_type = %options.doc_type,
            stored,
            skipped,
            "Document ingested"
        );
        Ok(IngestReport {
            chunks_stored: stored,
            chunks_skipped: skipped,
        })
    }

    /// Read a UTF-8 file and ingest it. An empty `options.source` is replaced
    /// by the file name.
    pub async fn ingest_file(&self, path: &Path, options: &IngestOptions) -> Result<IngestReport> {
        let text = tokio::fs::read_to_string(path).await?;
        let mut options = options.clone();
        if options.source.trim().is_empty() {
            options.source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
        }
        self.ingest_text(&text, &options).await
    }
}

fn file_stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string())
}
