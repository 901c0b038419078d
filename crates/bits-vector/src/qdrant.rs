//! Qdrant REST backend.
//!
//! One collection with a named dense vector (`dense`, cosine) and a named
//! sparse vector (`sparse`). Queries prefetch from both and fuse them with
//! Qdrant's reciprocal rank fusion. Point ids are chunk content hashes, so
//! re-ingesting identical text overwrites the same point.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use bits_core::error::{BitsError, Result};
use bits_core::types::{content_hash, ChunkMetadata, DocumentChunk, StructuredFilter};

use crate::backend::{ScoredChunk, VectorBackend};
use crate::embedding::DynEmbeddingService;
use crate::sparse::SparseVector;

pub const DENSE_VECTOR: &str = "dense";
pub const SPARSE_VECTOR: &str = "sparse";

/// Connection settings for a Qdrant collection.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub timeout: Duration,
}

/// [`VectorBackend`] backed by a Qdrant server.
pub struct QdrantBackend {
    http: Client,
    config: QdrantConfig,
    embedder: Arc<dyn DynEmbeddingService>,
}

impl QdrantBackend {
    pub fn new(config: QdrantConfig, embedder: Arc<dyn DynEmbeddingService>) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers(config.api_key.as_deref())?)
            .build()
            .map_err(|e| BitsError::Search(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config: QdrantConfig {
                url: config.url.trim_end_matches('/').to_string(),
                ..config
            },
            embedder,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.config.url, self.config.collection, suffix
        )
    }

    async fn ensure_collection(&self) -> Result<()> {
        if self.collection_exists().await? {
            return Ok(());
        }
        let body = create_collection_body(self.embedder.dimensions());
        let response = self
            .http
            .put(self.collection_url(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::CONFLICT => {
                info!(collection = %self.config.collection, "Created Qdrant collection");
                Ok(())
            }
            other => Err(BitsError::Search(format!(
                "qdrant collection error ({}): {}",
                other,
                response.text().await.unwrap_or_default()
            ))),
        }
    }

    fn request_error(&self, err: reqwest::Error) -> BitsError {
        if err.is_timeout() {
            BitsError::Timeout {
                operation: "qdrant request".to_string(),
                secs: self.config.timeout.as_secs(),
            }
        } else {
            BitsError::Search(format!("qdrant request failed: {}", err))
        }
    }

    async fn check(&self, response: reqwest::Response, operation: &str) -> Result<Value> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BitsError::Search(format!(
                "qdrant {} failed ({}): {}",
                operation, status, body
            )));
        }
        response
            .json()
            .await
            .map_err(|e| BitsError::Search(format!("qdrant {} response: {}", operation, e)))
    }
}

fn headers(api_key: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key {
        headers.insert(
            HeaderName::from_static("api-key"),
            HeaderValue::from_str(key)
                .map_err(|e| BitsError::Config(format!("invalid qdrant api key: {}", e)))?,
        );
    }
    Ok(headers)
}

// ---------------------------------------------------------------------------
// Request/response bodies
// ---------------------------------------------------------------------------

fn create_collection_body(dimensions: usize) -> Value {
    json!({
        "vectors": {
            "dense": { "size": dimensions, "distance": "Cosine" }
        },
        "sparse_vectors": {
            "sparse": {}
        }
    })
}

fn point_body(chunk: &DocumentChunk, dense: Vec<f32>) -> Result<Value> {
    let mut payload = serde_json::to_value(&chunk.metadata)?;
    if let Value::Object(map) = &mut payload {
        map.insert("document".to_string(), Value::String(chunk.content.clone()));
    }
    Ok(json!({
        "id": chunk.metadata.content_hash,
        "vector": {
            "dense": dense,
            "sparse": SparseVector::encode(&chunk.content),
        },
        "payload": payload,
    }))
}

fn filter_body(filter: StructuredFilter) -> Value {
    json!({
        "must": [
            { "key": "type", "match": { "value": filter.doc_type.as_str() } }
        ]
    })
}

fn query_body(
    dense: Vec<f32>,
    sparse: SparseVector,
    filter: Option<StructuredFilter>,
    limit: usize,
) -> Value {
    let filter = filter.map(filter_body);
    let mut dense_prefetch = json!({ "query": dense, "using": DENSE_VECTOR, "limit": limit });
    let mut sparse_prefetch = json!({ "query": sparse, "using": SPARSE_VECTOR, "limit": limit });
    let mut body = json!({
        "query": { "fusion": "rrf" },
        "limit": limit,
        "with_payload": true,
    });
    if let Some(filter) = filter {
        dense_prefetch["filter"] = filter.clone();
        sparse_prefetch["filter"] = filter.clone();
        body["filter"] = filter;
    }
    body["prefetch"] = json!([dense_prefetch, sparse_prefetch]);
    body
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    points: Vec<QueryPoint>,
}

#[derive(Debug, Deserialize)]
struct QueryPoint {
    #[serde(default)]
    id: Value,
    score: f64,
    #[serde(default)]
    payload: Option<Value>,
}

fn parse_query_response(body: Value) -> Result<Vec<ScoredChunk>> {
    let response: QueryResponse = serde_json::from_value(body)?;
    let mut hits = Vec::with_capacity(response.result.points.len());
    for point in response.result.points {
        let Some(payload) = point.payload else {
            continue;
        };
        let content = payload
            .get("document")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut metadata: ChunkMetadata = match serde_json::from_value(payload) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(id = %point.id, error = %e, "Skipping point with unreadable payload");
                continue;
            }
        };
        if metadata.content_hash.is_empty() {
            metadata.content_hash = content_hash(&content);
        }
        hits.push(ScoredChunk {
            chunk: DocumentChunk { content, metadata },
            score: point.score,
        });
    }
    Ok(hits)
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn collection_exists(&self) -> Result<bool> {
        let response = self
            .http
            .get(self.collection_url("/exists"))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let body = self.check(response, "exists").await?;
        Ok(body["result"]["exists"].as_bool().unwrap_or(false))
    }

    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        self.ensure_collection().await?;

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let dense = self.embedder.embed_boxed(&chunk.content).await?;
            points.push(point_body(chunk, dense)?);
        }

        let response = self
            .http
            .put(self.collection_url("/points"))
            .query(&[("wait", "true")])
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        self.check(response, "upsert").await?;

        debug!(collection = %self.config.collection, written = chunks.len(), "Upserted points");
        Ok(chunks.len())
    }

    async fn query(
        &self,
        text: &str,
        filter: Option<StructuredFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let dense = self.embedder.embed_boxed(text).await?;
        let body = query_body(dense, SparseVector::encode(text), filter, limit);

        let response = self
            .http
            .post(self.collection_url("/points/query"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let body = self.check(response, "query").await?;
        parse_query_response(body)
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .http
            .post(self.collection_url("/points/count"))
            .json(&json!({ "exact": true }))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let body = self.check(response, "count").await?;
        Ok(body["result"]["count"].as_u64().unwrap_or(0) as usize)
    }
}
