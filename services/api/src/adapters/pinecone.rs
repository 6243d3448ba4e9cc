//! services/api/src/adapters/pinecone.rs
//!
//! This module contains the vector index adapter, the concrete implementation
//! of the `VectorIndexService` port against the Pinecone data-plane REST API.
//! Embeddings are computed internally through the `EmbeddingService` port
//! before vectors are written or queried.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use rag_chat_core::domain::{DocumentChunk, RetrievedDocument};
use rag_chat_core::ports::{EmbeddingService, PortError, PortResult, VectorIndexService};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::retry::{with_backoff, DEFAULT_ATTEMPTS};

/// How many embedding calls may be in flight at once during an upsert.
/// Latency tuning only; correctness does not depend on it.
const EMBED_CONCURRENCY: usize = 5;

/// Vectors per upsert request, within Pinecone's batch limits.
const UPSERT_BATCH: usize = 100;

/// The metadata key the index stores chunk text under.
const TEXT_KEY: &str = "text";

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct UpsertRequest {
    vectors: Vec<VectorRecord>,
}

#[derive(Serialize, Clone)]
struct VectorRecord {
    id: String,
    values: Vec<f32>,
    metadata: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    #[allow(dead_code)]
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<Value>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `VectorIndexService` against a Pinecone index.
#[derive(Clone)]
pub struct PineconeAdapter {
    http: reqwest::Client,
    embedder: Arc<dyn EmbeddingService>,
    api_key: String,
    base_url: String,
}

impl PineconeAdapter {
    /// Creates a new `PineconeAdapter` for the index served at `host`.
    pub fn new(
        http: reqwest::Client,
        embedder: Arc<dyn EmbeddingService>,
        api_key: String,
        host: &str,
    ) -> Self {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };
        Self {
            http,
            embedder,
            api_key,
            base_url,
        }
    }

    async fn post<Req: Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> PortResult<Resp> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PortError::Retrieval(format!("index request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PortError::Retrieval(format!(
                "index returned {status}: {detail}"
            )));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| PortError::Retrieval(format!("malformed index response: {e}")))
    }

    /// Converts one similarity match into the transient retrieval record,
    /// pulling provenance fields out of the stored metadata.
    fn to_retrieved(m: QueryMatch) -> RetrievedDocument {
        let metadata = m.metadata.unwrap_or(Value::Null);
        let content = metadata
            .get(TEXT_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let source_file = metadata
            .get("sourceFile")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        let page_number = metadata
            .get("pageNumber")
            .and_then(Value::as_u64)
            .map(|p| p as u32);
        let chunk_index = metadata
            .get("chunkIndex")
            .and_then(Value::as_u64)
            .map(|c| c as u32);

        RetrievedDocument {
            score: m.score,
            content,
            source_file,
            page_number,
            chunk_index,
            metadata,
        }
    }

    fn chunk_metadata(chunk: &DocumentChunk) -> PortResult<Value> {
        let mut metadata = serde_json::to_value(&chunk.metadata)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        // The chunk text rides along in metadata so queries can return it.
        metadata[TEXT_KEY] = Value::String(chunk.content.clone());
        Ok(metadata)
    }
}

//=========================================================================================
// `VectorIndexService` Trait Implementation
//=========================================================================================

#[async_trait]
impl VectorIndexService for PineconeAdapter {
    async fn upsert_chunks(&self, chunks: &[DocumentChunk]) -> PortResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        // Embed with a bounded fan-out, preserving chunk order.
        let embed_futures: Vec<_> = chunks
            .iter()
            .map(|chunk| self.embedder.embed(&chunk.content))
            .collect();
        let embeddings: Vec<Vec<f32>> = stream::iter(embed_futures)
            .buffered(EMBED_CONCURRENCY)
            .try_collect()
            .await?;

        let records = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| {
                Ok(VectorRecord {
                    id: chunk.id.clone(),
                    values,
                    metadata: Self::chunk_metadata(chunk)?,
                })
            })
            .collect::<PortResult<Vec<_>>>()?;

        for batch in records.chunks(UPSERT_BATCH) {
            let request = UpsertRequest {
                vectors: batch.to_vec(),
            };
            with_backoff("index_upsert", DEFAULT_ATTEMPTS, || async {
                self.post::<_, Value>("/vectors/upsert", &request).await
            })
            .await?;
        }

        info!(chunks = chunks.len(), "indexed chunk batch");
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
    ) -> PortResult<Vec<RetrievedDocument>> {
        let vector = self.embedder.embed(query).await?;
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
        };

        let response: QueryResponse = with_backoff("index_query", DEFAULT_ATTEMPTS, || async {
            self.post("/query", &request).await
        })
        .await?;

        let docs: Vec<RetrievedDocument> = response
            .matches
            .into_iter()
            .map(Self::to_retrieved)
            .collect();
        debug!(hits = docs.len(), "similarity search complete");
        Ok(docs)
    }
}
