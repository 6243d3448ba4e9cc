//! services/api/src/adapters/embeddings.rs
//!
//! This module contains the adapter for the embedding model. It implements
//! the `EmbeddingService` port from the `core` crate against any
//! OpenAI-compatible embeddings endpoint.

use async_openai::{
    config::OpenAIConfig, error::OpenAIError, types::embeddings::CreateEmbeddingRequestArgs, Client,
};
use async_trait::async_trait;
use rag_chat_core::ports::{EmbeddingService, PortError, PortResult};

use crate::retry::{with_backoff, DEFAULT_ATTEMPTS};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `EmbeddingService` using an OpenAI-compatible API.
#[derive(Clone)]
pub struct OpenAiEmbeddingAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbeddingAdapter {
    /// Creates a new `OpenAiEmbeddingAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    async fn embed_once(&self, text: &str) -> PortResult<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Retrieval(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                PortError::Retrieval("embedding response contained no vectors".to_string())
            })
    }
}

//=========================================================================================
// `EmbeddingService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingAdapter {
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>> {
        with_backoff("embed", DEFAULT_ATTEMPTS, || self.embed_once(text)).await
    }
}
