//! crates/rag_chat_core/src/pipeline.rs
//!
//! The retrieval-augmented query pipeline: resolve the caller's thread,
//! persist the user turn, derive a search query (captioning an attached
//! image when present), retrieve the nearest chunks, generate a grounded
//! answer, and persist the reply.
//!
//! The pipeline only talks to ports, so the web layer and the tests can
//! inject real adapters or in-memory fakes interchangeably.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{ImageAttachment, Message, MessageRole, RetrievedDocument};
use crate::ports::{
    DatabaseService, GenerationService, PortError, PortResult, VectorIndexService,
};

/// How many nearest chunks a chat turn retrieves by default.
pub const DEFAULT_TOP_K: usize = 5;

/// The outcome of one chat turn, with everything the client needs to render
/// the exchange and its citations.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub thread_id: Uuid,
    pub user_message: Message,
    pub agent_message: Message,
    pub answer: String,
    pub sources: Vec<RetrievedDocument>,
}

/// Orchestrates one retrieval-augmented chat turn end to end.
pub struct ChatPipeline {
    db: Arc<dyn DatabaseService>,
    index: Arc<dyn VectorIndexService>,
    llm: Arc<dyn GenerationService>,
    top_k: usize,
}

impl ChatPipeline {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        index: Arc<dyn VectorIndexService>,
        llm: Arc<dyn GenerationService>,
        top_k: usize,
    ) -> Self {
        Self {
            db,
            index,
            llm,
            top_k,
        }
    }

    /// Runs one chat turn for `user_id`.
    ///
    /// The user message is persisted before any retrieval happens, so the
    /// user's intent survives downstream failures. Steps run strictly in
    /// sequence; an empty retrieval result is not an error.
    pub async fn answer(
        &self,
        user_id: Uuid,
        text: Option<&str>,
        image: Option<&ImageAttachment>,
        image_path: Option<&str>,
    ) -> PortResult<ChatTurn> {
        let text = text.map(str::trim).filter(|t| !t.is_empty());
        if text.is_none() && image.is_none() {
            return Err(PortError::InvalidInput(
                "a chat turn needs a message or an image".to_string(),
            ));
        }

        // 1. Resolve the caller's single default thread (idempotent).
        let thread = self.db.find_or_create_thread(user_id).await?;

        // 2. Persist the incoming message before anything can fail downstream.
        let user_message = self
            .db
            .append_message(
                thread.id,
                MessageRole::User,
                text.unwrap_or_default(),
                image_path,
            )
            .await?;

        // 3. Resolve the search query. An image is first turned into a
        //    textual description and combined with any accompanying text.
        let search_query = match (text, image) {
            (maybe_text, Some(img)) => {
                let caption = self.llm.describe_image(img).await.map_err(|e| {
                    PortError::InvalidInput(format!("failed to analyze the image: {e}"))
                })?;
                debug!(caption = %caption, "image resolved to search query");
                match maybe_text {
                    Some(t) => format!("{t} {caption}"),
                    None => caption,
                }
            }
            (Some(t), None) => t.to_string(),
            (None, None) => unreachable!("validated above"),
        };

        // 4. Top-K similarity search. Zero hits is a valid outcome; the
        //    model is instructed to say so rather than invent an answer.
        let sources = self.index.similarity_search(&search_query, self.top_k).await?;
        info!(
            hits = sources.len(),
            thread_id = %thread.id,
            "retrieved context for chat turn"
        );

        // 5-6. Grounded generation over the retrieved context.
        let query = text.unwrap_or(search_query.as_str());
        let answer = self.llm.answer(query, &sources, image).await?;
        if answer.trim().is_empty() {
            return Err(PortError::Generation(
                "model returned empty content".to_string(),
            ));
        }

        // 7. Persist the reply into the same thread.
        let agent_message = self
            .db
            .append_message(thread.id, MessageRole::Agent, &answer, None)
            .await?;

        Ok(ChatTurn {
            thread_id: thread.id,
            user_message,
            agent_message,
            answer,
            sources,
        })
    }
}
