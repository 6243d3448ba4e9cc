//! crates/rag_chat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases,
//! vector indexes, or model APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    DocumentChunk, ImageAttachment, Message, MessageRole, RetrievedDocument, Role, Thread, User,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services
/// (database, vector index, model APIs) behind the failure taxonomy the
/// web layer maps onto HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Forbidden")]
    Forbidden,
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("Retrieval failed: {0}")]
    Retrieval(String),
    #[error("Generation failed: {0}")]
    Generation(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// Whether retrying the failed call could plausibly succeed.
    /// Input and auth failures are deterministic; external-service
    /// failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Retrieval(_) | PortError::Generation(_) | PortError::Unexpected(_)
        )
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Accounts ---
    /// Creates an account. Fails with `Conflict` when the email is taken.
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    /// Reads the CURRENT role from storage, not from any token claim.
    async fn get_user_role(&self, user_id: Uuid) -> PortResult<Role>;

    // --- Threads and messages ---
    /// Resolves the caller's default thread without creating one.
    /// Reads use this; only a chat turn may bring a thread into being.
    async fn find_thread(&self, user_id: Uuid) -> PortResult<Option<Thread>>;

    /// Returns the caller's default thread, creating it atomically when
    /// absent. Two concurrent calls for the same identity must resolve to
    /// the same thread.
    async fn find_or_create_thread(&self, user_id: Uuid) -> PortResult<Thread>;

    async fn append_message(
        &self,
        thread_id: Uuid,
        role: MessageRole,
        content: &str,
        image_path: Option<&str>,
    ) -> PortResult<Message>;

    /// Messages of one thread, ascending by creation time.
    async fn list_messages(&self, thread_id: Uuid) -> PortResult<Vec<Message>>;
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Converts text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>>;
}

#[async_trait]
pub trait VectorIndexService: Send + Sync {
    /// Writes chunks (with their provenance metadata) to the index.
    /// The adapter computes embeddings internally.
    async fn upsert_chunks(&self, chunks: &[DocumentChunk]) -> PortResult<()>;

    /// Top-K nearest chunks to the query text, with similarity scores.
    async fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
    ) -> PortResult<Vec<RetrievedDocument>>;
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Produces a grounded answer from the query and the retrieved context,
    /// optionally looking at an attached image.
    async fn answer(
        &self,
        query: &str,
        context: &[RetrievedDocument],
        image: Option<&ImageAttachment>,
    ) -> PortResult<String>;

    /// Produces a textual description of an image, suitable as a
    /// similarity-search query.
    async fn describe_image(&self, image: &ImageAttachment) -> PortResult<String>;
}
