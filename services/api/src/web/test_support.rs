//! services/api/src/web/test_support.rs
//!
//! In-memory fakes and a ready-made `AppState` for handler-level tests.

use crate::config::Config;
use crate::error::ApiError;
use crate::ingest::{IngestPipeline, PdfTextExtractor};
use crate::uploads::UploadStore;
use crate::web::state::AppState;
use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use rag_chat_core::chunk::ChunkingConfig;
use rag_chat_core::domain::{
    DocumentChunk, ImageAttachment, Message, MessageRole, RetrievedDocument, Role, Thread, User,
    UserCredentials,
};
use rag_chat_core::pipeline::ChatPipeline;
use rag_chat_core::ports::{
    DatabaseService, GenerationService, PortError, PortResult, VectorIndexService,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A `DatabaseService` over plain vectors, inspectable from tests.
#[derive(Default)]
pub struct MemDb {
    pub users: Mutex<Vec<UserCredentials>>,
    pub threads: Mutex<Vec<Thread>>,
    pub messages: Mutex<Vec<Message>>,
}

#[async_trait]
impl DatabaseService for MemDb {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> PortResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == email) {
            return Err(PortError::Conflict(email.to_string()));
        }
        let creds = UserCredentials {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
        };
        users.push(creds.clone());
        Ok(User {
            id: creds.id,
            name: creds.name,
            email: creds.email,
            role,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(email.to_string()))
    }

    async fn get_user_role(&self, user_id: Uuid) -> PortResult<Role> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.role)
            .ok_or_else(|| PortError::NotFound(user_id.to_string()))
    }

    async fn find_thread(&self, user_id: Uuid) -> PortResult<Option<Thread>> {
        Ok(self
            .threads
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.owner_user_id == user_id)
            .cloned())
    }

    async fn find_or_create_thread(&self, user_id: Uuid) -> PortResult<Thread> {
        if let Some(existing) = self.find_thread(user_id).await? {
            return Ok(existing);
        }
        let thread = Thread {
            id: Uuid::new_v4(),
            owner_user_id: user_id,
            title: "New chat".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.threads.lock().unwrap().push(thread.clone());
        Ok(thread)
    }

    async fn append_message(
        &self,
        thread_id: Uuid,
        role: MessageRole,
        content: &str,
        image_path: Option<&str>,
    ) -> PortResult<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            thread_id,
            role,
            content: content.to_string(),
            image_path: image_path.map(str::to_string),
            created_at: Utc::now(),
        };
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, thread_id: Uuid) -> PortResult<Vec<Message>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect())
    }
}

/// An index that accepts every upsert and finds nothing.
pub struct NullIndex;

#[async_trait]
impl VectorIndexService for NullIndex {
    async fn upsert_chunks(&self, _chunks: &[DocumentChunk]) -> PortResult<()> {
        Ok(())
    }

    async fn similarity_search(
        &self,
        _query: &str,
        _top_k: usize,
    ) -> PortResult<Vec<RetrievedDocument>> {
        Ok(Vec::new())
    }
}

/// A generation service with canned output.
pub struct NullLlm;

#[async_trait]
impl GenerationService for NullLlm {
    async fn answer(
        &self,
        _query: &str,
        _context: &[RetrievedDocument],
        _image: Option<&ImageAttachment>,
    ) -> PortResult<String> {
        Ok("a grounded answer".to_string())
    }

    async fn describe_image(&self, _image: &ImageAttachment) -> PortResult<String> {
        Ok("an image".to_string())
    }
}

/// An extractor that rejects every document.
pub struct NoPdf;

impl PdfTextExtractor for NoPdf {
    fn extract_pages(&self, _bytes: &[u8]) -> PortResult<Vec<String>> {
        Err(PortError::InvalidInput("failed to parse PDF".to_string()))
    }
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        jwt_secret: "handler-test-secret".to_string(),
        llm_api_key: "unused".to_string(),
        llm_api_base: "http://localhost".to_string(),
        chat_model: "unused".to_string(),
        embed_model: "unused".to_string(),
        pinecone_api_key: "unused".to_string(),
        pinecone_host: "localhost".to_string(),
        allowed_origins: Vec::new(),
        upload_dir: std::env::temp_dir(),
        chat_rate_limit_per_minute: 20,
        retrieval_top_k: 5,
    }
}

/// Builds an `AppState` over the fakes, with uploads rooted at `upload_root`.
/// The `MemDb` comes back separately so tests can inspect and seed it.
pub fn state_with_uploads(upload_root: PathBuf) -> (Arc<AppState>, Arc<MemDb>) {
    let db = Arc::new(MemDb::default());
    let index: Arc<dyn VectorIndexService> = Arc::new(NullIndex);
    let llm: Arc<dyn GenerationService> = Arc::new(NullLlm);
    let config = Arc::new(test_config());

    let state = Arc::new(AppState {
        db: db.clone(),
        index: index.clone(),
        chat: Arc::new(ChatPipeline::new(db.clone(), index.clone(), llm, 5)),
        ingest: Arc::new(IngestPipeline::new(
            index,
            Arc::new(NoPdf),
            ChunkingConfig::default(),
        )),
        uploads: UploadStore::new(upload_root),
        config: config.clone(),
        chat_limiter: AppState::chat_limiter_for(config.chat_rate_limit_per_minute),
    });
    (state, db)
}

pub fn state() -> (Arc<AppState>, Arc<MemDb>) {
    state_with_uploads(std::env::temp_dir())
}

/// Collapses a handler result into the response the client would see.
pub fn respond<R: IntoResponse>(result: Result<R, ApiError>) -> Response {
    match result {
        Ok(r) => r.into_response(),
        Err(e) => e.into_response(),
    }
}
