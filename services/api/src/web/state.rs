//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-request identity
//! that the auth middleware attaches.

use crate::config::Config;
use crate::ingest::IngestPipeline;
use crate::uploads::UploadStore;
use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};
use rag_chat_core::domain::Role;
use rag_chat_core::pipeline::ChatPipeline;
use rag_chat_core::ports::{DatabaseService, VectorIndexService};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use uuid::Uuid;

/// Per-client-address limiter for chat submissions.
pub type ChatRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub index: Arc<dyn VectorIndexService>,
    pub chat: Arc<ChatPipeline>,
    pub ingest: Arc<IngestPipeline>,
    pub uploads: UploadStore,
    pub config: Arc<Config>,
    pub chat_limiter: Arc<ChatRateLimiter>,
}

impl AppState {
    /// Builds the keyed limiter from the configured per-minute cap.
    pub fn chat_limiter_for(per_minute: u32) -> Arc<ChatRateLimiter> {
        let cap = NonZeroU32::new(per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
        Arc::new(RateLimiter::keyed(Quota::per_minute(cap)))
    }
}

/// The verified identity of the caller, inserted into request extensions
/// by the auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    /// The role claimed by the token. Admin routes re-check storage.
    pub role: Role,
}
