//! crates/rag_chat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role assigned to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Represents a registered account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

// Only used internally for signin - carries the secret hash.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// The single default conversation thread owned by one identity.
#[derive(Debug, Clone, Serialize)]
pub struct Thread {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who authored a message within a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
    Developer,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Agent => "agent",
            MessageRole::Developer => "developer",
        }
    }

    pub fn parse(s: &str) -> Option<MessageRole> {
        match s {
            "user" => Some(MessageRole::User),
            "agent" => Some(MessageRole::Agent),
            "developer" => Some(MessageRole::Developer),
            _ => None,
        }
    }
}

/// A single immutable message inside a thread, ordered by creation time.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An image attached to a chat turn, already read into memory.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub file_name: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

impl ImageAttachment {
    /// Guesses a media type from a file name extension, defaulting to JPEG.
    pub fn media_type_for(file_name: &str) -> &'static str {
        let ext = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
        match ext.as_str() {
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            "bmp" => "image/bmp",
            _ => "image/jpeg",
        }
    }
}

/// Provenance metadata attached to every indexed chunk.
///
/// Field names follow the wire format the index stores, so chunks written
/// by this service and queried back keep their attribution intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub source_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub uploaded_at: DateTime<Utc>,
}

/// A bounded slice of a source document, ready for embedding and indexing.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// One similarity-search hit. Transient: derived per query, never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedDocument {
    pub score: f32,
    pub content: String,
    pub source_file: String,
    pub page_number: Option<u32>,
    pub chunk_index: Option<u32>,
    /// The raw metadata blob returned by the index, kept for client display.
    pub metadata: serde_json::Value,
}
