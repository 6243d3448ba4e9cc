//! services/api/src/web/mod.rs
//!
//! The HTTP surface: route handlers, auth plumbing, shared state, and
//! the OpenAPI master definition.

pub mod auth;
pub mod chat;
pub mod documents;
pub mod middleware;
pub mod state;
#[cfg(test)]
pub mod test_support;
pub mod token;

use serde::Serialize;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub use middleware::{require_admin, require_auth};

/// Every success response is wrapped in this envelope, mirroring the
/// `{success, message}` shape error responses use.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(message: &str, data: T) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data,
        }
    }
}

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::signin_handler,
        auth::admin_signin_handler,
        chat::list_chats_handler,
        chat::post_chat_handler,
        documents::upload_pdfs_handler,
        documents::search_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::SigninRequest,
            auth::SignupData,
            auth::SigninData,
            chat::MessageView,
            chat::ChatHistoryData,
            chat::ChatTurnData,
            documents::SearchData,
            crate::ingest::IngestReport,
            crate::ingest::FileIngestResult,
            crate::ingest::IngestStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Account registration and signin."),
        (name = "chat", description = "Retrieval-grounded conversation."),
        (name = "documents", description = "Admin document indexing and retrieval probes.")
    )
)]
pub struct ApiDoc;
