//! services/api/src/web/chat.rs
//!
//! The chat endpoints: reading back the caller's conversation and
//! submitting a new turn (text, image, or both) through the retrieval
//! pipeline.

use axum::{
    extract::{ConnectInfo, Multipart, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rag_chat_core::domain::{ImageAttachment, Message, MessageRole, RetrievedDocument};
use rag_chat_core::ports::PortError;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::uploads::UploadKind;
use crate::web::state::{AppState, AuthUser};
use crate::web::Envelope;

//=========================================================================================
// Response Types
//=========================================================================================

/// One persisted message, in the wire shape clients render.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            role: m.role.as_str().to_string(),
            content: m.content,
            image_path: m.image_path,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryData {
    /// Absent until the first chat turn creates the thread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<Uuid>,
    pub messages: Vec<MessageView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnData {
    pub user_message: MessageView,
    pub agent_message: MessageView,
    /// The generated answer text, duplicated for convenience.
    pub response: String,
    #[schema(value_type = Vec<Object>)]
    pub sources: Vec<RetrievedDocument>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /chats - The caller's conversation so far, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/chats",
    responses(
        (status = 200, description = "Conversation history", body = ChatHistoryData),
        (status = 401, description = "Invalid or missing token"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn list_chats_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    // Reading history never creates the thread; the first chat turn does.
    let Some(thread) = state.db.find_thread(auth.user_id).await? else {
        return Ok(Json(Envelope::new(
            "Chat history",
            ChatHistoryData {
                thread_id: None,
                messages: Vec::new(),
            },
        )));
    };
    let messages = state.db.list_messages(thread.id).await?;

    Ok(Json(Envelope::new(
        "Chat history",
        ChatHistoryData {
            thread_id: Some(thread.id),
            messages: messages.into_iter().map(MessageView::from).collect(),
        },
    )))
}

/// The multipart fields one chat submission may carry.
struct ChatSubmission {
    message: Option<String>,
    message_type: Option<String>,
    image: Option<ImageAttachment>,
}

async fn read_submission(mut multipart: Multipart) -> Result<ChatSubmission, ApiError> {
    let mut submission = ChatSubmission {
        message: None,
        message_type: None,
        image: None,
    };

    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or_default() {
            "message" => submission.message = Some(field.text().await?),
            "messageType" => submission.message_type = Some(field.text().await?),
            "image" => {
                let file_name = field.file_name().unwrap_or("image.jpg").to_string();
                let media_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| ImageAttachment::media_type_for(&file_name).to_string());
                let data = field.bytes().await?.to_vec();
                if !data.is_empty() {
                    submission.image = Some(ImageAttachment {
                        file_name,
                        media_type,
                        data,
                    });
                }
            }
            // Unknown fields (e.g. a client-supplied role) are ignored.
            _ => {}
        }
    }

    Ok(submission)
}

/// A submission that declares itself a text turn must carry non-blank text.
/// Image turns and undeclared turns fall through to the pipeline's own
/// empty-turn check.
fn declared_text_turn_is_empty(submission: &ChatSubmission) -> bool {
    submission.message_type.as_deref() == Some("text")
        && submission
            .message
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
}

/// POST /chats - Submit one chat turn and get the grounded answer.
///
/// Accepts multipart/form-data with a `message` text field, an optional
/// `messageType` discriminator, and an optional `image` file part.
#[utoipa::path(
    post,
    path = "/api/v1/chats",
    request_body(content_type = "multipart/form-data", description = "The chat turn to submit."),
    responses(
        (status = 200, description = "Turn answered", body = ChatTurnData),
        (status = 400, description = "Empty or malformed submission"),
        (status = 401, description = "Invalid or missing token"),
        (status = 429, description = "Too many chat requests"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn post_chat_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    if state.chat_limiter.check_key(&addr.ip()).is_err() {
        return Err(ApiError::RateLimited);
    }

    let submission = read_submission(multipart).await?;

    if declared_text_turn_is_empty(&submission) {
        return Err(ApiError::Port(PortError::InvalidInput(
            "Message text is required".to_string(),
        )));
    }

    // The image lands on disk only for the duration of the turn.
    let saved_image = match &submission.image {
        Some(image) => Some(
            state
                .uploads
                .save(UploadKind::Image, &image.file_name, &image.data)
                .await?,
        ),
        None => None,
    };
    let image_path = saved_image.as_ref().map(|p| p.display().to_string());

    let outcome = state
        .chat
        .answer(
            auth.user_id,
            submission.message.as_deref(),
            submission.image.as_ref(),
            image_path.as_deref(),
        )
        .await;

    if let Some(path) = &saved_image {
        state.uploads.remove(path).await;
    }
    let turn = outcome?;

    info!(
        user_id = %auth.user_id,
        thread_id = %turn.thread_id,
        sources = turn.sources.len(),
        "chat turn answered"
    );

    debug_assert_eq!(turn.agent_message.role, MessageRole::Agent);
    Ok(Json(Envelope::new(
        "Turn answered",
        ChatTurnData {
            user_message: turn.user_message.into(),
            agent_message: turn.agent_message.into(),
            response: turn.answer,
            sources: turn.sources,
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_support;
    use axum::http::StatusCode;
    use rag_chat_core::domain::Role;
    use rag_chat_core::ports::DatabaseService;

    fn submission(message: Option<&str>, message_type: Option<&str>) -> ChatSubmission {
        ChatSubmission {
            message: message.map(str::to_string),
            message_type: message_type.map(str::to_string),
            image: None,
        }
    }

    #[test]
    fn declared_text_turn_rejects_missing_and_blank_text() {
        assert!(declared_text_turn_is_empty(&submission(None, Some("text"))));
        assert!(declared_text_turn_is_empty(&submission(
            Some("   \n\t"),
            Some("text")
        )));
    }

    #[test]
    fn declared_text_turn_accepts_real_text() {
        assert!(!declared_text_turn_is_empty(&submission(
            Some("what is a clove hitch"),
            Some("text")
        )));
    }

    #[test]
    fn undeclared_turns_defer_to_the_pipeline() {
        // Image turns carry no text; the pipeline decides whether the
        // combined turn is empty.
        assert!(!declared_text_turn_is_empty(&submission(None, Some("image"))));
        assert!(!declared_text_turn_is_empty(&submission(None, None)));
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn listing_history_never_creates_a_thread() {
        let (state, db) = test_support::state();
        let auth = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::User,
        };

        let response = test_support::respond(
            list_chats_handler(State(state), Extension(auth)).await,
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert!(db.threads.lock().unwrap().is_empty());

        let body = body_json(response).await;
        assert_eq!(body["data"]["threadId"], serde_json::Value::Null);
        assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn listing_history_returns_the_persisted_conversation() {
        let (state, db) = test_support::state();
        let user_id = Uuid::new_v4();
        let thread = db.find_or_create_thread(user_id).await.unwrap();
        db.append_message(thread.id, MessageRole::User, "which badge is this", None)
            .await
            .unwrap();
        db.append_message(thread.id, MessageRole::Agent, "the pioneering badge", None)
            .await
            .unwrap();

        let auth = AuthUser {
            user_id,
            role: Role::User,
        };
        let response = test_support::respond(
            list_chats_handler(State(state), Extension(auth)).await,
        );
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["data"]["threadId"], thread.id.to_string().as_str());
        let messages = body["data"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "agent");
        assert_eq!(messages[1]["content"], "the pioneering badge");
    }
}
