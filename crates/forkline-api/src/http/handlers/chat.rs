//! Chat handlers: create, list, get, post message, fork.
//!
//! Bodies are returned bare (a chat with its messages, or a list of them).
//! Errors use the envelope from [`AppError`].

use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use forkline_types::chat::{ChatDetail, ChatId, MessageId, MessageRole};

use crate::http::error::AppError;
use crate::http::extractors::credential::UserCredential;
use crate::http::extractors::rejection::{ApiJson, ApiPath};
use crate::state::AppState;

/// Request body for `POST /chats/{id}/messages`.
#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub content: String,
    /// Only `"user"` is accepted; the assistant turn is produced by the agent.
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    MessageRole::User.to_string()
}

/// Request body for `POST /chats/fork`.
#[derive(Debug, Deserialize)]
pub struct ForkRequest {
    pub parent_chat_id: ChatId,
    pub parent_message_id: MessageId,
}

/// POST /chats - Create a primary chat.
pub async fn create_chat(
    State(state): State<AppState>,
    UserCredential(credential): UserCredential,
) -> Result<Json<ChatDetail>, AppError> {
    let detail = state.chat_service.create_primary_chat(&credential).await?;
    Ok(Json(detail))
}

/// GET /chats - List primary chats with their messages, newest first.
pub async fn list_chats(State(state): State<AppState>) -> Result<Json<Vec<ChatDetail>>, AppError> {
    let chats = state.chat_service.list_primary_chats().await?;
    Ok(Json(chats))
}

/// GET /chats/{id} - Get a chat with its messages.
pub async fn get_chat(
    State(state): State<AppState>,
    ApiPath(chat_id): ApiPath<ChatId>,
) -> Result<Json<ChatDetail>, AppError> {
    let detail = state.chat_service.get_chat(chat_id).await?;
    Ok(Json(detail))
}

/// POST /chats/{id}/messages - Send a user turn and return the updated chat.
pub async fn post_message(
    State(state): State<AppState>,
    ApiPath(chat_id): ApiPath<ChatId>,
    UserCredential(credential): UserCredential,
    ApiJson(body): ApiJson<PostMessageRequest>,
) -> Result<Json<ChatDetail>, AppError> {
    if body.role.parse::<MessageRole>().ok() != Some(MessageRole::User) {
        return Err(AppError::Validation(format!(
            "role must be 'user', got '{}'",
            body.role
        )));
    }

    let detail = state
        .pipeline
        .post_message(chat_id, &body.content, &credential)
        .await?;
    Ok(Json(detail))
}

/// POST /chats/fork - Fork a message into a secondary chat (idempotent).
pub async fn fork_chat(
    State(state): State<AppState>,
    UserCredential(credential): UserCredential,
    ApiJson(body): ApiJson<ForkRequest>,
) -> Result<Json<ChatDetail>, AppError> {
    let detail = state
        .fork_manager
        .fork(body.parent_chat_id, body.parent_message_id, &credential)
        .await?;
    Ok(Json(detail))
}
