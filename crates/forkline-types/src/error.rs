use thiserror::Error;

use crate::chat::{ChatId, MessageId};
use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in forkline-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors raised by the agent session bridge.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("agent session '{0}' not found")]
    SessionNotFound(String),

    #[error("agent runtime returned no final response")]
    NoFinalResponse,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("session store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Errors surfaced by chat operations (pipeline, fork manager, queries).
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat {0} not found")]
    ChatNotFound(ChatId),

    #[error("message {message_id} not found in chat {chat_id}")]
    ParentMessageNotFound {
        chat_id: ChatId,
        message_id: MessageId,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("agent runtime failure: {0}")]
    Upstream(AgentError),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl From<AgentError> for ChatError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Validation(msg) => ChatError::Validation(msg),
            other => ChatError::Upstream(other),
        }
    }
}
