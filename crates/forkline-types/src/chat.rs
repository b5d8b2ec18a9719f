//! Chat and message types for Forkline.
//!
//! A chat is either a top-level *primary* conversation or a *secondary*
//! clarification thread forked from one message of another chat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

/// Row identifier of a chat.
pub type ChatId = i64;

/// Row identifier of a message.
pub type MessageId = i64;

/// Kind of chat thread.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (type IN ('primary', 'secondary'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Primary,
    Secondary,
}

impl ChatType {
    /// Lowercase name used in storage, metrics keys, and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Primary => "primary",
            ChatType::Secondary => "secondary",
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" => Ok(ChatType::Primary),
            "secondary" => Ok(ChatType::Secondary),
            other => Err(format!("invalid chat type: '{other}'")),
        }
    }
}

/// A persisted chat thread.
///
/// `parent_chat_id` and `parent_message_id` are set iff `chat_type` is
/// `Secondary`. `agent_session_id` correlates the chat with its agent
/// runtime session; `None` means the session has not been created yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub parent_chat_id: Option<ChatId>,
    pub parent_message_id: Option<MessageId>,
    pub agent_session_id: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single message within a chat.
///
/// Messages are ordered by `id` within a chat, which is insertion order.
/// System messages are hidden by the UI but still part of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A chat together with its full ordered message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatDetail {
    #[serde(flatten)]
    pub chat: Chat,
    pub messages: Vec<ChatMessage>,
}

/// Insert payload for a new chat row.
#[derive(Debug, Clone)]
pub struct NewChat {
    pub chat_type: ChatType,
    pub parent_chat_id: Option<ChatId>,
    pub parent_message_id: Option<MessageId>,
    pub agent_session_id: Option<String>,
    pub title: Option<String>,
}

impl NewChat {
    /// A primary chat bound to an already-created agent session.
    pub fn primary(agent_session_id: Option<String>) -> Self {
        Self {
            chat_type: ChatType::Primary,
            parent_chat_id: None,
            parent_message_id: None,
            agent_session_id,
            title: None,
        }
    }
}

/// Everything written atomically when a secondary chat is forked.
#[derive(Debug, Clone)]
pub struct NewFork {
    pub parent_chat_id: ChatId,
    pub parent_message_id: MessageId,
    pub agent_session_id: String,
    pub title: Option<String>,
    /// Hidden system message framing the clarification thread.
    pub system_seed: String,
    /// Visible assistant message duplicating the parent answer.
    pub assistant_seed: String,
}

/// Result of an atomic fork insert.
#[derive(Debug, Clone)]
pub enum ForkOutcome {
    /// The fork was written by this call.
    Created(ChatDetail),
    /// Another writer already forked this message; its chat is returned.
    Existing(ChatDetail),
}

impl ForkOutcome {
    pub fn into_detail(self) -> ChatDetail {
        match self {
            ForkOutcome::Created(detail) | ForkOutcome::Existing(detail) => detail,
        }
    }
}
