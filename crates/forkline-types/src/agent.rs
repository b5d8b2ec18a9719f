//! Agent runtime session types.
//!
//! An agent session is owned by the agent runtime: it holds the key-value
//! state injected at creation and the event history accumulated across
//! turns. Chats reference sessions by id only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::llm::MessageRole;

/// Session state key carrying the forked answer for secondary chats.
pub const PARENT_ANSWER_STATE_KEY: &str = "secondary:parent_answer";

/// Key-value state attached to an agent session.
pub type SessionState = serde_json::Map<String, serde_json::Value>;

/// A conversation session held by the agent runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One turn recorded in an agent session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: i64,
    pub session_id: String,
    /// `"user"` for inbound turns, the persona name for agent replies.
    pub author: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// How the bridge carries conversation context between turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// History lives in a persisted runtime session; only the new turn is sent.
    #[default]
    Stateful,
    /// History is replayed from chat messages as a transcript on every call.
    Stateless,
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentMode::Stateful => write!(f, "stateful"),
            AgentMode::Stateless => write!(f, "stateless"),
        }
    }
}

impl FromStr for AgentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stateful" => Ok(AgentMode::Stateful),
            "stateless" => Ok(AgentMode::Stateless),
            other => Err(format!("invalid agent mode: '{other}'")),
        }
    }
}
