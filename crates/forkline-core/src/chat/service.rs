//! Chat service: primary chat creation and read paths.
//!
//! Creating a primary chat allocates its agent session up front, so the
//! lazy backfill in the pipeline only ever runs for legacy rows.

use std::sync::Arc;

use tracing::{info, instrument};

use forkline_types::agent::SessionState;
use forkline_types::chat::{ChatDetail, ChatId, ChatType, NewChat};
use forkline_types::error::ChatError;

use crate::agent::bridge::{AgentBridge, require_credential};
use crate::agent::credential::Credential;
use crate::metrics::CallMetrics;

use super::repository::ChatRepository;

/// Load a chat with its full ordered message list.
pub(crate) async fn load_detail<C: ChatRepository>(
    repo: &C,
    chat_id: ChatId,
) -> Result<ChatDetail, ChatError> {
    let chat = repo
        .get_chat(chat_id)
        .await?
        .ok_or(ChatError::ChatNotFound(chat_id))?;
    let messages = repo.get_messages(chat_id).await?;
    Ok(ChatDetail { chat, messages })
}

/// Generic over the repository and bridge so forkline-core never depends on
/// forkline-infra.
pub struct ChatService<C: ChatRepository, B: AgentBridge> {
    repo: Arc<C>,
    bridge: Arc<B>,
    metrics: Arc<CallMetrics>,
    user_id: String,
}

impl<C: ChatRepository, B: AgentBridge> ChatService<C, B> {
    pub fn new(
        repo: Arc<C>,
        bridge: Arc<B>,
        metrics: Arc<CallMetrics>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            bridge,
            metrics,
            user_id: user_id.into(),
        }
    }

    /// Create a new primary chat bound to a fresh agent session.
    ///
    /// Nothing is written when the credential is missing.
    #[instrument(name = "chat.create_primary", skip_all)]
    pub async fn create_primary_chat(
        &self,
        credential: &Credential,
    ) -> Result<ChatDetail, ChatError> {
        require_credential(credential)?;

        let session_id = self
            .bridge
            .create_session(ChatType::Primary, &self.user_id, SessionState::new(), credential)
            .await?;
        let chat = self.repo.create_chat(&NewChat::primary(Some(session_id))).await?;

        self.metrics.inc("primary_chats_created");
        info!(chat_id = chat.id, "Primary chat created");

        Ok(ChatDetail {
            chat,
            messages: Vec::new(),
        })
    }

    /// Get a chat with its messages.
    pub async fn get_chat(&self, chat_id: ChatId) -> Result<ChatDetail, ChatError> {
        load_detail(self.repo.as_ref(), chat_id).await
    }

    /// Primary chats with their messages, most recent first. Secondary chats
    /// are never listed.
    pub async fn list_primary_chats(&self) -> Result<Vec<ChatDetail>, ChatError> {
        let chats = self.repo.list_chats(ChatType::Primary).await?;
        let mut details = Vec::with_capacity(chats.len());
        for chat in chats {
            let messages = self.repo.get_messages(chat.id).await?;
            details.push(ChatDetail { chat, messages });
        }
        Ok(details)
    }
}
