//! Fork manager: derive a secondary chat from one message, exactly once.
//!
//! A fork carries the parent answer in two places: the new agent session's
//! state (read by the secondary persona), and two seed messages in the chat
//! itself (hidden system framing plus a visible copy of the answer).

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use forkline_types::agent::{PARENT_ANSWER_STATE_KEY, SessionState};
use forkline_types::chat::{ChatDetail, ChatId, ChatType, ForkOutcome, MessageId, NewFork};
use forkline_types::error::ChatError;

use crate::agent::bridge::{AgentBridge, require_credential};
use crate::agent::credential::Credential;
use crate::metrics::CallMetrics;

use super::repository::ChatRepository;
use super::service::load_detail;

const TITLE_PREVIEW_CHARS: usize = 60;

/// Hidden system message framing a clarification thread.
pub fn system_seed(parent_answer: &str) -> String {
    format!(
        "The user is asking follow-up questions about this previous answer:\n\n\
         {parent_answer}\n\n\
         Explain concepts in simpler, step-by-step detail."
    )
}

/// Title of a fork: `"Clarify: "` plus the start of the parent answer.
pub fn fork_title(parent_answer: &str) -> String {
    let preview: String = parent_answer
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(TITLE_PREVIEW_CHARS)
        .collect();
    format!("Clarify: {preview}")
}

pub struct ForkManager<C: ChatRepository, B: AgentBridge> {
    repo: Arc<C>,
    bridge: Arc<B>,
    metrics: Arc<CallMetrics>,
    user_id: String,
}

impl<C: ChatRepository, B: AgentBridge> ForkManager<C, B> {
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

    /// Fork `parent_message_id` of `parent_chat_id` into a secondary chat.
    ///
    /// Returns the existing fork unchanged when the message was already
    /// forked. Fails with `ParentMessageNotFound` when the message does not
    /// exist or belongs to another chat.
    #[instrument(name = "chat.fork", skip(self, credential))]
    pub async fn fork(
        &self,
        parent_chat_id: ChatId,
        parent_message_id: MessageId,
        credential: &Credential,
    ) -> Result<ChatDetail, ChatError> {
        require_credential(credential)?;

        let parent = self
            .repo
            .get_message_in_chat(parent_chat_id, parent_message_id)
            .await?
            .ok_or(ChatError::ParentMessageNotFound {
                chat_id: parent_chat_id,
                message_id: parent_message_id,
            })?;

        if let Some(existing) = self.repo.find_fork(parent_message_id).await? {
            self.metrics.inc("forks_reused");
            debug!(chat_id = existing.id, "Returning existing fork");
            return load_detail(self.repo.as_ref(), existing.id).await;
        }

        let mut state = SessionState::new();
        state.insert(
            PARENT_ANSWER_STATE_KEY.to_string(),
            Value::String(parent.content.clone()),
        );
        let session_id = self
            .bridge
            .create_session(ChatType::Secondary, &self.user_id, state, credential)
            .await?;

        let outcome = self
            .repo
            .create_fork(&NewFork {
                parent_chat_id,
                parent_message_id,
                agent_session_id: session_id.clone(),
                title: Some(fork_title(&parent.content)),
                system_seed: system_seed(&parent.content),
                assistant_seed: parent.content,
            })
            .await?;

        match outcome {
            ForkOutcome::Created(detail) => {
                self.metrics.inc("forks_created");
                info!(chat_id = detail.chat.id, session_id = %session_id, "Fork created");
                Ok(detail)
            }
            ForkOutcome::Existing(detail) => {
                self.metrics.inc("forks_reused");
                debug!(
                    chat_id = detail.chat.id,
                    orphaned_session_id = %session_id,
                    "Lost fork race; returning the winner"
                );
                Ok(detail)
            }
        }
    }
}
