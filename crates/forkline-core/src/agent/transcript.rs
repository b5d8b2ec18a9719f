//! Stateless agent bridge that replays the chat transcript on every call.
//!
//! No runtime session is kept. Each call flattens the ordered chat history
//! into one formatted transcript and sends it as the single user turn of a
//! throwaway request.

use tracing::{debug, instrument};
use uuid::Uuid;

use forkline_types::agent::SessionState;
use forkline_types::chat::{ChatMessage, ChatType};
use forkline_types::config::AgentConfig;
use forkline_types::error::AgentError;
use forkline_types::llm::{Message, MessageRole};

use crate::llm::factory::ProviderFactory;

use super::bridge::{AgentBridge, AgentTurn, invoke_model, require_credential};
use super::credential::Credential;
use super::persona::Persona;
use super::reply::strip_role_prefixes;

pub struct TranscriptBridge<F: ProviderFactory> {
    factory: F,
    config: AgentConfig,
}

impl<F: ProviderFactory> TranscriptBridge<F> {
    pub fn new(factory: F, config: AgentConfig) -> Self {
        Self { factory, config }
    }
}

/// Flatten chat history into `"System: …\nUser: …\nAssistant: …"`.
pub fn format_transcript(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|message| format!("{}: {}", role_label(message.role), message.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "System",
        MessageRole::User => "User",
        MessageRole::Assistant => "Assistant",
    }
}

impl<F: ProviderFactory> AgentBridge for TranscriptBridge<F> {
    async fn create_session(
        &self,
        _chat_type: ChatType,
        _user_id: &str,
        _initial_state: SessionState,
        _credential: &Credential,
    ) -> Result<String, AgentError> {
        Ok(Uuid::now_v7().to_string())
    }

    #[instrument(
        name = "transcript_bridge.reply",
        skip_all,
        fields(chat_type = %chat_type, history_len = turn.history.len())
    )]
    async fn reply(
        &self,
        chat_type: ChatType,
        turn: &AgentTurn<'_>,
        credential: &Credential,
    ) -> Result<String, AgentError> {
        require_credential(credential)?;
        if turn.history.is_empty() {
            return Err(AgentError::Validation(
                "conversation history must not be empty".to_string(),
            ));
        }

        let persona = Persona::for_chat_type(chat_type);
        let transcript = format_transcript(turn.history);
        debug!(transcript_len = transcript.len(), "Replaying transcript");

        let raw = invoke_model(
            &self.factory,
            &self.config,
            chat_type,
            persona.name,
            persona.render(&SessionState::new()),
            vec![Message::new(MessageRole::User, transcript)],
            credential,
        )
        .await?;

        Ok(strip_role_prefixes(&raw))
    }
}
