//! Stateful agent bridge backed by persisted agent sessions.
//!
//! Each chat owns one agent session. The session accumulates the user and
//! agent events, so a call only carries the new user text; the persona
//! instruction is rendered against the session's key-value state.

use tracing::{info, instrument, warn};

use forkline_types::agent::SessionState;
use forkline_types::chat::ChatType;
use forkline_types::config::AgentConfig;
use forkline_types::error::AgentError;
use forkline_types::llm::{Message, MessageRole};

use crate::llm::factory::ProviderFactory;

use super::bridge::{AgentBridge, AgentTurn, invoke_model, require_credential};
use super::credential::Credential;
use super::persona::Persona;
use super::reply::strip_role_prefixes;
use super::session_store::AgentSessionStore;

/// Author recorded on user events.
const USER_AUTHOR: &str = "user";

pub struct SessionBridge<S: AgentSessionStore, F: ProviderFactory> {
    store: S,
    factory: F,
    config: AgentConfig,
}

impl<S: AgentSessionStore, F: ProviderFactory> SessionBridge<S, F> {
    pub fn new(store: S, factory: F, config: AgentConfig) -> Self {
        Self {
            store,
            factory,
            config,
        }
    }

    /// Access the session store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Send exactly one new user turn into an existing session.
    ///
    /// The user event is appended before the model is called and stays
    /// appended if the call fails. The agent event is only appended once a
    /// final response arrived.
    #[instrument(
        name = "session_bridge.send_message",
        skip_all,
        fields(chat_type = %chat_type, session_id = %session_id)
    )]
    pub async fn send_message(
        &self,
        chat_type: ChatType,
        session_id: &str,
        text: &str,
        user_id: &str,
        credential: &Credential,
    ) -> Result<String, AgentError> {
        if session_id.trim().is_empty() {
            return Err(AgentError::Validation(
                "agent session id is required".to_string(),
            ));
        }
        require_credential(credential)?;

        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))?;

        if session.user_id != user_id {
            warn!(
                owner = %session.user_id,
                caller = %user_id,
                "Agent session belongs to another user"
            );
            return Err(AgentError::SessionNotFound(session_id.to_string()));
        }

        self.store
            .append_event(session_id, USER_AUTHOR, MessageRole::User, text)
            .await?;

        let persona = Persona::for_chat_type(chat_type);
        let system = persona.render(&session.state);
        let messages = self
            .store
            .list_events(session_id)
            .await?
            .into_iter()
            .map(|event| Message::new(event.role, event.content))
            .collect();

        let raw = invoke_model(
            &self.factory,
            &self.config,
            chat_type,
            persona.name,
            system,
            messages,
            credential,
        )
        .await?;
        let reply = strip_role_prefixes(&raw);

        self.store
            .append_event(session_id, persona.name, MessageRole::Assistant, &reply)
            .await?;

        Ok(reply)
    }
}

impl<S: AgentSessionStore, F: ProviderFactory> AgentBridge for SessionBridge<S, F> {
    async fn create_session(
        &self,
        chat_type: ChatType,
        user_id: &str,
        initial_state: SessionState,
        _credential: &Credential,
    ) -> Result<String, AgentError> {
        let session = self
            .store
            .create_session(&self.config.app_name, user_id, initial_state)
            .await?;
        info!(session_id = %session.id, chat_type = %chat_type, "Agent session created");
        Ok(session.id)
    }

    async fn reply(
        &self,
        chat_type: ChatType,
        turn: &AgentTurn<'_>,
        credential: &Credential,
    ) -> Result<String, AgentError> {
        self.send_message(chat_type, turn.session_id, turn.text, turn.user_id, credential)
            .await
    }
}
