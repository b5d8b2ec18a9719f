//! BoxAgentBridge -- object-safe dynamic dispatch wrapper for AgentBridge.
//!
//! Same blanket-impl pattern as the other boxed ports:
//! 1. Define an object-safe `AgentBridgeDyn` trait with boxed futures
//! 2. Blanket-impl `AgentBridgeDyn` for all `T: AgentBridge`
//! 3. `BoxAgentBridge` wraps `Box<dyn AgentBridgeDyn>` and delegates
//!
//! The API layer picks the stateful or stateless bridge from configuration
//! at startup and stores it as a `BoxAgentBridge`.

use std::future::Future;
use std::pin::Pin;

use forkline_types::agent::SessionState;
use forkline_types::chat::ChatType;
use forkline_types::error::AgentError;

use super::bridge::{AgentBridge, AgentTurn};
use super::credential::Credential;

/// Object-safe version of [`AgentBridge`] with boxed futures.
pub trait AgentBridgeDyn: Send + Sync {
    fn create_session_boxed<'a>(
        &'a self,
        chat_type: ChatType,
        user_id: &'a str,
        initial_state: SessionState,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<String, AgentError>> + Send + 'a>>;

    fn reply_boxed<'a>(
        &'a self,
        chat_type: ChatType,
        turn: &'a AgentTurn<'a>,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<String, AgentError>> + Send + 'a>>;
}

impl<T: AgentBridge> AgentBridgeDyn for T {
    fn create_session_boxed<'a>(
        &'a self,
        chat_type: ChatType,
        user_id: &'a str,
        initial_state: SessionState,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<String, AgentError>> + Send + 'a>> {
        Box::pin(self.create_session(chat_type, user_id, initial_state, credential))
    }

    fn reply_boxed<'a>(
        &'a self,
        chat_type: ChatType,
        turn: &'a AgentTurn<'a>,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<String, AgentError>> + Send + 'a>> {
        Box::pin(self.reply(chat_type, turn, credential))
    }
}

/// Type-erased agent bridge.
pub struct BoxAgentBridge {
    inner: Box<dyn AgentBridgeDyn>,
}

impl BoxAgentBridge {
    pub fn new<T: AgentBridge + 'static>(bridge: T) -> Self {
        Self {
            inner: Box::new(bridge),
        }
    }
}

impl AgentBridge for BoxAgentBridge {
    async fn create_session(
        &self,
        chat_type: ChatType,
        user_id: &str,
        initial_state: SessionState,
        credential: &Credential,
    ) -> Result<String, AgentError> {
        self.inner
            .create_session_boxed(chat_type, user_id, initial_state, credential)
            .await
    }

    async fn reply(
        &self,
        chat_type: ChatType,
        turn: &AgentTurn<'_>,
        credential: &Credential,
    ) -> Result<String, AgentError> {
        self.inner.reply_boxed(chat_type, turn, credential).await
    }
}
