//! Test support: AppState over a temp SQLite database with a scripted model.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures_util::Stream;

use forkline_core::agent::box_bridge::BoxAgentBridge;
use forkline_core::agent::credential::Credential;
use forkline_core::agent::session_bridge::SessionBridge;
use forkline_core::agent::transcript::TranscriptBridge;
use forkline_core::llm::box_provider::BoxLlmProvider;
use forkline_core::llm::factory::ProviderFactory;
use forkline_core::llm::provider::LlmProvider;
use forkline_infra::sqlite::agent_session::SqliteAgentSessionStore;
use forkline_infra::sqlite::pool::DatabasePool;
use forkline_types::agent::AgentMode;
use forkline_types::config::ForklineConfig;
use forkline_types::llm::{
    CompletionRequest, LlmError, MessageRole, ProviderCapabilities, StopReason, StreamEvent,
};

use crate::state::AppState;

pub const REJECTED_KEY: &str = "revoked-key";

/// Replies `"{persona}: You said: {last user text}"`. Rejects [`REJECTED_KEY`].
#[derive(Clone, Default)]
pub struct EchoFactory {
    requests: Arc<Mutex<Vec<(String, CompletionRequest)>>>,
}

impl EchoFactory {
    /// `(credential, request)` for every call that reached a provider.
    pub fn requests(&self) -> Vec<(String, CompletionRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

struct EchoProvider {
    credential: String,
    requests: Arc<Mutex<Vec<(String, CompletionRequest)>>>,
    capabilities: ProviderCapabilities,
}

impl LlmProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.requests
            .lock()
            .unwrap()
            .push((self.credential.clone(), request));

        let events = vec![
            Ok(StreamEvent::Connected),
            Ok(StreamEvent::TextDelta {
                text: "primary_agent: You said: ".to_string(),
            }),
            Ok(StreamEvent::TextDelta { text: last_user }),
            Ok(StreamEvent::MessageDelta {
                stop_reason: StopReason::EndTurn,
            }),
            Ok(StreamEvent::Done),
        ];
        Box::pin(futures_util::stream::iter(events))
    }
}

impl ProviderFactory for EchoFactory {
    fn provider_name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo-1"
    }

    fn build(&self, credential: &Credential) -> Result<BoxLlmProvider, LlmError> {
        if credential.expose() == REJECTED_KEY {
            return Err(LlmError::AuthenticationFailed);
        }
        Ok(BoxLlmProvider::new(EchoProvider {
            credential: credential.expose().to_string(),
            requests: self.requests.clone(),
            capabilities: ProviderCapabilities {
                streaming: true,
                max_context_tokens: 32_000,
                max_output_tokens: 1_024,
            },
        }))
    }
}

/// AppState over a fresh temp database, wired to `mode` with an [`EchoFactory`].
pub async fn test_state(mode: AgentMode) -> (AppState, EchoFactory) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = DatabasePool::new(&url).await.unwrap();
    let data_dir = PathBuf::from(dir.path());
    // Leak the tempdir so it's not deleted while the pool is in use
    std::mem::forget(dir);

    let mut config = ForklineConfig::default();
    config.agent.mode = mode;

    let factory = EchoFactory::default();
    let bridge = match mode {
        AgentMode::Stateful => BoxAgentBridge::new(SessionBridge::new(
            SqliteAgentSessionStore::new(pool.clone()),
            factory.clone(),
            config.agent.clone(),
        )),
        AgentMode::Stateless => {
            BoxAgentBridge::new(TranscriptBridge::new(factory.clone(), config.agent.clone()))
        }
    };

    (AppState::with_bridge(pool, bridge, config, data_dir), factory)
}
