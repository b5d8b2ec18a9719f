//! In-memory fakes shared by the unit tests of this crate.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures_util::Stream;
use uuid::Uuid;

use forkline_types::agent::{AgentSession, SessionEvent, SessionState};
use forkline_types::chat::{
    Chat, ChatDetail, ChatId, ChatMessage, ChatType, ForkOutcome, MessageId, MessageRole,
    NewChat, NewFork,
};
use forkline_types::error::{AgentError, RepositoryError};
use forkline_types::llm::{
    CompletionRequest, LlmError, ProviderCapabilities, StopReason, StreamEvent, Usage,
};

use crate::agent::bridge::{AgentBridge, AgentTurn};
use crate::agent::credential::Credential;
use crate::agent::session_store::AgentSessionStore;
use crate::chat::repository::ChatRepository;
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::factory::ProviderFactory;
use crate::llm::provider::LlmProvider;

// --- Chat repository ---

#[derive(Default)]
struct ChatTables {
    chats: Vec<Chat>,
    messages: Vec<ChatMessage>,
    next_chat_id: ChatId,
    next_message_id: MessageId,
}

impl ChatTables {
    fn insert_chat(&mut self, new: &NewChat) -> Chat {
        self.next_chat_id += 1;
        let now = Utc::now();
        let chat = Chat {
            id: self.next_chat_id,
            chat_type: new.chat_type,
            parent_chat_id: new.parent_chat_id,
            parent_message_id: new.parent_message_id,
            agent_session_id: new.agent_session_id.clone(),
            title: new.title.clone(),
            created_at: now,
            updated_at: now,
        };
        self.chats.push(chat.clone());
        chat
    }

    fn insert_message(&mut self, chat_id: ChatId, role: MessageRole, content: &str) -> ChatMessage {
        self.next_message_id += 1;
        let message = ChatMessage {
            id: self.next_message_id,
            chat_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }

    fn detail(&self, chat: &Chat) -> ChatDetail {
        ChatDetail {
            chat: chat.clone(),
            messages: self
                .messages
                .iter()
                .filter(|m| m.chat_id == chat.id)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Default)]
pub struct InMemoryChatRepository {
    tables: Mutex<ChatTables>,
}

impl ChatRepository for InMemoryChatRepository {
    async fn create_chat(&self, chat: &NewChat) -> Result<Chat, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(parent) = chat.parent_message_id {
            if tables.chats.iter().any(|c| c.parent_message_id == Some(parent)) {
                return Err(RepositoryError::Conflict("parent message already forked".into()));
            }
        }
        Ok(tables.insert_chat(chat))
    }

    async fn get_chat(&self, chat_id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.chats.iter().find(|c| c.id == chat_id).cloned())
    }

    async fn list_chats(&self, chat_type: ChatType) -> Result<Vec<Chat>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        let mut chats: Vec<Chat> = tables
            .chats
            .iter()
            .filter(|c| c.chat_type == chat_type)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(chats)
    }

    async fn get_messages(&self, chat_id: ChatId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect())
    }

    async fn get_message_in_chat(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .messages
            .iter()
            .find(|m| m.id == message_id && m.chat_id == chat_id)
            .cloned())
    }

    async fn find_fork(&self, parent_message_id: MessageId) -> Result<Option<Chat>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .chats
            .iter()
            .find(|c| c.parent_message_id == Some(parent_message_id))
            .cloned())
    }

    async fn save_message(
        &self,
        chat_id: ChatId,
        role: MessageRole,
        content: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.chats.iter().any(|c| c.id == chat_id) {
            return Err(RepositoryError::NotFound);
        }
        Ok(tables.insert_message(chat_id, role, content))
    }

    async fn touch_chat(&self, chat_id: ChatId) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let chat = tables
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or(RepositoryError::NotFound)?;
        chat.updated_at = Utc::now();
        Ok(())
    }

    async fn set_agent_session_if_absent(
        &self,
        chat_id: ChatId,
        session_id: &str,
    ) -> Result<String, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let chat = tables
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or(RepositoryError::NotFound)?;
        match chat.agent_session_id.as_deref() {
            Some(existing) if !existing.is_empty() => Ok(existing.to_string()),
            _ => {
                chat.agent_session_id = Some(session_id.to_string());
                Ok(session_id.to_string())
            }
        }
    }

    async fn create_fork(&self, fork: &NewFork) -> Result<ForkOutcome, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(existing) = tables
            .chats
            .iter()
            .find(|c| c.parent_message_id == Some(fork.parent_message_id))
        {
            let existing = existing.clone();
            return Ok(ForkOutcome::Existing(tables.detail(&existing)));
        }

        let chat = tables.insert_chat(&NewChat {
            chat_type: ChatType::Secondary,
            parent_chat_id: Some(fork.parent_chat_id),
            parent_message_id: Some(fork.parent_message_id),
            agent_session_id: Some(fork.agent_session_id.clone()),
            title: fork.title.clone(),
        });
        tables.insert_message(chat.id, MessageRole::System, &fork.system_seed);
        tables.insert_message(chat.id, MessageRole::Assistant, &fork.assistant_seed);
        Ok(ForkOutcome::Created(tables.detail(&chat)))
    }
}

// --- Agent session store ---

#[derive(Default)]
struct SessionTables {
    sessions: HashMap<String, AgentSession>,
    events: Vec<SessionEvent>,
}

#[derive(Default)]
pub struct InMemorySessionStore {
    tables: Mutex<SessionTables>,
}

impl AgentSessionStore for InMemorySessionStore {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        state: SessionState,
    ) -> Result<AgentSession, RepositoryError> {
        let now = Utc::now();
        let session = AgentSession {
            id: Uuid::now_v7().to_string(),
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            state,
            created_at: now,
            updated_at: now,
        };
        let mut tables = self.tables.lock().unwrap();
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<AgentSession>, RepositoryError> {
        Ok(self.tables.lock().unwrap().sessions.get(session_id).cloned())
    }

    async fn append_event(
        &self,
        session_id: &str,
        author: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<SessionEvent, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.sessions.contains_key(session_id) {
            return Err(RepositoryError::NotFound);
        }
        let event = SessionEvent {
            id: tables.events.len() as i64 + 1,
            session_id: session_id.to_string(),
            author: author.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        tables.events.push(event.clone());
        Ok(event)
    }

    async fn list_events(&self, session_id: &str) -> Result<Vec<SessionEvent>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .events
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }
}

// --- Scripted LLM provider ---

/// What a scripted provider streams back.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream the text, then `Done`.
    Reply(String),
    /// Stream the text but never send `Done`.
    NoDone(String),
    /// Fail mid-stream.
    Fail,
    /// Reply with the credential the provider was built with.
    EchoCredential,
}

#[derive(Default)]
struct Recorded {
    credentials: Vec<String>,
    requests: Vec<CompletionRequest>,
}

#[derive(Clone)]
pub struct ScriptedFactory {
    script: Script,
    recorded: Arc<Mutex<Recorded>>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    pub fn seen_credentials(&self) -> Vec<String> {
        self.recorded.lock().unwrap().credentials.clone()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.recorded.lock().unwrap().requests.clone()
    }
}

impl ProviderFactory for ScriptedFactory {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn build(&self, credential: &Credential) -> Result<BoxLlmProvider, LlmError> {
        self.recorded
            .lock()
            .unwrap()
            .credentials
            .push(credential.expose().to_string());
        Ok(BoxLlmProvider::new(ScriptedProvider {
            script: self.script.clone(),
            credential: credential.expose().to_string(),
            recorded: Arc::clone(&self.recorded),
            capabilities: ProviderCapabilities {
                streaming: true,
                max_context_tokens: 32_000,
                max_output_tokens: 1024,
            },
        }))
    }
}

struct ScriptedProvider {
    script: Script,
    credential: String,
    recorded: Arc<Mutex<Recorded>>,
    capabilities: ProviderCapabilities,
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        self.recorded.lock().unwrap().requests.push(request);
        let script = self.script.clone();
        let credential = self.credential.clone();

        Box::pin(async_stream::stream! {
            yield Ok(StreamEvent::Connected);
            match script {
                Script::Reply(text) => {
                    let output_tokens = text.chars().count() as u32;
                    yield Ok(StreamEvent::Usage(Usage { input_tokens: 12, output_tokens }));
                    yield Ok(StreamEvent::TextDelta { text });
                    yield Ok(StreamEvent::MessageDelta { stop_reason: StopReason::EndTurn });
                    yield Ok(StreamEvent::Done);
                }
                Script::NoDone(text) => {
                    yield Ok(StreamEvent::TextDelta { text });
                }
                Script::Fail => {
                    yield Err(LlmError::Provider { message: "scripted failure".to_string() });
                }
                Script::EchoCredential => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    yield Ok(StreamEvent::TextDelta { text: credential });
                    yield Ok(StreamEvent::Done);
                }
            }
        })
    }
}

// --- Stub bridge ---

/// A turn as observed by `StubBridge`.
#[derive(Debug, Clone)]
pub struct RecordedTurn {
    pub chat_type: ChatType,
    pub session_id: String,
    pub text: String,
    pub history_len: usize,
    pub credential: String,
}

#[derive(Default)]
struct BridgeLog {
    sessions: Vec<(String, ChatType, SessionState)>,
    turns: Vec<RecordedTurn>,
}

/// Bridge fake that records every call and answers from a fixed reply.
pub struct StubBridge {
    reply: Option<String>,
    log: Mutex<BridgeLog>,
}

impl StubBridge {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            log: Mutex::new(BridgeLog::default()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            log: Mutex::new(BridgeLog::default()),
        }
    }

    pub fn created_sessions(&self) -> Vec<(String, ChatType, SessionState)> {
        self.log.lock().unwrap().sessions.clone()
    }

    pub fn turns(&self) -> Vec<RecordedTurn> {
        self.log.lock().unwrap().turns.clone()
    }
}

impl AgentBridge for StubBridge {
    async fn create_session(
        &self,
        chat_type: ChatType,
        _user_id: &str,
        initial_state: SessionState,
        _credential: &Credential,
    ) -> Result<String, AgentError> {
        let mut log = self.log.lock().unwrap();
        let id = format!("session-{}", log.sessions.len() + 1);
        log.sessions.push((id.clone(), chat_type, initial_state));
        Ok(id)
    }

    async fn reply(
        &self,
        chat_type: ChatType,
        turn: &AgentTurn<'_>,
        credential: &Credential,
    ) -> Result<String, AgentError> {
        self.log.lock().unwrap().turns.push(RecordedTurn {
            chat_type,
            session_id: turn.session_id.to_string(),
            text: turn.text.to_string(),
            history_len: turn.history.len(),
            credential: credential.expose().to_string(),
        });
        self.reply.clone().ok_or_else(|| {
            AgentError::Llm(LlmError::Provider {
                message: "stub bridge failure".to_string(),
            })
        })
    }
}
