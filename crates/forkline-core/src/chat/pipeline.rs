//! Message pipeline: the single path that advances a chat by one user turn.
//!
//! Order of effects for `post_message`:
//! 1. validate input, load the chat, bind an agent session if it has none
//! 2. persist the user message (committed before the model is called)
//! 3. ask the bridge for a reply
//! 4. persist the assistant message and reload the chat
//!
//! A failed model call leaves the user message in place with no reply.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use forkline_types::agent::{PARENT_ANSWER_STATE_KEY, SessionState};
use forkline_types::chat::{Chat, ChatDetail, ChatId, ChatType, MessageRole};
use forkline_types::error::{AgentError, ChatError};

use crate::agent::bridge::{AgentBridge, AgentTurn, require_credential};
use crate::agent::credential::Credential;
use crate::metrics::CallMetrics;

use super::repository::ChatRepository;
use super::service::load_detail;

pub struct MessagePipeline<C: ChatRepository, B: AgentBridge> {
    repo: Arc<C>,
    bridge: Arc<B>,
    metrics: Arc<CallMetrics>,
    user_id: String,
}

impl<C: ChatRepository, B: AgentBridge> MessagePipeline<C, B> {
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

    /// Post one user message to any chat and return the updated chat.
    #[instrument(name = "chat.post_message", skip(self, content, credential))]
    pub async fn post_message(
        &self,
        chat_id: ChatId,
        content: &str,
        credential: &Credential,
    ) -> Result<ChatDetail, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::Validation(
                "message content must not be empty".to_string(),
            ));
        }
        require_credential(credential)?;

        let chat = self
            .repo
            .get_chat(chat_id)
            .await?
            .ok_or(ChatError::ChatNotFound(chat_id))?;
        let chat_type = chat.chat_type;

        let session_id = match chat.agent_session_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => self.backfill_session(&chat, credential).await?,
        };

        self.metrics.inc_for(chat_type, "messages");
        self.repo
            .save_message(chat_id, MessageRole::User, content)
            .await?;
        self.repo.touch_chat(chat_id).await?;

        let history = self.repo.get_messages(chat_id).await?;
        let turn = AgentTurn {
            session_id: &session_id,
            user_id: &self.user_id,
            text: content,
            history: &history,
        };

        self.metrics.inc_for(chat_type, "agent_calls");
        let reply = match self.bridge.reply(chat_type, &turn, credential).await {
            Ok(reply) => reply,
            Err(e) => {
                self.metrics.inc_for(chat_type, "agent_errors");
                if let AgentError::SessionNotFound(_) = e {
                    // Permanent until agent.user_id matches the session owner again.
                    error!(
                        chat_id,
                        session_id = %session_id,
                        user_id = %self.user_id,
                        "Agent session missing or owned by another user; check agent.user_id"
                    );
                } else {
                    warn!(chat_id, chat_type = %chat_type, error = %e, "Agent call failed");
                }
                return Err(e.into());
            }
        };

        self.repo
            .save_message(chat_id, MessageRole::Assistant, &reply)
            .await?;
        self.repo.touch_chat(chat_id).await?;

        load_detail(self.repo.as_ref(), chat_id).await
    }

    /// Create a session for a legacy chat that has none and bind it.
    ///
    /// The bind is conditional, so concurrent callers agree on one winner.
    async fn backfill_session(
        &self,
        chat: &Chat,
        credential: &Credential,
    ) -> Result<String, ChatError> {
        let state = self.initial_state(chat).await?;
        let candidate = self
            .bridge
            .create_session(chat.chat_type, &self.user_id, state, credential)
            .await?;
        let stored = self
            .repo
            .set_agent_session_if_absent(chat.id, &candidate)
            .await?;

        if stored == candidate {
            self.metrics.inc("sessions_backfilled");
            info!(chat_id = chat.id, session_id = %stored, "Agent session backfilled");
        } else {
            debug!(
                chat_id = chat.id,
                orphaned_session_id = %candidate,
                "Concurrent backfill won; discarding new session"
            );
        }
        Ok(stored)
    }

    /// Secondary chats regain their parent answer in session state.
    async fn initial_state(&self, chat: &Chat) -> Result<SessionState, ChatError> {
        let mut state = SessionState::new();
        if chat.chat_type != ChatType::Secondary {
            return Ok(state);
        }
        if let (Some(parent_chat_id), Some(parent_message_id)) =
            (chat.parent_chat_id, chat.parent_message_id)
        {
            if let Some(parent) = self
                .repo
                .get_message_in_chat(parent_chat_id, parent_message_id)
                .await?
            {
                state.insert(
                    PARENT_ANSWER_STATE_KEY.to_string(),
                    Value::String(parent.content),
                );
            }
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkline_types::chat::NewChat;
    use forkline_types::config::AgentConfig;

    use crate::agent::session_bridge::SessionBridge;
    use crate::chat::fork::ForkManager;
    use crate::testing::{
        InMemoryChatRepository, InMemorySessionStore, Script, ScriptedFactory, StubBridge,
    };

    struct Fixture {
        pipeline: MessagePipeline<InMemoryChatRepository, StubBridge>,
        repo: Arc<InMemoryChatRepository>,
        bridge: Arc<StubBridge>,
        metrics: Arc<CallMetrics>,
    }

    fn fixture(bridge: StubBridge) -> Fixture {
        let repo = Arc::new(InMemoryChatRepository::default());
        let bridge = Arc::new(bridge);
        let metrics = Arc::new(CallMetrics::new());
        let pipeline = MessagePipeline::new(
            Arc::clone(&repo),
            Arc::clone(&bridge),
            Arc::clone(&metrics),
            "user",
        );
        Fixture {
            pipeline,
            repo,
            bridge,
            metrics,
        }
    }

    async fn primary(repo: &InMemoryChatRepository, session: Option<&str>) -> ChatId {
        repo.create_chat(&NewChat::primary(session.map(str::to_string)))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_hello_yields_user_then_assistant() {
        let f = fixture(StubBridge::replying("Hi! How can I help?"));
        let chat_id = primary(&f.repo, Some("s1")).await;

        let detail = f
            .pipeline
            .post_message(chat_id, "Hello", &Credential::new("key"))
            .await
            .unwrap();

        assert_eq!(detail.messages.len(), 2);
        assert_eq!(detail.messages[0].role, MessageRole::User);
        assert_eq!(detail.messages[0].content, "Hello");
        assert_eq!(detail.messages[1].role, MessageRole::Assistant);
        assert!(!detail.messages[1].content.is_empty());
        assert_eq!(f.metrics.get("primary_messages"), 1);
        assert_eq!(f.metrics.get("primary_agent_calls"), 1);
    }

    #[tokio::test]
    async fn test_bridge_receives_exact_turn() {
        let f = fixture(StubBridge::replying("ok"));
        let chat_id = primary(&f.repo, Some("s1")).await;

        f.pipeline
            .post_message(chat_id, "  spaced text ", &Credential::new("key-a"))
            .await
            .unwrap();

        let turns = f.bridge.turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].session_id, "s1");
        assert_eq!(turns[0].text, "  spaced text ");
        assert_eq!(turns[0].history_len, 1);
        assert_eq!(turns[0].credential, "key-a");
    }

    #[tokio::test]
    async fn test_missing_chat_is_not_found() {
        let f = fixture(StubBridge::replying("ok"));
        let err = f
            .pipeline
            .post_message(999, "Hello", &Credential::new("key"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ChatNotFound(999)));
        assert!(f.bridge.turns().is_empty());
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected_before_any_write() {
        let f = fixture(StubBridge::replying("ok"));
        let chat_id = primary(&f.repo, Some("s1")).await;

        let err = f
            .pipeline
            .post_message(chat_id, "   ", &Credential::new("key"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));

        let err = f
            .pipeline
            .post_message(chat_id, "Hello", &Credential::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));

        assert!(f.repo.get_messages(chat_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_agent_call_keeps_user_message() {
        let f = fixture(StubBridge::failing());
        let chat_id = primary(&f.repo, Some("s1")).await;

        let err = f
            .pipeline
            .post_message(chat_id, "Hello", &Credential::new("key"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Upstream(_)));

        let messages = f.repo.get_messages(chat_id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(f.metrics.get("primary_agent_errors"), 1);
    }

    #[tokio::test]
    async fn test_legacy_chat_gets_session_backfilled_once() {
        for legacy in [None, Some("")] {
            let f = fixture(StubBridge::replying("ok"));
            let chat_id = primary(&f.repo, legacy).await;
            let key = Credential::new("key");

            f.pipeline.post_message(chat_id, "one", &key).await.unwrap();
            f.pipeline.post_message(chat_id, "two", &key).await.unwrap();

            let created = f.bridge.created_sessions();
            assert_eq!(created.len(), 1);
            let chat = f.repo.get_chat(chat_id).await.unwrap().unwrap();
            assert_eq!(chat.agent_session_id.as_deref(), Some(created[0].0.as_str()));

            let turns = f.bridge.turns();
            assert!(turns.iter().all(|t| t.session_id == created[0].0));
            assert_eq!(f.metrics.get("sessions_backfilled"), 1);
        }
    }

    #[tokio::test]
    async fn test_secondary_backfill_restores_parent_answer() {
        let f = fixture(StubBridge::replying("ok"));
        let parent_id = primary(&f.repo, Some("p")).await;
        let answer = f
            .repo
            .save_message(parent_id, MessageRole::Assistant, "original answer")
            .await
            .unwrap();
        let fork = f
            .repo
            .create_chat(&NewChat {
                chat_type: ChatType::Secondary,
                parent_chat_id: Some(parent_id),
                parent_message_id: Some(answer.id),
                agent_session_id: None,
                title: None,
            })
            .await
            .unwrap();

        f.pipeline
            .post_message(fork.id, "Why?", &Credential::new("key"))
            .await
            .unwrap();

        let (_, chat_type, state) = &f.bridge.created_sessions()[0];
        assert_eq!(*chat_type, ChatType::Secondary);
        assert_eq!(
            state.get(PARENT_ANSWER_STATE_KEY),
            Some(&Value::String("original answer".into()))
        );
        assert_eq!(f.metrics.get("secondary_messages"), 1);
    }

    #[tokio::test]
    async fn test_fork_then_follow_up_with_session_bridge() {
        let repo = Arc::new(InMemoryChatRepository::default());
        let factory = ScriptedFactory::new(Script::Reply("Step 1: ...".into()));
        let bridge = Arc::new(SessionBridge::new(
            InMemorySessionStore::default(),
            factory.clone(),
            AgentConfig::default(),
        ));
        let metrics = Arc::new(CallMetrics::new());
        let pipeline = MessagePipeline::new(
            Arc::clone(&repo),
            Arc::clone(&bridge),
            Arc::clone(&metrics),
            "user",
        );
        let forks = ForkManager::new(
            Arc::clone(&repo),
            Arc::clone(&bridge),
            Arc::clone(&metrics),
            "user",
        );
        let key = Credential::new("key");

        let parent = primary(&repo, None).await;
        let first = pipeline.post_message(parent, "What is a monad?", &key).await.unwrap();
        let answer = &first.messages[1];

        let fork = forks.fork(parent, answer.id, &key).await.unwrap();
        let followed = pipeline
            .post_message(fork.chat.id, "Simpler please", &key)
            .await
            .unwrap();

        let roles: Vec<MessageRole> = followed.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant
            ]
        );

        let last = factory.requests().pop().unwrap();
        assert!(last.system.unwrap().contains("Step 1: ..."));
        assert_eq!(last.messages.len(), 1);
        assert_eq!(last.messages[0].content, "Simpler please");
    }

    #[tokio::test]
    async fn test_changed_user_id_cannot_reach_existing_session() {
        let repo = Arc::new(InMemoryChatRepository::default());
        let bridge = Arc::new(SessionBridge::new(
            InMemorySessionStore::default(),
            ScriptedFactory::new(Script::Reply("ok".into())),
            AgentConfig::default(),
        ));
        let metrics = Arc::new(CallMetrics::new());
        let key = Credential::new("key");

        let before = MessagePipeline::new(
            Arc::clone(&repo),
            Arc::clone(&bridge),
            Arc::clone(&metrics),
            "alice",
        );
        let chat_id = primary(&repo, None).await;
        before.post_message(chat_id, "Hello", &key).await.unwrap();

        let after = MessagePipeline::new(
            Arc::clone(&repo),
            Arc::clone(&bridge),
            Arc::clone(&metrics),
            "bob",
        );
        let err = after.post_message(chat_id, "Again", &key).await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Upstream(AgentError::SessionNotFound(_))
        ));
        assert_eq!(metrics.get("primary_agent_errors"), 1);

        // The chat keeps its binding; restoring the old user id recovers it.
        let detail = before.post_message(chat_id, "Back", &key).await.unwrap();
        assert_eq!(detail.messages.len(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_callers_keep_their_own_credentials() {
        let repo = Arc::new(InMemoryChatRepository::default());
        let factory = ScriptedFactory::new(Script::EchoCredential);
        let bridge = Arc::new(SessionBridge::new(
            InMemorySessionStore::default(),
            factory.clone(),
            AgentConfig::default(),
        ));
        let pipeline = Arc::new(MessagePipeline::new(
            Arc::clone(&repo),
            bridge,
            Arc::new(CallMetrics::new()),
            "user",
        ));

        let mut handles = Vec::new();
        for i in 0..8 {
            let chat_id = primary(&repo, None).await;
            let pipeline = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                let key = format!("key-{i}");
                let detail = pipeline
                    .post_message(chat_id, "hi", &Credential::new(key.clone()))
                    .await
                    .unwrap();
                (key, detail.messages[1].content.clone())
            }));
        }

        for handle in handles {
            let (key, reply) = handle.await.unwrap();
            assert_eq!(reply, key);
        }
        assert_eq!(factory.seen_credentials().len(), 8);
    }
}
