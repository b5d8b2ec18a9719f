//! ChatRepository trait definition.
//!
//! Provides persistence for chats and their messages. Follows the same
//! RPITIT pattern as `AgentSessionStore`.

use forkline_types::chat::{
    Chat, ChatId, ChatMessage, ChatType, ForkOutcome, MessageId, MessageRole, NewChat, NewFork,
};
use forkline_types::error::RepositoryError;

/// Repository trait for chat and message persistence.
///
/// Implementations live in forkline-infra (e.g., `SqliteChatRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatRepository: Send + Sync {
    /// Insert a new chat row.
    fn create_chat(
        &self,
        chat: &NewChat,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Get a chat by id.
    fn get_chat(
        &self,
        chat_id: ChatId,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// List chats of one type, most recent first.
    fn list_chats(
        &self,
        chat_type: ChatType,
    ) -> impl std::future::Future<Output = Result<Vec<Chat>, RepositoryError>> + Send;

    /// Messages of a chat in insertion order.
    fn get_messages(
        &self,
        chat_id: ChatId,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// A message, only if it belongs to `chat_id`.
    fn get_message_in_chat(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send;

    /// The secondary chat forked from `parent_message_id`, if any.
    fn find_fork(
        &self,
        parent_message_id: MessageId,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// Append a message to a chat.
    fn save_message(
        &self,
        chat_id: ChatId,
        role: MessageRole,
        content: &str,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// Bump a chat's `updated_at` to now.
    fn touch_chat(
        &self,
        chat_id: ChatId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Bind an agent session to a chat that has none yet.
    ///
    /// The write is conditional: it only lands when the chat's session id is
    /// NULL or empty. Returns the session id stored after the attempt, which
    /// is somebody else's when a concurrent writer got there first.
    fn set_agent_session_if_absent(
        &self,
        chat_id: ChatId,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;

    /// Atomically write a secondary chat and both seed messages.
    ///
    /// Either all three rows are written or none are. When another writer
    /// already forked `fork.parent_message_id`, the existing chat is returned
    /// as `ForkOutcome::Existing`.
    fn create_fork(
        &self,
        fork: &NewFork,
    ) -> impl std::future::Future<Output = Result<ForkOutcome, RepositoryError>> + Send;
}
