//! AgentSessionStore trait definition.
//!
//! Backing store for stateful agent sessions: key-value state plus an
//! append-only event history. Follows the same RPITIT pattern as
//! `ChatRepository`.

use forkline_types::agent::{AgentSession, SessionEvent, SessionState};
use forkline_types::error::RepositoryError;
use forkline_types::llm::MessageRole;

/// Repository trait for agent session persistence.
///
/// Implementations live in forkline-infra (e.g., `SqliteAgentSessionStore`).
pub trait AgentSessionStore: Send + Sync {
    /// Allocate a new session with the given initial state.
    fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        state: SessionState,
    ) -> impl std::future::Future<Output = Result<AgentSession, RepositoryError>> + Send;

    /// Get a session by id.
    fn get_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<AgentSession>, RepositoryError>> + Send;

    /// Append one event to a session's history.
    fn append_event(
        &self,
        session_id: &str,
        author: &str,
        role: MessageRole,
        content: &str,
    ) -> impl std::future::Future<Output = Result<SessionEvent, RepositoryError>> + Send;

    /// All events of a session, oldest first.
    fn list_events(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<SessionEvent>, RepositoryError>> + Send;
}
