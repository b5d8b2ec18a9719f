//! Agent session bridge.
//!
//! Maps persisted chats onto agent-runtime conversations:
//! - `AgentBridge`: the `(chat_type, turn) -> reply` contract the pipeline uses
//! - `SessionBridge`: stateful mode, history kept in an `AgentSessionStore`
//! - `TranscriptBridge`: stateless mode, history replayed from the chat
//! - `Persona`: per-chat-type instruction templates
//! - `Credential`: the caller's provider key, scoped to one call

pub mod box_bridge;
pub mod bridge;
pub mod credential;
pub mod persona;
pub mod reply;
pub mod session_bridge;
pub mod session_store;
pub mod transcript;
