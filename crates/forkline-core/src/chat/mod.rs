//! Chats, forks, and the message pipeline.
//!
//! - `ChatRepository`: persistence port for chats and messages
//! - `ChatService`: primary chat creation and reads
//! - `ForkManager`: idempotent secondary chat derivation
//! - `MessagePipeline`: advance any chat by one user turn

pub mod fork;
pub mod pipeline;
pub mod repository;
pub mod service;
