//! Shared domain types for Forkline.
//!
//! This crate contains the core domain types used across the workspace:
//! chats, messages, agent sessions, LLM request/response shapes, global
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
