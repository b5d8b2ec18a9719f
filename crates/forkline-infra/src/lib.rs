//! Infrastructure layer for Forkline.
//!
//! Contains implementations of the ports defined in `forkline-core`:
//! SQLite storage for chats and agent sessions, the OpenAI-compatible
//! LLM provider with its per-credential factory, and the config loader.

pub mod config;
pub mod llm;
pub mod sqlite;
