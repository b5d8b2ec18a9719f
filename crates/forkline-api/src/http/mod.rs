//! HTTP/REST API layer for Forkline.
//!
//! Axum-based REST API under `/chats` with per-request end-user
//! credentials. Success bodies are bare JSON; errors carry a small envelope.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
