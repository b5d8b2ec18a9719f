//! REST API handler modules.

pub mod chat;
pub mod metrics;
