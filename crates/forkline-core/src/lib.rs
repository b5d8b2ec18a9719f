//! Business logic and port traits for Forkline.
//!
//! This crate defines the "ports" (repository, session store, provider and
//! bridge traits) that the infrastructure layer implements, plus the chat
//! logic built on them. It depends on `forkline-types` and the span attribute
//! names in `forkline-observe` -- never on `forkline-infra` or any
//! database/IO crate.

pub mod agent;
pub mod chat;
pub mod llm;
pub mod metrics;

#[cfg(test)]
pub(crate) mod testing;
