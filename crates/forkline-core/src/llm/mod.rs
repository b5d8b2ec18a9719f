//! LLM provider abstractions for Forkline.
//!
//! - `LlmProvider`: object-safe trait for concrete provider implementations
//! - `BoxLlmProvider`: owned, type-erased provider
//! - `ProviderFactory`: builds a provider bound to a per-request credential

pub mod box_provider;
pub mod factory;
pub mod provider;
