//! LlmProvider trait definition.
//!
//! This is the core abstraction that all model providers implement.
//! `stream` returns `Pin<Box<dyn Stream>>` so the trait stays object-safe
//! and can sit behind `BoxLlmProvider`.

use std::pin::Pin;

use futures_util::Stream;

use forkline_types::llm::{CompletionRequest, LlmError, ProviderCapabilities, StreamEvent};

/// Trait for LLM provider backends (Gemini, OpenAI, ...).
///
/// Implementations live in forkline-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "gemini", "openai").
    fn name(&self) -> &str;

    /// What this provider supports.
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a streaming completion request. Returns a stream of events
    /// terminated by [`StreamEvent::Done`] on success.
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;
}
