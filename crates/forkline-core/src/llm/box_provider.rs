//! BoxLlmProvider -- owned, type-erased LlmProvider.

use std::pin::Pin;

use futures_util::Stream;

use forkline_types::llm::{CompletionRequest, LlmError, ProviderCapabilities, StreamEvent};

use super::provider::LlmProvider;

/// Type-erased LLM provider.
///
/// `ProviderFactory` hands these out per call so the concrete backend can be
/// chosen from configuration at runtime.
pub struct BoxLlmProvider {
    inner: Box<dyn LlmProvider>,
}

impl BoxLlmProvider {
    /// Wrap a concrete `LlmProvider` in a type-erased box.
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    /// Human-readable provider name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// What this provider supports.
    pub fn capabilities(&self) -> &ProviderCapabilities {
        self.inner.capabilities()
    }

    /// Send a streaming completion request. Returns a stream of events.
    pub fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        self.inner.stream(request)
    }
}
