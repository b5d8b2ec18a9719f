//! Per-call provider construction.
//!
//! Credentials arrive with each end-user request, so providers are not
//! long-lived singletons: the bridge asks a `ProviderFactory` for a provider
//! bound to the caller's credential and drops it when the call returns.
//! Nothing process-wide is mutated, which keeps concurrent calls carrying
//! different credentials isolated from each other.

use forkline_types::llm::LlmError;

use crate::agent::credential::Credential;
use crate::llm::box_provider::BoxLlmProvider;

/// Builds a provider bound to one credential.
pub trait ProviderFactory: Send + Sync {
    /// Provider name reported in logs and span attributes.
    fn provider_name(&self) -> &str;

    /// Model identifier requests are issued against.
    fn model(&self) -> &str;

    /// Construct a provider that authenticates with `credential`.
    fn build(&self, credential: &Credential) -> Result<BoxLlmProvider, LlmError>;
}
