//! LLM provider implementations.
//!
//! Contains the OpenAI-compatible implementation of the [`LlmProvider`]
//! trait defined in `forkline-core`, and [`OpenAiCompatFactory`], which
//! builds a provider bound to the caller's credential for each agent call.
//!
//! [`LlmProvider`]: forkline_core::llm::provider::LlmProvider

pub mod openai_compat;

use secrecy::SecretString;

use forkline_core::agent::credential::Credential;
use forkline_core::llm::box_provider::BoxLlmProvider;
use forkline_core::llm::factory::ProviderFactory;
use forkline_types::config::AgentConfig;
use forkline_types::llm::{LlmError, ProviderType};

use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::{self as compat_config, OpenAiCompatConfig};

/// Builds an [`OpenAiCompatibleProvider`] per call from the agent config.
///
/// Holds no key material: every `build` takes the credential that arrived
/// with the request.
#[derive(Debug, Clone)]
pub struct OpenAiCompatFactory {
    provider: ProviderType,
    provider_name: String,
    model: String,
    base_url: Option<String>,
}

impl OpenAiCompatFactory {
    /// Create a factory from the `[agent]` config section.
    ///
    /// # Errors
    ///
    /// `openai_compatible` requires an explicit `base_url`.
    pub fn from_config(config: &AgentConfig) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        if config.provider == ProviderType::OpenAiCompatible && base_url.is_none() {
            return Err(LlmError::InvalidRequest(
                "provider 'openai_compatible' requires agent.base_url".to_string(),
            ));
        }

        Ok(Self {
            provider: config.provider,
            provider_name: config.provider.to_string(),
            model: config.model.clone(),
            base_url,
        })
    }

    fn provider_config(&self, api_key: SecretString) -> OpenAiCompatConfig {
        let mut config = match self.provider {
            ProviderType::Gemini => compat_config::gemini_defaults(api_key, &self.model),
            ProviderType::OpenAi => compat_config::openai_defaults(api_key, &self.model),
            ProviderType::OpenAiCompatible => compat_config::custom_defaults(
                self.base_url.as_deref().unwrap_or_default(),
                api_key,
                &self.model,
            ),
        };

        if let Some(ref base_url) = self.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config
    }
}

impl ProviderFactory for OpenAiCompatFactory {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn build(&self, credential: &Credential) -> Result<BoxLlmProvider, LlmError> {
        if credential.is_blank() {
            return Err(LlmError::AuthenticationFailed);
        }

        let api_key = SecretString::from(credential.expose().to_string());
        let provider = OpenAiCompatibleProvider::new(self.provider_config(api_key));

        tracing::debug!(
            provider = %self.provider_name,
            model = %self.model,
            "built provider for call"
        );

        Ok(BoxLlmProvider::new(provider))
    }
}
