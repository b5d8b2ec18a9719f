//! Global configuration types for Forkline.
//!
//! `ForklineConfig` represents the top-level `config.toml` controlling the
//! HTTP listener, database location, agent runtime, and observability.

use serde::{Deserialize, Serialize};

use crate::agent::AgentMode;
use crate::llm::ProviderType;

/// Top-level configuration.
///
/// Loaded from `~/.forkline/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForklineConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database location. `url = None` means `{data_dir}/forkline.db`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
}

/// Agent runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub mode: AgentMode,

    #[serde(default)]
    pub provider: ProviderType,

    #[serde(default = "default_model")]
    pub model: String,

    /// Override the provider's default base URL.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Application name recorded on every agent session.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// User id sessions are created under.
    ///
    /// Sessions are only reachable by the user id that created them. Changing
    /// this value makes every existing chat's turns fail until it is restored.
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f64 {
    0.7
}

fn default_app_name() -> String {
    "forkline".to_string()
}

fn default_user_id() -> String {
    "user".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mode: AgentMode::default(),
            provider: ProviderType::default(),
            model: default_model(),
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            app_name: default_app_name(),
            user_id: default_user_id(),
        }
    }
}

/// Tracing export settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Bridge tracing spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}
