//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository/bridge traits, but AppState pins them
//! to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use forkline_core::agent::box_bridge::BoxAgentBridge;
use forkline_core::agent::session_bridge::SessionBridge;
use forkline_core::agent::transcript::TranscriptBridge;
use forkline_core::chat::fork::ForkManager;
use forkline_core::chat::pipeline::MessagePipeline;
use forkline_core::chat::service::ChatService;
use forkline_core::metrics::CallMetrics;
use forkline_infra::config::{default_config_path, load_config, resolve_data_dir};
use forkline_infra::llm::OpenAiCompatFactory;
use forkline_infra::sqlite::agent_session::SqliteAgentSessionStore;
use forkline_infra::sqlite::chat::SqliteChatRepository;
use forkline_infra::sqlite::pool::{DatabasePool, default_database_url};
use forkline_types::agent::AgentMode;
use forkline_types::config::{AgentConfig, ForklineConfig};

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteChatService = ChatService<SqliteChatRepository, BoxAgentBridge>;
pub type ConcreteForkManager = ForkManager<SqliteChatRepository, BoxAgentBridge>;
pub type ConcreteMessagePipeline = MessagePipeline<SqliteChatRepository, BoxAgentBridge>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub fork_manager: Arc<ConcreteForkManager>,
    pub pipeline: Arc<ConcreteMessagePipeline>,
    pub metrics: Arc<CallMetrics>,
    pub config: Arc<ForklineConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    ///
    /// `config_path` overrides `{data_dir}/config.toml`.
    pub async fn init(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let config_path = config_path.unwrap_or_else(|| default_config_path(&data_dir));
        let config = load_config(&config_path).await;

        let db_url = config
            .database
            .url
            .clone()
            .unwrap_or_else(|| default_database_url(&data_dir));
        let db_pool = DatabasePool::new(&db_url)
            .await
            .with_context(|| format!("failed to open database {db_url}"))?;

        Self::from_parts(db_pool, config, data_dir)
    }

    /// Wire services over an already-open pool.
    pub fn from_parts(
        db_pool: DatabasePool,
        config: ForklineConfig,
        data_dir: PathBuf,
    ) -> anyhow::Result<Self> {
        let bridge = build_bridge(&db_pool, &config.agent)?;

        tracing::info!(
            mode = %config.agent.mode,
            provider = %config.agent.provider,
            model = %config.agent.model,
            "Agent bridge configured"
        );

        Ok(Self::with_bridge(db_pool, bridge, config, data_dir))
    }

    /// Wire services over an already-open pool and bridge.
    pub fn with_bridge(
        db_pool: DatabasePool,
        bridge: BoxAgentBridge,
        config: ForklineConfig,
        data_dir: PathBuf,
    ) -> Self {
        let repo = Arc::new(SqliteChatRepository::new(db_pool));
        let bridge = Arc::new(bridge);
        let metrics = Arc::new(CallMetrics::new());
        let user_id = config.agent.user_id.clone();

        Self {
            chat_service: Arc::new(ChatService::new(
                repo.clone(),
                bridge.clone(),
                metrics.clone(),
                user_id.clone(),
            )),
            fork_manager: Arc::new(ForkManager::new(
                repo.clone(),
                bridge.clone(),
                metrics.clone(),
                user_id.clone(),
            )),
            pipeline: Arc::new(MessagePipeline::new(repo, bridge, metrics.clone(), user_id)),
            metrics,
            config: Arc::new(config),
            data_dir,
        }
    }
}

/// Pick the bridge implementation for the configured agent mode.
fn build_bridge(db_pool: &DatabasePool, agent: &AgentConfig) -> anyhow::Result<BoxAgentBridge> {
    let factory = OpenAiCompatFactory::from_config(agent)
        .context("invalid [agent] provider configuration")?;

    let bridge = match agent.mode {
        AgentMode::Stateful => BoxAgentBridge::new(SessionBridge::new(
            SqliteAgentSessionStore::new(db_pool.clone()),
            factory,
            agent.clone(),
        )),
        AgentMode::Stateless => BoxAgentBridge::new(TranscriptBridge::new(factory, agent.clone())),
    };

    Ok(bridge)
}
