use std::sync::Arc;

use concierge_agent::llm::{ChatModel, DeepSeekClient, LlmError};
use concierge_agent::{
    CatalogToolExecutor, ChatOrchestrator, PromptAssembler, SideEffectQueue,
};
use concierge_core::config::{AppConfig, ConfigError, LoadOptions};
use concierge_db::repositories::{
    SqlBookingRepository, SqlCatalogRepository, SqlClientProfileRepository,
    SqlConversationMemoryRepository, SqlQuoteRepository,
};
use concierge_db::{connect_with_config, migrations, DbPool};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub side_effect_worker: JoinHandle<()>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("model client setup failed: {0}")]
    ModelClient(#[source] LlmError),
}

#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let model = DeepSeekClient::from_config(&config.llm)
        .map_err(BootstrapError::ModelClient)?
        .map(|client| Arc::new(client) as Arc<dyn ChatModel>);
    if model.is_none() {
        warn!(
            event_name = "system.bootstrap.model_unconfigured",
            correlation_id = "bootstrap",
            "no DeepSeek API key configured, chat requests will be rejected"
        );
    }

    let profiles = Arc::new(SqlClientProfileRepository::new(db_pool.clone()));
    let memory = Arc::new(SqlConversationMemoryRepository::new(db_pool.clone()));
    let (side_effects, side_effect_worker) = SideEffectQueue::spawn(
        profiles.clone(),
        memory.clone(),
        config.agent.side_effect_queue_capacity,
    );
    let executor = CatalogToolExecutor::new(
        Arc::new(SqlCatalogRepository::new(db_pool.clone())),
        Arc::new(SqlQuoteRepository::new(db_pool.clone())),
        Arc::new(SqlBookingRepository::new(db_pool.clone())),
    );
    let prompts = PromptAssembler::new(profiles, memory, config.agent.memory_window);
    let orchestrator = ChatOrchestrator::new(model, Arc::new(executor), prompts, side_effects)
        .with_max_round_trips(config.agent.max_tool_round_trips);

    Ok(Application {
        config,
        db_pool,
        orchestrator: Arc::new(orchestrator),
        side_effect_worker,
    })
}
