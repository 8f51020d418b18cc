use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use dealscope_agents::auth::AuthError;
use dealscope_agents::benchmark::BenchmarkAgent;
use dealscope_agents::critique::CritiqueAgent;
use dealscope_agents::gateway::{HttpLlmGateway, LlmGateway};
use dealscope_agents::ingestion::{IngestionAgent, PdftotextExtractor};
use dealscope_agents::narrative::NarrativeAgent;
use dealscope_agents::orchestrator::Orchestrator;
use dealscope_agents::report::{ReportAgent, ReportStore};
use dealscope_agents::scoring::ScoringAgent;
use dealscope_core::config::{AppConfig, ConfigError, LoadOptions, ProviderSelection};
use dealscope_db::{
    connect, migrations, CritiqueLogStore, NarrativeCache, SqlCritiqueLog, SqlNarrativeCache,
};

use crate::ratelimit::RateLimiter;
use crate::routes::{AppState, RuntimeSummary};

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("store connection failed: {0}")]
    StoreConnect(#[source] sqlx::Error),
    #[error("store migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;

    let gateway: Arc<dyn LlmGateway> = Arc::new(HttpLlmGateway::from_config(&config.llm)?);
    let provider = match config.llm.provider() {
        ProviderSelection::ProjectScoped { .. } => "project_scoped",
        ProviderSelection::ApiKey => "api_key",
        ProviderSelection::None => "none",
    };
    info!(provider, "llm gateway configured");

    let cache: Option<Arc<dyn NarrativeCache>> = match &config.cache.url {
        Some(url) => {
            let pool = connect(url).await.map_err(BootstrapError::StoreConnect)?;
            migrations::run_pending(&pool).await.map_err(BootstrapError::Migration)?;
            info!(url = %url, "narrative cache connected");
            Some(Arc::new(SqlNarrativeCache::new(pool)))
        }
        None => {
            info!("CACHE_URL not set, narrative caching disabled");
            None
        }
    };

    let critique_log: Option<Arc<dyn CritiqueLogStore>> = match &config.critique_log.url {
        Some(url) => {
            let pool = connect(url).await.map_err(BootstrapError::StoreConnect)?;
            migrations::run_pending(&pool).await.map_err(BootstrapError::Migration)?;
            info!(url = %url, "critique log connected");
            Some(Arc::new(SqlCritiqueLog::new(pool)))
        }
        None => {
            info!("CRITIQUE_LOG_URL not set, critique logging disabled");
            None
        }
    };

    let extractor = Arc::new(PdftotextExtractor::default());
    let report_store = Arc::new(ReportStore::new());
    let ttl = Duration::from_secs(config.cache.ttl_secs);

    let report_agent = ReportAgent::new(report_store.clone());
    let pdf_converter =
        if which::which("wkhtmltopdf").is_ok() { "wkhtmltopdf" } else { "builtin" };

    let orchestrator = Orchestrator::new(
        IngestionAgent::new(gateway.clone(), extractor.clone()),
        ScoringAgent::new(gateway.clone()),
        CritiqueAgent::new(gateway.clone(), critique_log.clone()),
        NarrativeAgent::new(gateway.clone(), cache.clone(), ttl),
        BenchmarkAgent::new(Some(gateway.clone())),
        report_agent,
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        ingestion: Arc::new(IngestionAgent::new(gateway.clone(), extractor)),
        scoring: Arc::new(ScoringAgent::new(gateway.clone())),
        critique: Arc::new(CritiqueAgent::new(gateway.clone(), critique_log.clone())),
        narrative: Arc::new(NarrativeAgent::new(gateway, cache.clone(), ttl)),
        report_store,
        rate_limiter: config
            .server
            .rate_limit
            .map(|rate_limit| Arc::new(RateLimiter::new(rate_limit))),
        runtime_summary: RuntimeSummary {
            provider,
            cache_configured: cache.is_some(),
            critique_log_configured: critique_log.is_some(),
            pdf_converter,
        },
    };

    Ok(Application { config, state })
}
