use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod db;
mod llm;
mod metadata;
mod query;
mod reporting;
mod store;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::db_pool::build_pool;
use crate::db::migrations;
use crate::llm::LlmManager;
use crate::metadata::{CsvDictionary, DictionaryCache, DictionarySource, GlossaryClient};
use crate::query::QueryOrchestrator;
use crate::reporting::{DuckDbReporting, ReportingDatabase};
use crate::store::{ConfigStore, MetricsStore};
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // A missing .env is fine; real deployments export variables directly
    let dotenv = dotenvy::dotenv();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&AppConfig::default().logging);
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize logging
    init_tracing(&config.logging);
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    info!("Opening document store at {}", config.store.connection_string);
    let store_pool = build_pool(&config.store.connection_string, config.store.pool_size)?;
    migrations::run(&*store_pool.get()?)?;

    info!("Opening reporting database at {}", config.reporting.connection_string);
    let reporting_pool = build_pool(&config.reporting.connection_string, config.reporting.pool_size)?;
    let reporting: Arc<dyn ReportingDatabase> = Arc::new(DuckDbReporting::new(reporting_pool));

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = LlmManager::new(&config.llm)?;

    let source: Arc<dyn DictionarySource> = match &config.metadata.dictionary_csv {
        Some(path) => Arc::new(CsvDictionary::from_path(path)?),
        None => {
            if config.metadata.host.is_none() {
                warn!("No default metadata host configured; configs must set om_host");
            }
            Arc::new(GlossaryClient::new(&config.metadata, Arc::clone(&reporting))?)
        }
    };
    let dictionary = Arc::new(DictionaryCache::new(source, &config.cache));

    let configs = ConfigStore::new(store_pool.clone());
    let metrics = MetricsStore::new(store_pool);
    let orchestrator = QueryOrchestrator::new(
        configs.clone(),
        metrics.clone(),
        dictionary,
        Arc::new(llm_manager),
        reporting,
        &config,
    );
    let app_state = Arc::new(AppState::new(configs, metrics, orchestrator));

    // Start the web server
    info!("Starting Tafsiri server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
