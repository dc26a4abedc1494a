use chrono::{DateTime, Utc};

use crate::query::QueryOrchestrator;
use crate::store::{ConfigStore, MetricsStore};

/// Shared application state for the web server
pub struct AppState {
    pub configs: ConfigStore,
    pub metrics: MetricsStore,
    pub orchestrator: QueryOrchestrator,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(configs: ConfigStore, metrics: MetricsStore, orchestrator: QueryOrchestrator) -> Self {
        Self {
            configs,
            metrics,
            orchestrator,
            startup_time: Utc::now(),
        }
    }
}
