use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};

use super::table_selector;
use crate::config::AppConfig;
use crate::db::record_id::{InvalidRecordId, RecordId};
use crate::llm::models::SqlGenerationInput;
use crate::llm::{LlmError, SqlGenerator};
use crate::metadata::{DictionaryCache, MetadataAccess, MetadataError};
use crate::reporting::{ReportingDatabase, ReportingError, ResultRow};
use crate::store::{ConfigStore, MetricsStore, NewQueryResponse, StoreError, TafsiriConfig};

/// Number of ranked tables handed to prompt construction.
const TOP_K: usize = 2;

/// Failure of an external step once a config has been resolved.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config has no tables to query")]
    NoTables,

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Generation(#[from] LlmError),

    #[error(transparent)]
    Execution(#[from] ReportingError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    InvalidId(#[from] InvalidRecordId),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The attempt was recorded under `saved_response_id` before failing.
    #[error("{source}")]
    Pipeline {
        source: PipelineError,
        sql_query: Option<String>,
        saved_response_id: RecordId,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub sql_query: Option<String>,
    pub data: Vec<ResultRow>,
    pub time_taken: f64,
    pub saved_response_id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDescription {
    pub table_name: String,
    pub description: String,
}

pub struct QueryOrchestrator {
    configs: ConfigStore,
    metrics: MetricsStore,
    dictionary: Arc<DictionaryCache>,
    generator: Arc<dyn SqlGenerator>,
    reporting: Arc<dyn ReportingDatabase>,
    default_host: Option<String>,
    default_token: Option<String>,
    degrade_on_failure: bool,
}

impl QueryOrchestrator {
    pub fn new(
        configs: ConfigStore,
        metrics: MetricsStore,
        dictionary: Arc<DictionaryCache>,
        generator: Arc<dyn SqlGenerator>,
        reporting: Arc<dyn ReportingDatabase>,
        config: &AppConfig,
    ) -> Self {
        Self {
            configs,
            metrics,
            dictionary,
            generator,
            reporting,
            default_host: config.metadata.host.clone(),
            default_token: config.metadata.token.clone(),
            degrade_on_failure: config.query.degrade_on_failure,
        }
    }

    /// Answers `question` against the tables of config `config_id`.
    ///
    /// Every call that resolves its config appends exactly one metrics record,
    /// whether or not the pipeline succeeds.
    pub async fn answer(
        &self,
        question: &str,
        user_id: Option<&str>,
        config_id: &str,
    ) -> Result<QueryOutcome, QueryError> {
        let config_id = RecordId::parse(config_id)?;
        if question.trim().is_empty() {
            return Err(QueryError::Validation("question must not be empty".to_string()));
        }
        let config = self.configs.get(config_id).await?;

        let start_time = Instant::now();
        let created_by = user_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        let mut sql_query = None;
        match self.run_pipeline(question, &config, &mut sql_query).await {
            Ok(data) => {
                let time_taken = start_time.elapsed().as_secs_f64();
                let saved_response_id = self
                    .metrics
                    .append(NewQueryResponse {
                        question: question.to_string(),
                        response: sql_query.clone(),
                        time_taken_secs: time_taken,
                        created_by,
                        is_valid: true,
                    })
                    .await?;

                info!(
                    "Answered question for config {} in {:.3}s ({} rows)",
                    config.id,
                    time_taken,
                    data.len()
                );
                Ok(QueryOutcome {
                    sql_query,
                    data,
                    time_taken,
                    saved_response_id,
                })
            }
            Err(source) => {
                error!("Error processing query for config {}: {}", config.id, source);
                let saved_response_id = self
                    .metrics
                    .append(NewQueryResponse {
                        question: question.to_string(),
                        response: sql_query.clone(),
                        time_taken_secs: 0.0,
                        created_by,
                        is_valid: false,
                    })
                    .await?;

                if self.degrade_on_failure {
                    return Ok(QueryOutcome {
                        sql_query,
                        data: Vec::new(),
                        time_taken: 0.0,
                        saved_response_id,
                    });
                }
                Err(QueryError::Pipeline {
                    source,
                    sql_query,
                    saved_response_id,
                })
            }
        }
    }

    /// Dictionary context of every table in config `config_id`.
    pub async fn describe_tables(&self, config_id: &str) -> Result<Vec<TableDescription>, QueryError> {
        let config_id = RecordId::parse(config_id)?;
        let config = self.configs.get(config_id).await?;
        let access = self.access_for(&config);

        let schemas = self.dictionary.table_schemas(&config.tables, &access).await?;
        Ok(schemas
            .iter()
            .map(|schema| TableDescription {
                table_name: schema.table_name.clone(),
                description: schema.context_str.clone(),
            })
            .collect())
    }

    /// `sql_query` is filled in as soon as generation succeeds so that a
    /// failed execution can still be recorded with its SQL.
    async fn run_pipeline(
        &self,
        question: &str,
        config: &TafsiriConfig,
        sql_query: &mut Option<String>,
    ) -> Result<Vec<ResultRow>, PipelineError> {
        if config.tables.is_empty() {
            return Err(PipelineError::NoTables);
        }

        let access = self.access_for(config);
        let schemas = self.dictionary.table_schemas(&config.tables, &access).await?;

        let mut ranked = table_selector::select_tables(question, &schemas, TOP_K).into_iter();
        let primary = ranked.next().ok_or(PipelineError::NoTables)?;
        let runner_up = ranked.next();
        info!("First identified table: {}", primary.table_name);

        let join_with = match runner_up {
            Some(second) if config.join_tables.contains(&primary.table_name) => {
                info!("Join with table: {}", second.table_name);
                Some(second)
            }
            _ => None,
        };

        let input = SqlGenerationInput {
            question: question.to_string(),
            example_prompt: config.example_prompt.clone(),
            primary,
            join_with,
        };
        let sql = self.generator.generate_sql(&input).await?;
        debug!("Generated SQL query: {}", sql);
        *sql_query = Some(sql.clone());

        Ok(self.reporting.execute(&sql).await?)
    }

    /// The config's metadata host and token, falling back to the server defaults.
    fn access_for(&self, config: &TafsiriConfig) -> MetadataAccess {
        let host = non_blank(&config.om_host).or_else(|| non_blank(&self.default_host));
        let token = non_blank(&config.om_jwt)
            .or_else(|| non_blank(&self.default_token))
            .unwrap_or_default();

        MetadataAccess { host, token }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
