//! The reporting database that generated SQL runs against.

use arrow::error::ArrowError;
use arrow::json::writer::{JsonArray, WriterBuilder};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::db_pool::DuckDBPool;

/// One result row, column name to value.
pub type ResultRow = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("SQL execution failed: {0}")]
    Query(String),

    #[error("failed to convert query results: {0}")]
    Decode(String),

    #[error("reporting database unavailable: {0}")]
    Unavailable(String),
}

impl From<r2d2::Error> for ReportingError {
    fn from(err: r2d2::Error) -> Self {
        ReportingError::Unavailable(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ReportingError {
    fn from(err: tokio::task::JoinError) -> Self {
        ReportingError::Unavailable(format!("query task failed: {}", err))
    }
}

impl From<ArrowError> for ReportingError {
    fn from(err: ArrowError) -> Self {
        ReportingError::Decode(err.to_string())
    }
}

#[async_trait]
pub trait ReportingDatabase: Send + Sync {
    /// Runs a query and returns every row as a JSON object.
    async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>, ReportingError>;

    /// Column names of `table` in declaration order.
    async fn table_columns(&self, table: &str) -> Result<Vec<String>, ReportingError>;
}

pub struct DuckDbReporting {
    pool: DuckDBPool,
}

impl DuckDbReporting {
    pub fn new(pool: DuckDBPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportingDatabase for DuckDbReporting {
    async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>, ReportingError> {
        let pool = self.pool.clone();
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<ResultRow>, ReportingError> {
            let start_time = Instant::now();
            let conn = pool.get()?;

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| ReportingError::Query(e.to_string()))?;
            let batches: Vec<RecordBatch> = stmt
                .query_arrow([])
                .map_err(|e| ReportingError::Query(e.to_string()))?
                .collect();

            let rows = batches_to_rows(&batches)?;
            info!(
                "Query executed successfully. Row count: {}, Execution time: {}ms",
                rows.len(),
                start_time.elapsed().as_millis()
            );
            Ok(rows)
        })
        .await?
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>, ReportingError> {
        let pool = self.pool.clone();
        let table = table.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<String>, ReportingError> {
            let conn = pool.get()?;
            let mut stmt = conn
                .prepare(
                    "SELECT column_name FROM information_schema.columns \
                     WHERE table_name = ? ORDER BY ordinal_position",
                )
                .map_err(|e| ReportingError::Query(e.to_string()))?;
            let columns = stmt
                .query_map([&table], |row| row.get::<_, String>(0))
                .map_err(|e| ReportingError::Query(e.to_string()))?
                .collect::<Result<Vec<String>, _>>()
                .map_err(|e| ReportingError::Query(e.to_string()))?;

            debug!("Found {} columns in table {}", columns.len(), table);
            Ok(columns)
        })
        .await?
    }
}

/// Serializes Arrow batches to JSON objects, keeping null columns as explicit nulls.
fn batches_to_rows(batches: &[RecordBatch]) -> Result<Vec<ResultRow>, ReportingError> {
    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());

    let batch_refs: Vec<&RecordBatch> = batches.iter().collect();
    writer.write_batches(&batch_refs)?;
    writer.finish()?;

    let buffer = writer.into_inner();
    if buffer.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&buffer).map_err(|e| ReportingError::Decode(e.to_string()))
}
