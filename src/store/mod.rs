//! Document store: configs and query-response metrics kept in DuckDB tables.

pub mod config_store;
pub mod metrics_store;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use duckdb::Connection;
use thiserror::Error;

use crate::db::db_pool::DuckDBPool;
use crate::db::record_id::RecordId;

pub use config_store::{ConfigStore, ConfigUpdate, NewConfig, TafsiriConfig};
pub use metrics_store::{MetricsStore, NewQueryResponse, QueryResponse};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: RecordId },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("stored document is corrupt: {0}")]
    Corrupt(String),

    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Unavailable(format!("connection pool: {}", err))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Unavailable(format!("store task failed: {}", err))
    }
}

/// Runs `f` with a pooled connection on the blocking thread pool.
pub(crate) async fn with_connection<T, F>(pool: &DuckDBPool, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
        let conn = pool.get()?;
        f(&conn)
    })
    .await?
}

/// Current time at the precision the store keeps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

pub(crate) fn parse_id(raw: &str) -> Result<RecordId, StoreError> {
    RecordId::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::db::db_pool::{build_pool, DuckDBPool};
    use crate::db::migrations;

    /// Fresh in-memory document store with the schema applied.
    pub fn memory_pool() -> DuckDBPool {
        let pool = build_pool(":memory:", 2).unwrap();
        migrations::run(&pool.get().unwrap()).unwrap();
        pool
    }
}
