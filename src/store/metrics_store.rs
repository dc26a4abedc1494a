use chrono::{DateTime, Utc};
use duckdb::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{format_timestamp, now, parse_id, parse_timestamp, with_connection, StoreError};
use crate::db::db_pool::DuckDBPool;
use crate::db::record_id::RecordId;

const KIND: &str = "query response";

/// One logged attempt to answer a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub id: RecordId,
    pub question: String,
    /// Generated SQL, if generation got that far.
    pub response: Option<String>,
    pub response_rating: Option<i32>,
    pub response_rating_comment: Option<String>,
    pub time_taken_secs: f64,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub is_valid: bool,
}

#[derive(Debug, Clone)]
pub struct NewQueryResponse {
    pub question: String,
    pub response: Option<String>,
    pub time_taken_secs: f64,
    pub created_by: Option<String>,
    pub is_valid: bool,
}

impl QueryResponse {
    fn from_row(row: &Row<'_>) -> Result<Self, StoreError> {
        let id: String = row.get(0)?;
        let created_at: String = row.get(6)?;
        Ok(Self {
            id: parse_id(&id)?,
            question: row.get(1)?,
            response: row.get(2)?,
            response_rating: row.get(3)?,
            response_rating_comment: row.get(4)?,
            time_taken_secs: row.get(5)?,
            created_at: parse_timestamp(&created_at)?,
            created_by: row.get(7)?,
            is_valid: row.get(8)?,
        })
    }
}

fn fetch(conn: &Connection, id: RecordId) -> Result<Option<QueryResponse>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, question, response, response_rating, response_rating_comment, \
         time_taken_secs, created_at, created_by, is_valid FROM tafsiri_responses WHERE id = ?",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    match rows.next()? {
        Some(row) => QueryResponse::from_row(row).map(Some),
        None => Ok(None),
    }
}

/// Append-only log of answered questions in `tafsiri_responses`.
#[derive(Clone)]
pub struct MetricsStore {
    pool: DuckDBPool,
}

impl MetricsStore {
    pub fn new(pool: DuckDBPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, record: NewQueryResponse) -> Result<RecordId, StoreError> {
        let id = RecordId::generate();
        let created_at = format_timestamp(&now());
        let is_valid = record.is_valid;

        with_connection(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO tafsiri_responses (id, question, response, response_rating, \
                 response_rating_comment, time_taken_secs, created_at, created_by, is_valid) \
                 VALUES (?, ?, ?, NULL, NULL, ?, ?, ?, ?)",
                params![
                    id.to_string(),
                    record.question,
                    record.response,
                    record.time_taken_secs,
                    created_at,
                    record.created_by,
                    record.is_valid,
                ],
            )?;
            Ok(())
        })
        .await?;

        debug!("Saved query response {} (valid: {})", id, is_valid);
        Ok(id)
    }

    pub async fn get(&self, id: RecordId) -> Result<QueryResponse, StoreError> {
        with_connection(&self.pool, move |conn| fetch(conn, id))
            .await?
            .ok_or(StoreError::NotFound { kind: KIND, id })
    }

    pub async fn update_rating(
        &self,
        id: RecordId,
        rating: i32,
        comment: Option<String>,
    ) -> Result<(), StoreError> {
        let changed = with_connection(&self.pool, move |conn| {
            Ok(conn.execute(
                "UPDATE tafsiri_responses SET response_rating = ?, response_rating_comment = ? WHERE id = ?",
                params![rating, comment, id.to_string()],
            )?)
        })
        .await?;

        if changed == 0 {
            return Err(StoreError::NotFound { kind: KIND, id });
        }
        debug!("Rated query response {} with {}", id, rating);
        Ok(())
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        with_connection(&self.pool, |conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM tafsiri_responses", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}
