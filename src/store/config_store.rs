use chrono::{DateTime, Utc};
use duckdb::{params, Connection, Row};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use super::{format_timestamp, now, parse_id, parse_timestamp, with_connection, StoreError};
use crate::db::db_pool::DuckDBPool;
use crate::db::record_id::RecordId;

const KIND: &str = "config";

const SELECT_COLUMNS: &str = "id, config_name, tables, db_host, db_port, db_user, db_password, \
     db_name, example_prompt, om_host, om_jwt, join_tables, created_at, updated_at";

/// Named set of reporting tables, credentials and prompt examples for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TafsiriConfig {
    pub id: RecordId,
    pub config_name: String,
    pub tables: Vec<String>,
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_name: Option<String>,
    pub example_prompt: Option<String>,
    pub om_host: Option<String>,
    pub om_jwt: Option<String>,
    /// Tables whose questions may need a join with the runner-up table.
    pub join_tables: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewConfig {
    pub config_name: String,
    #[serde(default)]
    pub tables: Vec<String>,
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_name: Option<String>,
    pub example_prompt: Option<String>,
    pub om_host: Option<String>,
    pub om_jwt: Option<String>,
    #[serde(default)]
    pub join_tables: Vec<String>,
}

/// Partial update; absent fields keep their stored value.
///
/// Optional fields are doubly wrapped: an explicit JSON `null` arrives as
/// `Some(None)` and clears the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    pub config_name: Option<String>,
    pub tables: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub db_host: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub db_port: Option<Option<u16>>,
    #[serde(default, deserialize_with = "nullable")]
    pub db_user: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub db_password: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub db_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub example_prompt: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub om_host: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub om_jwt: Option<Option<String>>,
    pub join_tables: Option<Vec<String>>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl TafsiriConfig {
    fn apply(&mut self, update: ConfigUpdate) {
        if let Some(v) = update.config_name {
            self.config_name = v;
        }
        if let Some(v) = update.tables {
            self.tables = v;
        }
        if let Some(v) = update.db_host {
            self.db_host = v;
        }
        if let Some(v) = update.db_port {
            self.db_port = v;
        }
        if let Some(v) = update.db_user {
            self.db_user = v;
        }
        if let Some(v) = update.db_password {
            self.db_password = v;
        }
        if let Some(v) = update.db_name {
            self.db_name = v;
        }
        if let Some(v) = update.example_prompt {
            self.example_prompt = v;
        }
        if let Some(v) = update.om_host {
            self.om_host = v;
        }
        if let Some(v) = update.om_jwt {
            self.om_jwt = v;
        }
        if let Some(v) = update.join_tables {
            self.join_tables = v;
        }
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.config_name.trim().is_empty() {
            return Err(StoreError::Validation("config_name must not be empty".to_string()));
        }
        if let Some(blank) = self
            .tables
            .iter()
            .chain(self.join_tables.iter())
            .find(|t| t.trim().is_empty())
        {
            return Err(StoreError::Validation(format!(
                "table names must not be blank (got '{}')",
                blank
            )));
        }
        Ok(())
    }

    fn from_row(row: &Row<'_>) -> Result<Self, StoreError> {
        let id: String = row.get(0)?;
        let tables: String = row.get(2)?;
        let db_port: Option<i32> = row.get(4)?;
        let join_tables: String = row.get(11)?;
        let created_at: String = row.get(12)?;
        let updated_at: String = row.get(13)?;

        Ok(Self {
            id: parse_id(&id)?,
            config_name: row.get(1)?,
            tables: decode_list(&tables)?,
            db_host: row.get(3)?,
            db_port: db_port.and_then(|p| u16::try_from(p).ok()),
            db_user: row.get(5)?,
            db_password: row.get(6)?,
            db_name: row.get(7)?,
            example_prompt: row.get(8)?,
            om_host: row.get(9)?,
            om_jwt: row.get(10)?,
            join_tables: decode_list(&join_tables)?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

fn encode_list(values: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(values).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn decode_list(raw: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(format!("table list: {}", e)))
}

fn fetch(conn: &Connection, id: RecordId) -> Result<Option<TafsiriConfig>, StoreError> {
    let sql = format!("SELECT {} FROM tafsiri_configs WHERE id = ?", SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([id.to_string()])?;
    match rows.next()? {
        Some(row) => TafsiriConfig::from_row(row).map(Some),
        None => Ok(None),
    }
}

fn insert(conn: &Connection, config: &TafsiriConfig) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO tafsiri_configs (id, config_name, tables, db_host, db_port, db_user, \
         db_password, db_name, example_prompt, om_host, om_jwt, join_tables, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            config.id.to_string(),
            config.config_name,
            encode_list(&config.tables)?,
            config.db_host,
            config.db_port.map(i32::from),
            config.db_user,
            config.db_password,
            config.db_name,
            config.example_prompt,
            config.om_host,
            config.om_jwt,
            encode_list(&config.join_tables)?,
            format_timestamp(&config.created_at),
            format_timestamp(&config.updated_at),
        ],
    )?;
    Ok(())
}

fn overwrite(conn: &Connection, config: &TafsiriConfig) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE tafsiri_configs SET config_name = ?, tables = ?, db_host = ?, db_port = ?, \
         db_user = ?, db_password = ?, db_name = ?, example_prompt = ?, om_host = ?, om_jwt = ?, \
         join_tables = ?, updated_at = ? WHERE id = ?",
        params![
            config.config_name,
            encode_list(&config.tables)?,
            config.db_host,
            config.db_port.map(i32::from),
            config.db_user,
            config.db_password,
            config.db_name,
            config.example_prompt,
            config.om_host,
            config.om_jwt,
            encode_list(&config.join_tables)?,
            format_timestamp(&config.updated_at),
            config.id.to_string(),
        ],
    )?;
    Ok(())
}

/// CRUD over the `tafsiri_configs` collection.
#[derive(Clone)]
pub struct ConfigStore {
    pool: DuckDBPool,
}

impl ConfigStore {
    pub fn new(pool: DuckDBPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewConfig) -> Result<TafsiriConfig, StoreError> {
        let now = now();
        let config = TafsiriConfig {
            id: RecordId::generate(),
            config_name: new.config_name.trim().to_string(),
            tables: new.tables,
            db_host: new.db_host,
            db_port: new.db_port,
            db_user: new.db_user,
            db_password: new.db_password,
            db_name: new.db_name,
            example_prompt: new.example_prompt,
            om_host: new.om_host,
            om_jwt: new.om_jwt,
            join_tables: new.join_tables,
            created_at: now,
            updated_at: now,
        };
        config.validate()?;

        let stored = config.clone();
        with_connection(&self.pool, move |conn| insert(conn, &stored)).await?;

        info!("Created config '{}' ({})", config.config_name, config.id);
        Ok(config)
    }

    pub async fn list(&self) -> Result<Vec<TafsiriConfig>, StoreError> {
        with_connection(&self.pool, |conn| {
            let sql = format!(
                "SELECT {} FROM tafsiri_configs ORDER BY created_at, id",
                SELECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut configs = Vec::new();
            while let Some(row) = rows.next()? {
                configs.push(TafsiriConfig::from_row(row)?);
            }
            Ok(configs)
        })
        .await
    }

    pub async fn get(&self, id: RecordId) -> Result<TafsiriConfig, StoreError> {
        with_connection(&self.pool, move |conn| fetch(conn, id))
            .await?
            .ok_or(StoreError::NotFound { kind: KIND, id })
    }

    pub async fn update(&self, id: RecordId, update: ConfigUpdate) -> Result<TafsiriConfig, StoreError> {
        let updated = with_connection(&self.pool, move |conn| {
            let mut config = fetch(conn, id)?.ok_or(StoreError::NotFound { kind: KIND, id })?;
            config.apply(update);
            config.config_name = config.config_name.trim().to_string();
            config.updated_at = now();
            config.validate()?;
            overwrite(conn, &config)?;
            Ok(config)
        })
        .await?;

        debug!("Updated config {}", id);
        Ok(updated)
    }

    pub async fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        let deleted = with_connection(&self.pool, move |conn| {
            Ok(conn.execute("DELETE FROM tafsiri_configs WHERE id = ?", [id.to_string()])?)
        })
        .await?;

        if deleted == 0 {
            return Err(StoreError::NotFound { kind: KIND, id });
        }
        info!("Deleted config {}", id);
        Ok(())
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        with_connection(&self.pool, |conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM tafsiri_configs", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}
