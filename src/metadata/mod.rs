//! Table and column descriptions from the glossary service.

pub mod cache;
pub mod client;
pub mod csv;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::reporting::ReportingError;

pub use cache::DictionaryCache;
pub use client::GlossaryClient;
pub use self::csv::CsvDictionary;

/// A reporting table together with the context the LLM sees for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub table_name: String,
    pub context_str: String,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, description: &str, columns_info: &str) -> Self {
        Self {
            table_name: table_name.into(),
            context_str: format!(
                "description of the table: {}. These are columns in the table and their descriptions: {}",
                description, columns_info
            ),
        }
    }
}

/// Where to look terms up and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataAccess {
    pub host: Option<String>,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("no metadata host configured")]
    MissingHost,

    #[error("metadata service request failed: {0}")]
    Transport(String),

    #[error("failed to read table columns: {0}")]
    Columns(#[from] ReportingError),

    #[error("metadata client setup failed: {0}")]
    Client(String),

    #[error("failed to read dictionary export: {0}")]
    Dictionary(String),
}

#[async_trait]
pub trait DictionarySource: Send + Sync {
    /// Describes each of `tables`, in the given order.
    async fn table_schemas(
        &self,
        tables: &[String],
        access: &MetadataAccess,
    ) -> Result<Vec<TableSchema>, MetadataError>;
}
