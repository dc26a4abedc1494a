use serde::Serialize;

use crate::metadata::TableSchema;

/// Everything the prompt is built from.
#[derive(Debug, Clone, Serialize)]
pub struct SqlGenerationInput {
    pub question: String,
    /// Worked examples and house rules taken from the config.
    pub example_prompt: Option<String>,
    /// Best-ranked table; the query should be written against it.
    pub primary: TableSchema,
    /// Runner-up table offered for joins, when the primary table allows it.
    pub join_with: Option<TableSchema>,
}
