use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use super::{DictionarySource, MetadataAccess, MetadataError, TableSchema};

const GLOSSARY_PREFIX: &str = "text2sql";

#[derive(Debug, Deserialize)]
struct GlossaryRow {
    parent: Option<String>,
    name: String,
    description: Option<String>,
}

#[derive(Debug, Default)]
struct TableEntry {
    description: Option<String>,
    columns: Vec<(String, String)>,
}

/// Table descriptions read once from a glossary CSV export.
///
/// Rows with an empty (or bare `text2sql`) parent describe tables; rows whose
/// parent is `text2sql.{table}` describe that table's columns.
#[derive(Debug)]
pub struct CsvDictionary {
    tables: HashMap<String, TableEntry>,
}

impl CsvDictionary {
    pub fn from_path(path: &Path) -> Result<Self, MetadataError> {
        let file = File::open(path)
            .map_err(|e| MetadataError::Dictionary(format!("{}: {}", path.display(), e)))?;
        let dictionary = Self::from_reader(file)?;
        info!(
            "Loaded dictionary export {} with {} tables",
            path.display(),
            dictionary.tables.len()
        );
        Ok(dictionary)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, MetadataError> {
        let mut rdr = ::csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let mut tables: HashMap<String, TableEntry> = HashMap::new();

        for row in rdr.deserialize::<GlossaryRow>() {
            let row = row.map_err(|e| MetadataError::Dictionary(e.to_string()))?;
            let description = row.description.filter(|d| !d.trim().is_empty());

            match parent_table(row.parent.as_deref()) {
                None => tables.entry(row.name).or_default().description = description,
                Some(table) => {
                    if let Some(description) = description {
                        tables
                            .entry(table.to_string())
                            .or_default()
                            .columns
                            .push((row.name, description));
                    }
                }
            }
        }

        Ok(Self { tables })
    }

    fn describe(&self, table_name: &str) -> TableSchema {
        let Some(TableEntry {
            description: Some(description),
            columns,
        }) = self.tables.get(table_name)
        else {
            debug!("No dictionary entry for table {}", table_name);
            return TableSchema::new(table_name, "", "");
        };

        let columns_info: Vec<String> = columns
            .iter()
            .map(|(column, desc)| format!("\"{}\": {}", column, desc))
            .collect();
        TableSchema::new(table_name, description, &columns_info.join(". "))
    }
}

/// `text2sql.{table}` names a column row's table; anything else is a table row.
fn parent_table(parent: Option<&str>) -> Option<&str> {
    parent
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != GLOSSARY_PREFIX)
        .map(|p| p.strip_prefix("text2sql.").unwrap_or(p))
}

#[async_trait]
impl DictionarySource for CsvDictionary {
    async fn table_schemas(
        &self,
        tables: &[String],
        _access: &MetadataAccess,
    ) -> Result<Vec<TableSchema>, MetadataError> {
        Ok(tables.iter().map(|table| self.describe(table)).collect())
    }
}
