use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{DictionarySource, MetadataAccess, MetadataError, TableSchema};
use crate::config::MetadataConfig;
use crate::reporting::ReportingDatabase;

#[derive(Deserialize)]
struct GlossaryTerm {
    description: Option<String>,
}

/// Reads `text2sql.{table}` and `text2sql.{table}.{column}` glossary terms.
pub struct GlossaryClient {
    client: reqwest::Client,
    reporting: Arc<dyn ReportingDatabase>,
}

impl GlossaryClient {
    pub fn new(
        config: &MetadataConfig,
        reporting: Arc<dyn ReportingDatabase>,
    ) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| MetadataError::Client(e.to_string()))?;

        Ok(Self { client, reporting })
    }

    /// Returns the term's description, or `None` when the term is missing.
    ///
    /// Only transport failures are errors; HTTP error statuses are logged and
    /// treated as "no description".
    async fn term_description(
        &self,
        host: &str,
        token: &str,
        term: &str,
    ) -> Result<Option<String>, MetadataError> {
        let uri = format!(
            "{}/api/v1/glossaryTerms/name/text2sql.{}",
            host.trim_end_matches('/'),
            term
        );

        let response = self
            .client
            .get(&uri)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            info!("Glossary term not found for URI: {}", uri);
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Failed to retrieve description for {} ({}): {}",
                term, status, body
            );
            return Ok(None);
        }

        match response.json::<GlossaryTerm>().await {
            Ok(glossary_term) => Ok(glossary_term.description),
            Err(e) => {
                warn!("Unreadable glossary term for {}: {}", term, e);
                Ok(None)
            }
        }
    }

    async fn describe_table(
        &self,
        table_name: &str,
        host: &str,
        token: &str,
    ) -> Result<TableSchema, MetadataError> {
        let Some(description) = self.term_description(host, token, table_name).await? else {
            return Ok(TableSchema::new(table_name, "", ""));
        };

        let columns = self.reporting.table_columns(table_name).await?;
        let mut columns_info = Vec::with_capacity(columns.len());
        for column_name in &columns {
            let term = format!("{}.{}", table_name, column_name);
            if let Some(column_desc) = self.term_description(host, token, &term).await? {
                columns_info.push(format!("\"{}\": {}", column_name, column_desc));
            }
        }

        debug!(
            "Described table {} with {}/{} column descriptions",
            table_name,
            columns_info.len(),
            columns.len()
        );
        Ok(TableSchema::new(table_name, &description, &columns_info.join(". ")))
    }
}

#[async_trait]
impl DictionarySource for GlossaryClient {
    async fn table_schemas(
        &self,
        tables: &[String],
        access: &MetadataAccess,
    ) -> Result<Vec<TableSchema>, MetadataError> {
        let host = access.host.as_deref().ok_or(MetadataError::MissingHost)?;

        let mut tables_info = Vec::with_capacity(tables.len());
        for table_name in tables {
            tables_info.push(self.describe_table(table_name, host, &access.token).await?);
        }
        Ok(tables_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::db_pool::build_pool;
    use crate::reporting::DuckDbReporting;

    fn client() -> GlossaryClient {
        let pool = build_pool(":memory:", 1).unwrap();
        pool.get()
            .unwrap()
            .execute_batch("CREATE TABLE LinelistHEI (County VARCHAR, MFLCode INTEGER, Infected BOOLEAN);")
            .unwrap();
        let reporting: Arc<dyn ReportingDatabase> = Arc::new(DuckDbReporting::new(pool));
        GlossaryClient::new(&AppConfig::default().metadata, reporting).unwrap()
    }

    fn access(host: String) -> MetadataAccess {
        MetadataAccess {
            host: Some(host),
            token: "jwt".to_string(),
        }
    }

    #[tokio::test]
    async fn builds_context_from_table_and_column_terms() {
        let mut server = mockito::Server::new_async().await;
        let base = "/api/v1/glossaryTerms/name/text2sql.LinelistHEI";

        let table = server
            .mock("GET", base)
            .match_header("authorization", "Bearer jwt")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"description": "HIV exposed infants"}"#)
            .create_async()
            .await;
        let county = server
            .mock("GET", format!("{}.County", base).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"description": "County of residence"}"#)
            .create_async()
            .await;
        let _mfl = server
            .mock("GET", format!("{}.MFLCode", base).as_str())
            .with_status(404)
            .create_async()
            .await;
        let _infected = server
            .mock("GET", format!("{}.Infected", base).as_str())
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let schemas = client()
            .table_schemas(&["LinelistHEI".to_string()], &access(server.url()))
            .await
            .unwrap();

        table.assert_async().await;
        county.assert_async().await;
        assert_eq!(
            schemas,
            vec![TableSchema {
                table_name: "LinelistHEI".to_string(),
                context_str: "description of the table: HIV exposed infants. These are columns in the \
                              table and their descriptions: \"County\": County of residence"
                    .to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn missing_table_term_skips_column_lookups() {
        let mut server = mockito::Server::new_async().await;
        let _table = server
            .mock("GET", "/api/v1/glossaryTerms/name/text2sql.LinelistHEI")
            .with_status(404)
            .create_async()
            .await;
        let columns = server
            .mock("GET", "/api/v1/glossaryTerms/name/text2sql.LinelistHEI.County")
            .expect(0)
            .create_async()
            .await;

        let schemas = client()
            .table_schemas(&["LinelistHEI".to_string()], &access(server.url()))
            .await
            .unwrap();

        columns.assert_async().await;
        assert_eq!(schemas[0], TableSchema::new("LinelistHEI", "", ""));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let err = client()
            .table_schemas(
                &["LinelistHEI".to_string()],
                &access("http://127.0.0.1:1".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::Transport(_)));
    }

    #[tokio::test]
    async fn lookups_without_a_host_fail_up_front() {
        let no_host = MetadataAccess {
            host: None,
            token: "jwt".to_string(),
        };
        let err = client()
            .table_schemas(&["LinelistHEI".to_string()], &no_host)
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::MissingHost));
    }
}
