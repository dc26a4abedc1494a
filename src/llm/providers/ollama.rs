use crate::config::LlmConfig;
use crate::llm::models::SqlGenerationInput;
use crate::llm::prompt::{extract_sql, render_prompt};
use crate::llm::{LlmError, SqlGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct OllamaRequest {
    model: String,
    prompt: String,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434/api/generate".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl SqlGenerator for OllamaProvider {
    async fn generate_sql(&self, input: &SqlGenerationInput) -> Result<String, LlmError> {
        let prompt = render_prompt(input)?;

        info!("Sending request to Ollama with model: {}", self.model);
        debug!("API URL: {}", self.api_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt,
            temperature: self.temperature,
            stream: false, // Explicitly disable streaming
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            // Try to get the error message from the response body
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        let response_text = response.text().await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        debug!("Raw response from Ollama: {}", response_text);

        let ollama_response = serde_json::from_str::<OllamaResponse>(&response_text).map_err(|e| {
            error!("Failed to parse Ollama response: {} - Response was: {}", e, response_text);
            LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
        })?;

        extract_sql(&ollama_response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::metadata::TableSchema;

    #[tokio::test]
    async fn reads_sql_from_the_generate_response() {
        let mut server = mockito::Server::new_async().await;
        let generate = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"sqlcoder","response":"SQLQuery: SELECT County FROM LineListPBFW","done":true}"#)
            .create_async()
            .await;

        let mut config = AppConfig::default().llm;
        config.backend = "ollama".to_string();
        config.model = "sqlcoder".to_string();
        config.api_url = Some(format!("{}/api/generate", server.url()));

        let input = SqlGenerationInput {
            question: "Which counties have PBFW clients?".to_string(),
            example_prompt: None,
            primary: TableSchema::new("LineListPBFW", "", ""),
            join_with: None,
        };
        let sql = OllamaProvider::new(&config)
            .unwrap()
            .generate_sql(&input)
            .await
            .unwrap();

        generate.assert_async().await;
        assert_eq!(sql, "SELECT County FROM LineListPBFW");
    }
}
