use crate::config::LlmConfig;
use crate::llm::models::SqlGenerationInput;
use crate::llm::prompt::{extract_sql, render_prompt};
use crate::llm::{LlmError, SqlGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat completions endpoint.
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct PromptRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError("API key is required for remote LLM provider".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl SqlGenerator for RemoteLlmProvider {
    async fn generate_sql(&self, input: &SqlGenerationInput) -> Result<String, LlmError> {
        let prompt = render_prompt(input)?;
        debug!("Prepared LLM prompt: {}", prompt);

        let request = PromptRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: 2000,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                response.status()
            )));
        }

        let prompt_response: PromptResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let Some(choice) = prompt_response.choices.into_iter().next() else {
            return Err(LlmError::ResponseError("No choices in response".to_string()));
        };

        extract_sql(&choice.message.content)
    }
}
