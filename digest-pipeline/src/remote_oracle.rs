use crate::types::{Oracle, OracleConfig, OracleError, PipelineError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Oracle backed by an OpenAI-compatible chat completions endpoint.
pub struct RemoteOracle {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl RemoteOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PipelineError::Config("oracle API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: 0.2,
        })
    }
}

#[async_trait]
impl Oracle for RemoteOracle {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    debug!("Failed to read error body for {}: {}", status, e);
                    String::new()
                }
            };
            return Err(classify_failure(status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(format!("failed to decode response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| OracleError::InvalidResponse("response has no choices".to_string()))?;

        debug!("Oracle answered with {} chars", content.len());
        Ok(content)
    }
}

/// Map a non-success answer to an error kind. Rate limiting and overload are
/// the only transient kinds.
fn classify_failure(status: StatusCode, body: &str) -> OracleError {
    let detail = format!("{}: {}", status, body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::SERVICE_UNAVAILABLE
        || body.contains("RESOURCE_EXHAUSTED")
    {
        OracleError::Overloaded(detail)
    } else {
        OracleError::Request(detail)
    }
}
