//! OpenAI chat completions client.
//!
//! Works with the OpenAI API and any server exposing the same
//! `/chat/completions` endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use lmchat_nodes::config::OpenAiConfig;
//! use lmchat_nodes::openai::{OpenAiApi, OpenAiHttpClient};
//!
//! let config = OpenAiConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4o-mini")?;
//! let client = OpenAiHttpClient::new(config)?;
//! ```

use super::types::OpenAiResponse;
use crate::config::OpenAiConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

/// What the chat adapter needs from an OpenAI client.
#[async_trait]
pub trait OpenAiApi: Send + Sync {
    /// Send a non-streaming chat completion request. `body` is the complete
    /// request body.
    async fn chat_completion(&self, body: Map<String, Value>) -> Result<OpenAiResponse>;
}

/// OpenAI client over `reqwest`.
#[derive(Clone)]
pub struct OpenAiHttpClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiHttpClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let auth = config
            .auth_header()
            .ok_or_else(|| LlmError::ApiKeyNotFound("OpenAI credentials have no API key".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&auth)?);
        if let Some(org) = &config.organization {
            headers.insert(HeaderName::from_static("openai-organization"), header_value(org)?);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| LlmError::ConfigError(format!("Invalid header value: {}", e)))
}

#[async_trait]
impl OpenAiApi for OpenAiHttpClient {
    async fn chat_completion(&self, body: Map<String, Value>) -> Result<OpenAiResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let model = body.get("model").and_then(Value::as_str).unwrap_or_default();
        debug!(model, "Sending OpenAI chat completion");

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = api_error_message(&text).unwrap_or(text);
            return Err(LlmError::from_status("OpenAI", status, message));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

/// `error.message` of an OpenAI error body.
fn api_error_message(text: &str) -> Option<String> {
    serde_json::from_str::<Value>(text)
        .ok()?
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}
