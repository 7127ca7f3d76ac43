//! Configuration for the vendor clients and the node option collections.
//!
//! Three layers:
//!
//! - **Credentials** ([`OllamaCredentials`], [`OpenAiCredentials`]) as the host
//!   resolves them.
//! - **Node options** ([`OllamaOptions`], [`OpenAiOptions`]), deserialized from
//!   the node's `options` collection. Known keys become typed fields; anything
//!   else lands in `extra` and is passed to the vendor verbatim.
//! - **Client configs** ([`OllamaConfig`], [`OpenAiConfig`]) holding what the
//!   HTTP clients need: endpoint, model, auth, timeout and retries.

use crate::error::{LlmError, Result};
use lmchat_core::llm::ReasoningEffort;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default OpenAI endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Credentials of the `ollamaApi` type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OllamaCredentials {
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,
}

impl OllamaCredentials {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Read `OLLAMA_HOST` and `OLLAMA_API_KEY`, defaulting the host.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let api_key = std::env::var("OLLAMA_API_KEY").ok();
        Self { base_url, api_key }
    }
}

/// Credentials of the `openAiApi` type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiCredentials {
    pub api_key: String,

    /// Base URL override.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub organization_id: Option<String>,
}

impl OpenAiCredentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: None,
            organization_id: None,
        }
    }

    /// Read `OPENAI_API_KEY` and the optional `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::ApiKeyNotFound("Environment variable: OPENAI_API_KEY".into()))?;
        Ok(Self {
            api_key,
            url: std::env::var("OPENAI_BASE_URL").ok(),
            organization_id: std::env::var("OPENAI_ORG_ID").ok(),
        })
    }
}

/// The `options` collection of the Ollama chat node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OllamaOptions {
    pub temperature: Option<f64>,
    pub top_k: Option<i64>,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub repeat_penalty: Option<f64>,
    pub num_ctx: Option<i64>,
    pub num_predict: Option<i64>,
    pub num_gpu: Option<i64>,
    pub num_thread: Option<i64>,
    pub keep_alive: Option<String>,

    /// Output format; `"default"` means none.
    pub format: Option<String>,

    /// Pull the model before the first request if the server lacks it.
    #[serde(default)]
    pub check_or_pull_model: bool,

    pub think: Option<bool>,
    pub reasoning_effort: Option<ReasoningEffort>,

    /// Unrecognized keys, passed through to the request body.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OllamaOptions {
    /// Parse the host's options collection.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// The format to send, with the editor's `"default"` mapped to none.
    pub fn effective_format(&self) -> Option<&str> {
        self.format.as_deref().filter(|f| *f != "default" && !f.is_empty())
    }

    /// Sampling settings in Ollama's `options` object naming.
    pub fn model_options(&self) -> Map<String, Value> {
        let mut options = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                options.insert(key.to_string(), value);
            }
        };
        put("temperature", self.temperature.map(Value::from));
        put("top_k", self.top_k.map(Value::from));
        put("top_p", self.top_p.map(Value::from));
        put("frequency_penalty", self.frequency_penalty.map(Value::from));
        put("presence_penalty", self.presence_penalty.map(Value::from));
        put("repeat_penalty", self.repeat_penalty.map(Value::from));
        put("num_ctx", self.num_ctx.map(Value::from));
        put("num_predict", self.num_predict.map(Value::from));
        put("num_gpu", self.num_gpu.map(Value::from));
        put("num_thread", self.num_thread.map(Value::from));
        options
    }
}

/// Response format of the OpenAI node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    JsonObject,
}

/// The `options` collection of the OpenAI chat node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiOptions {
    #[serde(rename = "baseURL")]
    pub base_url: Option<String>,
    pub frequency_penalty: Option<f64>,
    /// `-1` (the editor default) means no limit.
    pub max_tokens: Option<i64>,
    pub presence_penalty: Option<f64>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    /// Milliseconds.
    pub timeout: Option<u64>,
    pub max_retries: Option<u32>,
    pub response_format: Option<ResponseFormat>,
    pub reasoning_effort: Option<ReasoningEffort>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OpenAiOptions {
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// `max_tokens` with non-positive values treated as unset.
    pub fn effective_max_tokens(&self) -> Option<i64> {
        self.max_tokens.filter(|n| *n > 0)
    }
}

/// Settings for the Ollama HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for the Ollama server, e.g. `http://localhost:11434`.
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Sent as `Authorization: Bearer <key>` when present.
    pub api_key: Option<String>,

    /// Connect and per-read timeout. Streams may run longer while data
    /// keeps arriving.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum retries for failed requests.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: trim_url(base_url.into()),
            model: model.into(),
            api_key: None,
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }

    /// Build from node credentials.
    pub fn from_credentials(credentials: &OllamaCredentials, model: impl Into<String>) -> Self {
        let mut config = Self::new(credentials.base_url.clone(), model);
        config.api_key = credentials.api_key.clone().filter(|k| !k.is_empty());
        config
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// `Authorization` header value, when an API key is configured.
    pub fn auth_header(&self) -> Option<String> {
        bearer(self.api_key.as_deref())
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Settings for the OpenAI HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Organization ID, sent as `OpenAI-Organization`.
    pub organization: Option<String>,
}

impl OpenAiConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: trim_url(base_url.into()),
            model: model.into(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            organization: None,
        }
    }

    /// Create configuration from an environment variable holding the key.
    pub fn from_env(
        env_var: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| LlmError::ApiKeyNotFound(format!("Environment variable: {}", env_var)))?;

        Ok(Self::new(api_key, base_url, model))
    }

    /// Build from node credentials and options. The options' base URL wins
    /// over the credential's.
    pub fn from_node(
        credentials: &OpenAiCredentials,
        options: &OpenAiOptions,
        model: impl Into<String>,
    ) -> Self {
        let base_url = options
            .base_url
            .clone()
            .or_else(|| credentials.url.clone())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());

        let mut config = Self::new(credentials.api_key.clone(), base_url, model);
        config.organization = credentials.organization_id.clone().filter(|o| !o.is_empty());
        if let Some(ms) = options.timeout {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = options.max_retries {
            config.max_retries = retries;
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// `Authorization` header value; none for an empty key.
    pub fn auth_header(&self) -> Option<String> {
        bearer(Some(&self.api_key))
    }
}

fn bearer(api_key: Option<&str>) -> Option<String> {
    api_key
        .filter(|key| !key.is_empty())
        .map(|key| format!("Bearer {}", key))
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_retries() -> u32 {
    3
}
