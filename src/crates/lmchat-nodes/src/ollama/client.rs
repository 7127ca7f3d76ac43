//! Ollama HTTP client.
//!
//! Speaks the streaming `/api/chat` endpoint, which answers with one JSON
//! object per line (NDJSON), plus `/api/tags` and `/api/pull` for model
//! management.
//!
//! # Example
//!
//! ```rust,ignore
//! use lmchat_nodes::config::OllamaConfig;
//! use lmchat_nodes::ollama::{OllamaApi, OllamaHttpClient};
//!
//! let client = OllamaHttpClient::new(OllamaConfig::new("http://localhost:11434", "llama3.2"))?;
//! if !client.model_exists("llama3.2").await? {
//!     client.pull("llama3.2", true).await?;
//! }
//! ```

use super::types::{OllamaChatChunk, PullProgress, TagsResponse};
use crate::config::OllamaConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Stream of decoded `/api/chat` lines.
pub type OllamaChunkStream = Pin<Box<dyn Stream<Item = Result<OllamaChatChunk>> + Send>>;

/// What the chat adapter needs from an Ollama client.
#[async_trait]
pub trait OllamaApi: Send + Sync {
    /// Open a streaming chat request. `body` is the complete request body.
    async fn chat_stream(&self, body: Map<String, Value>) -> Result<OllamaChunkStream>;

    /// Download a model, blocking until the pull completes.
    async fn pull(&self, model: &str, log_progress: bool) -> Result<()>;

    /// Whether the server already has `model`.
    async fn model_exists(&self, model: &str) -> Result<bool>;

    /// Cancel every in-flight stream opened by this client. Cancelled streams
    /// end early without an error.
    fn abort(&self);
}

/// Ollama client over `reqwest`.
#[derive(Clone)]
pub struct OllamaHttpClient {
    config: OllamaConfig,
    client: Client,
    abort_tx: Arc<watch::Sender<u64>>,
}

impl OllamaHttpClient {
    /// Create a client. Fails only if the HTTP client cannot be built or the
    /// API key is not a valid header value.
    ///
    /// `config.timeout` bounds connecting and each read, not the whole
    /// request: chat streams and pulls may run far longer while data keeps
    /// arriving.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(auth) = config.auth_header() {
            let value = HeaderValue::from_str(&auth)
                .map_err(|e| LlmError::ConfigError(format!("Invalid API key: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        let (abort_tx, _) = watch::channel(0);
        Ok(Self {
            config,
            client,
            abort_tx: Arc::new(abort_tx),
        })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn post_streaming(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.config.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl OllamaApi for OllamaHttpClient {
    async fn chat_stream(&self, body: Map<String, Value>) -> Result<OllamaChunkStream> {
        let model = body.get("model").and_then(Value::as_str).unwrap_or_default();
        debug!(model, "Opening Ollama chat stream");
        let response = self.post_streaming("/api/chat", &Value::Object(body)).await?;

        let lines = ndjson_lines::<OllamaChatChunk>(response);
        let mut aborted = self.abort_tx.subscribe();

        let stream = async_stream::stream! {
            futures::pin_mut!(lines);
            loop {
                let next = tokio::select! {
                    biased;
                    Ok(()) = aborted.changed() => {
                        debug!("Ollama chat stream aborted");
                        None
                    }
                    next = lines.next() => next,
                };
                match next {
                    Some(item) => yield item,
                    None => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn pull(&self, model: &str, log_progress: bool) -> Result<()> {
        info!(model, "Pulling Ollama model");
        let response = self
            .post_streaming("/api/pull", &json!({ "model": model, "stream": true }))
            .await?;

        let progress = ndjson_lines::<PullProgress>(response);
        futures::pin_mut!(progress);

        let mut last_status = String::new();
        while let Some(update) = progress.next().await {
            let update = update?;
            if !log_progress {
                continue;
            }
            match update.percent() {
                Some(percent) => debug!(
                    model,
                    status = %update.status,
                    digest = update.digest.as_deref().unwrap_or_default(),
                    "{:.1}%",
                    percent
                ),
                None if update.status != last_status => info!(model, status = %update.status, "Pull progress"),
                None => {}
            }
            last_status = update.status;
        }

        info!(model, "Pull complete");
        Ok(())
    }

    async fn model_exists(&self, model: &str) -> Result<bool> {
        let installed = self.list_models().await?;
        Ok(installed.iter().any(|name| same_model(name, model)))
    }

    fn abort(&self) {
        self.abort_tx.send_modify(|generation| *generation += 1);
    }
}

/// Ollama reports untagged models as `name:latest`.
fn same_model(installed: &str, requested: &str) -> bool {
    installed == requested
        || (!requested.contains(':') && installed.strip_suffix(":latest") == Some(requested))
}

async fn error_from_response(response: reqwest::Response) -> LlmError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = server_error(&text).unwrap_or(text);
    LlmError::from_status("Ollama", status, message)
}

/// The message of an `{"error": "..."}` body.
fn server_error(text: &str) -> Option<String> {
    serde_json::from_str::<Value>(text)
        .ok()?
        .get("error")?
        .as_str()
        .map(str::to_string)
}

/// Decode a streaming response body as NDJSON.
fn ndjson_lines<T>(response: reqwest::Response) -> impl Stream<Item = Result<T>> + Send
where
    T: DeserializeOwned + Send + 'static,
{
    let mut bytes = response.bytes_stream();
    async_stream::try_stream! {
        let mut buffer = LineBuffer::default();
        while let Some(frame) = bytes.next().await {
            let frame = frame?;
            for line in buffer.push(&frame) {
                yield decode_line::<T>(&line)?;
            }
        }
        if let Some(line) = buffer.finish() {
            yield decode_line::<T>(&line)?;
        }
    }
}

fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T> {
    let value: Value = serde_json::from_str(line)?;
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(LlmError::ProviderError(message.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

/// Reassembles lines from network frames that may split a line, or a UTF-8
/// sequence, anywhere.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a frame and return every line it completed, skipping blanks.
    pub(crate) fn push(&mut self, frame: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(frame);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// Whatever remains once the body ends without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}
