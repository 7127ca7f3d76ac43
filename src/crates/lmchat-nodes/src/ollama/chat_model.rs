//! Ollama chat model with reasoning toggles.
//!
//! # Example
//!
//! ```rust,ignore
//! use lmchat_nodes::config::{OllamaConfig, OllamaOptions};
//! use lmchat_nodes::ollama::ChatOllamaWithReasoning;
//! use lmchat_core::llm::{ChatModel, ChatRequest, ReasoningEffort};
//! use lmchat_core::Message;
//!
//! let options = OllamaOptions {
//!     think: Some(true),
//!     reasoning_effort: Some(ReasoningEffort::Medium),
//!     ..Default::default()
//! };
//! let model = ChatOllamaWithReasoning::from_config(
//!     OllamaConfig::new("http://localhost:11434", "qwen3"),
//!     options,
//! )?;
//!
//! let response = model.chat(ChatRequest::new(vec![Message::human("Why is the sky blue?")])).await?;
//! println!("{:?}", response.thinking);
//! ```

use super::client::{OllamaApi, OllamaChunkStream, OllamaHttpClient};
use super::stream::{stream_response_chunks, StreamRequest};
use super::types::to_ollama_message;
use crate::config::{OllamaConfig, OllamaOptions};
use crate::error::Result as LlmResult;
use crate::failed_attempt::{call_with_retry, FailedAttemptHandler, RetryPolicy};
use crate::reasoning::{reconcile_ollama, ReasoningToggles};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lmchat_core::llm::{
    aggregate_stream, CallOptions, ChatModel, ChatRequest, ChatResponse, ChunkStream,
};
use lmchat_core::{
    AbortSignal, CallbackManager, ChatGenerationChunk, CoreError, Result, RunManager,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Ollama chat model.
///
/// Every call streams from `/api/chat`; [`ChatModel::chat`] aggregates the
/// stream. Opening the stream is retried according to the retry policy.
#[derive(Clone)]
pub struct ChatOllamaWithReasoning {
    client: Arc<dyn OllamaApi>,
    model: String,
    options: OllamaOptions,
    callbacks: CallbackManager,
    retry_policy: RetryPolicy,
    failed_attempt: FailedAttemptHandler,
}

impl ChatOllamaWithReasoning {
    pub fn new(client: Arc<dyn OllamaApi>, model: impl Into<String>, options: OllamaOptions) -> Self {
        Self {
            client,
            model: model.into(),
            options,
            callbacks: CallbackManager::new(),
            retry_policy: RetryPolicy::default(),
            failed_attempt: FailedAttemptHandler::new(),
        }
    }

    /// Build over an [`OllamaHttpClient`] for `config`.
    pub fn from_config(config: OllamaConfig, options: OllamaOptions) -> LlmResult<Self> {
        let model = config.model.clone();
        let retry_policy = RetryPolicy::from_max_retries(config.max_retries);
        let client = OllamaHttpClient::new(config)?;
        Ok(Self::new(Arc::new(client), model, options).with_retry_policy(retry_policy))
    }

    pub fn with_callbacks(mut self, callbacks: CallbackManager) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_failed_attempt_handler(mut self, handler: FailedAttemptHandler) -> Self {
        self.failed_attempt = handler;
        self
    }

    pub fn options(&self) -> &OllamaOptions {
        &self.options
    }

    fn toggles(&self) -> ReasoningToggles {
        ReasoningToggles::new(self.options.think, self.options.reasoning_effort)
    }

    /// Request parameters before reasoning reconciliation.
    fn base_params(&self, call: &CallOptions) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("model".to_string(), json!(self.model));
        if let Some(format) = self.options.effective_format() {
            params.insert("format".to_string(), json!(format));
        }
        if let Some(keep_alive) = &self.options.keep_alive {
            params.insert("keep_alive".to_string(), json!(keep_alive));
        }

        let mut model_options = self.options.model_options();
        if !call.stop.is_empty() {
            model_options.insert("stop".to_string(), json!(call.stop));
        }
        params.insert("options".to_string(), Value::Object(model_options));

        for (key, value) in self.options.extra.iter().chain(call.extra.iter()) {
            params.insert(key.clone(), value.clone());
        }
        params
    }
}

#[async_trait]
impl ChatModel for ChatOllamaWithReasoning {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn invocation_params(&self, options: &CallOptions) -> Map<String, Value> {
        let toggles = self.toggles().resolve(options);
        reconcile_ollama(self.base_params(options), toggles.think, toggles.effort)
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        aggregate_stream(self.stream(request).await?).await
    }

    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream> {
        let ChatRequest { messages, options } = request;

        let mut body = self.invocation_params(&options);
        let wire: Vec<_> = messages.iter().map(to_ollama_message).collect();
        body.insert("messages".to_string(), serde_json::to_value(wire)?);

        let run = self.callbacks.start_run(&messages).await;
        let client: Arc<dyn OllamaApi> = Arc::new(RetryingOllama {
            inner: self.client.clone(),
            policy: self.retry_policy.clone(),
            handler: self.failed_attempt.clone(),
            signal: options.signal.clone(),
        });

        let chunks = stream_response_chunks(
            client,
            StreamRequest {
                body,
                model: self.model.clone(),
                check_or_pull_model: self.options.check_or_pull_model,
            },
            options.signal.clone(),
            Some(run.clone()),
        );
        Ok(track_run(chunks, run))
    }

    async fn is_available(&self) -> Result<bool> {
        match self.client.model_exists(&self.model).await {
            Ok(exists) => Ok(exists || self.options.check_or_pull_model),
            Err(_) => Ok(false),
        }
    }

    fn clone_box(&self) -> Box<dyn ChatModel> {
        Box::new(self.clone())
    }
}

/// Close the run once the stream ends: `handle_llm_end` with the full output,
/// or `handle_llm_error` on failure.
fn track_run<S>(chunks: S, run: RunManager) -> ChunkStream
where
    S: Stream<Item = LlmResult<ChatGenerationChunk>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        futures::pin_mut!(chunks);
        let mut output = String::new();
        let mut usage = None;
        let mut failed = false;

        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    output.push_str(&chunk.text);
                    if chunk.message.usage_metadata.is_some() {
                        usage = chunk.message.usage_metadata;
                    }
                    yield Ok(chunk);
                }
                Err(error) => {
                    run.handle_llm_error(&error.to_string()).await;
                    failed = true;
                    yield Err(CoreError::from(error));
                    break;
                }
            }
        }

        if !failed {
            run.handle_llm_end(&output, usage.as_ref()).await;
        }
    })
}

/// Applies the retry policy to every client call that can fail before any
/// output has been produced.
struct RetryingOllama {
    inner: Arc<dyn OllamaApi>,
    policy: RetryPolicy,
    handler: FailedAttemptHandler,
    signal: Option<AbortSignal>,
}

#[async_trait]
impl OllamaApi for RetryingOllama {
    async fn chat_stream(&self, body: Map<String, Value>) -> LlmResult<OllamaChunkStream> {
        call_with_retry(&self.policy, &self.handler, self.signal.as_ref(), || {
            self.inner.chat_stream(body.clone())
        })
        .await
    }

    async fn pull(&self, model: &str, log_progress: bool) -> LlmResult<()> {
        call_with_retry(&self.policy, &self.handler, self.signal.as_ref(), || {
            self.inner.pull(model, log_progress)
        })
        .await
    }

    async fn model_exists(&self, model: &str) -> LlmResult<bool> {
        call_with_retry(&self.policy, &self.handler, self.signal.as_ref(), || {
            self.inner.model_exists(model)
        })
        .await
    }

    fn abort(&self) {
        self.inner.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::ollama::types::OllamaChatChunk;
    use futures::stream;
    use lmchat_core::llm::ReasoningEffort;
    use lmchat_core::Message;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedOllama {
        lines: Vec<Value>,
        failures_before_success: AtomicUsize,
        requests: Mutex<Vec<Map<String, Value>>>,
    }

    impl ScriptedOllama {
        fn new(lines: Vec<Value>) -> Self {
            Self {
                lines,
                failures_before_success: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OllamaApi for ScriptedOllama {
        async fn chat_stream(&self, body: Map<String, Value>) -> LlmResult<OllamaChunkStream> {
            self.requests.lock().push(body);
            let remaining = self.failures_before_success.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_before_success.store(remaining - 1, Ordering::SeqCst);
                return Err(LlmError::ServiceUnavailable("loading model".into()));
            }
            let lines: Vec<LlmResult<OllamaChatChunk>> = self
                .lines
                .iter()
                .map(|v| serde_json::from_value(v.clone()).map_err(LlmError::from))
                .collect();
            Ok(Box::pin(stream::iter(lines)))
        }

        async fn pull(&self, _model: &str, _log_progress: bool) -> LlmResult<()> {
            Ok(())
        }

        async fn model_exists(&self, _model: &str) -> LlmResult<bool> {
            Ok(false)
        }

        fn abort(&self) {}
    }

    fn reasoning_lines() -> Vec<Value> {
        vec![
            json!({"message": {"role": "assistant", "content": "", "thinking": "Rayleigh"}, "done": false}),
            json!({"message": {"role": "assistant", "content": "Scattering"}, "done": false}),
            json!({"message": {"role": "assistant", "content": "."}, "done": true,
                   "prompt_eval_count": 10, "eval_count": 4}),
        ]
    }

    fn thinking_options() -> OllamaOptions {
        OllamaOptions {
            think: Some(true),
            reasoning_effort: Some(ReasoningEffort::Medium),
            ..Default::default()
        }
    }

    #[test]
    fn test_invocation_params_with_reasoning() {
        let model = ChatOllamaWithReasoning::new(
            Arc::new(ScriptedOllama::new(vec![])),
            "qwen3",
            thinking_options(),
        );
        let params = model.invocation_params(&CallOptions::default());
        assert_eq!(params.get("think"), Some(&json!(true)));
        assert_eq!(params.get("reasoning"), Some(&json!({"effort": "medium"})));
        assert_eq!(params.get("model"), Some(&json!("qwen3")));
    }

    #[test]
    fn test_invocation_params_base_fields() {
        let options = OllamaOptions {
            temperature: Some(0.3),
            num_ctx: Some(8192),
            keep_alive: Some("5m".into()),
            format: Some("json".into()),
            ..Default::default()
        };
        let model =
            ChatOllamaWithReasoning::new(Arc::new(ScriptedOllama::new(vec![])), "llama3.2", options);

        let params = model.invocation_params(
            &CallOptions::new()
                .with_stop(vec!["\n\n".into()])
                .with_extra("tools", json!([])),
        );
        assert_eq!(params.get("format"), Some(&json!("json")));
        assert_eq!(params.get("keep_alive"), Some(&json!("5m")));
        assert_eq!(
            params.get("options"),
            Some(&json!({"temperature": 0.3, "num_ctx": 8192, "stop": ["\n\n"]}))
        );
        assert_eq!(params.get("tools"), Some(&json!([])));
        assert!(!params.contains_key("think"));
    }

    #[test]
    fn test_call_options_can_enable_thinking() {
        let model = ChatOllamaWithReasoning::new(
            Arc::new(ScriptedOllama::new(vec![])),
            "qwen3",
            OllamaOptions::default(),
        );
        let params = model.invocation_params(
            &CallOptions::new()
                .with_think(true)
                .with_reasoning_effort(ReasoningEffort::High),
        );
        assert_eq!(params.get("reasoning"), Some(&json!({"effort": "high"})));
    }

    #[tokio::test]
    async fn test_chat_aggregates_stream() {
        let client = Arc::new(ScriptedOllama::new(reasoning_lines()));
        let model = ChatOllamaWithReasoning::new(client.clone(), "qwen3", thinking_options());

        let response = model
            .chat(ChatRequest::new(vec![
                Message::system("Be brief."),
                Message::human("Why is the sky blue?"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.message.content, "Scattering.");
        assert_eq!(response.thinking.as_deref(), Some("Rayleigh"));
        let usage = response.usage.unwrap();
        assert_eq!((usage.input_tokens, usage.output_tokens, usage.total_tokens), (10, 4, 14));

        let requests = client.requests.lock();
        let body = &requests[0];
        assert_eq!(body.get("stream"), Some(&json!(true)));
        assert_eq!(body.get("think"), Some(&json!(true)));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[tokio::test(start_paused = true)]
    async fn test_opening_stream_is_retried() {
        let client = Arc::new(ScriptedOllama::new(reasoning_lines()));
        client.failures_before_success.store(2, Ordering::SeqCst);

        let model = ChatOllamaWithReasoning::new(client.clone(), "qwen3", OllamaOptions::default())
            .with_retry_policy(RetryPolicy::new(3).with_jitter(false));
        let response = model
            .chat(ChatRequest::new(vec![Message::human("hi")]))
            .await
            .unwrap();

        assert_eq!(response.message.content, "Scattering.");
        assert_eq!(client.requests.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_returns_client_error() {
        let client = Arc::new(ScriptedOllama::new(vec![]));
        client.failures_before_success.store(5, Ordering::SeqCst);

        let model = ChatOllamaWithReasoning::new(client, "qwen3", OllamaOptions::default())
            .with_retry_policy(RetryPolicy::new(2).with_jitter(false));
        let err = model
            .chat(ChatRequest::new(vec![Message::human("hi")]))
            .await
            .unwrap_err();

        assert!(matches!(
            err.client_error::<LlmError>(),
            Some(LlmError::ServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_is_available_with_pull_enabled() {
        let client = Arc::new(ScriptedOllama::new(vec![]));
        let model = ChatOllamaWithReasoning::new(client.clone(), "qwen3", OllamaOptions::default());
        assert!(!model.is_available().await.unwrap());

        let pulling = ChatOllamaWithReasoning::new(
            client,
            "qwen3",
            OllamaOptions {
                check_or_pull_model: true,
                ..Default::default()
            },
        );
        assert!(pulling.is_available().await.unwrap());
    }
}
