//! OpenAI chat model with reasoning effort.

use super::client::{OpenAiApi, OpenAiHttpClient};
use super::types::{to_openai_message, OpenAiResponse};
use crate::config::{OpenAiConfig, OpenAiOptions};
use crate::error::{LlmError, Result as LlmResult};
use crate::failed_attempt::{call_with_retry, FailedAttemptHandler, RetryPolicy};
use crate::reasoning::{reconcile_openai, ReasoningToggles};
use async_trait::async_trait;
use futures::stream;
use lmchat_core::llm::{CallOptions, ChatModel, ChatRequest, ChatResponse, ChunkStream, UsageMetadata};
use lmchat_core::{
    AiMessageChunk, CallbackManager, ChatGenerationChunk, CoreError, Message, Result, ToolCall,
    ToolCallChunk,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// OpenAI chat model.
///
/// Requests are non-streaming; [`ChatModel::stream`] yields the completed
/// response as one chunk followed by a chunk carrying usage and metadata.
#[derive(Clone)]
pub struct ChatOpenAiWithReasoning {
    client: Arc<dyn OpenAiApi>,
    model: String,
    options: OpenAiOptions,
    callbacks: CallbackManager,
    retry_policy: RetryPolicy,
    failed_attempt: FailedAttemptHandler,
}

impl ChatOpenAiWithReasoning {
    pub fn new(client: Arc<dyn OpenAiApi>, model: impl Into<String>, options: OpenAiOptions) -> Self {
        Self {
            client,
            model: model.into(),
            options,
            callbacks: CallbackManager::new(),
            retry_policy: RetryPolicy::default(),
            failed_attempt: FailedAttemptHandler::new(),
        }
    }

    /// Build over an [`OpenAiHttpClient`] for `config`.
    pub fn from_config(config: OpenAiConfig, options: OpenAiOptions) -> LlmResult<Self> {
        let model = config.model.clone();
        let retry_policy = RetryPolicy::from_max_retries(config.max_retries);
        let client = OpenAiHttpClient::new(config)?;
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

    pub fn options(&self) -> &OpenAiOptions {
        &self.options
    }

    fn base_params(&self, call: &CallOptions) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("model".to_string(), json!(self.model));

        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                params.insert(key.to_string(), value);
            }
        };
        put("temperature", self.options.temperature.map(Value::from));
        put("top_p", self.options.top_p.map(Value::from));
        put("frequency_penalty", self.options.frequency_penalty.map(Value::from));
        put("presence_penalty", self.options.presence_penalty.map(Value::from));
        put("max_tokens", self.options.effective_max_tokens().map(Value::from));
        put(
            "response_format",
            self.options.response_format.map(|format| json!({ "type": format })),
        );
        put("stop", (!call.stop.is_empty()).then(|| json!(call.stop)));

        for (key, value) in self.options.extra.iter().chain(call.extra.iter()) {
            params.insert(key.clone(), value.clone());
        }
        params
    }

    async fn complete(&self, messages: &[Message], options: &CallOptions) -> LlmResult<OpenAiResponse> {
        if options.is_aborted() {
            return Err(LlmError::Aborted);
        }

        let mut body = self.invocation_params(options);
        let wire: Vec<_> = messages.iter().map(to_openai_message).collect();
        body.insert("messages".to_string(), serde_json::to_value(wire)?);

        call_with_retry(&self.retry_policy, &self.failed_attempt, options.signal.as_ref(), || {
            self.client.chat_completion(body.clone())
        })
        .await
    }
}

/// Map a completion onto the host's response shape.
fn into_chat_response(response: OpenAiResponse) -> LlmResult<ChatResponse> {
    let OpenAiResponse {
        id,
        model,
        choices,
        usage,
        system_fingerprint,
    } = response;

    let choice = choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("Response contained no choices".into()))?;

    let mut message = Message::assistant(choice.message.text());
    if let Some(calls) = &choice.message.tool_calls {
        let calls = calls
            .iter()
            .map(|call| {
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));
                ToolCall::new(call.id.clone(), call.function.name.clone(), arguments)
            })
            .collect();
        message = message.with_tool_calls(calls);
    }

    let mut metadata = Map::new();
    metadata.insert("id".to_string(), json!(id));
    metadata.insert("model".to_string(), json!(model));
    if let Some(reason) = choice.finish_reason {
        metadata.insert("finish_reason".to_string(), json!(reason));
    }
    if let Some(fingerprint) = system_fingerprint {
        metadata.insert("system_fingerprint".to_string(), json!(fingerprint));
    }
    if let Some(reasoning_tokens) = usage
        .and_then(|u| u.completion_tokens_details)
        .and_then(|d| d.reasoning_tokens)
    {
        metadata.insert("reasoning_tokens".to_string(), json!(reasoning_tokens));
    }

    Ok(ChatResponse {
        message,
        usage: usage.map(|u| UsageMetadata::new(u.prompt_tokens, u.completion_tokens)),
        thinking: choice.message.reasoning_content.filter(|t| !t.is_empty()),
        metadata,
    })
}

/// Split a completed response into a content chunk and a usage chunk.
fn into_chunks(response: ChatResponse) -> Vec<ChatGenerationChunk> {
    let ChatResponse {
        message,
        usage,
        thinking,
        metadata,
    } = response;

    let mut content = AiMessageChunk::new(message.content.clone());
    content.tool_call_chunks = message
        .tool_calls
        .iter()
        .flatten()
        .enumerate()
        .map(|(index, call)| ToolCallChunk {
            id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            args: call.arguments.to_string(),
            index: Some(index),
        })
        .collect();
    if let Some(thinking) = thinking {
        content = content.with_kwarg("thinking", thinking);
    }

    let mut summary = AiMessageChunk::new("").with_response_metadata(metadata);
    summary.usage_metadata = usage;

    vec![
        ChatGenerationChunk::new(content),
        ChatGenerationChunk::new(summary),
    ]
}

#[async_trait]
impl ChatModel for ChatOpenAiWithReasoning {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn invocation_params(&self, options: &CallOptions) -> Map<String, Value> {
        let toggles = ReasoningToggles::new(None, self.options.reasoning_effort).resolve(options);
        reconcile_openai(self.base_params(options), toggles.effort)
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let run = self.callbacks.start_run(&request.messages).await;

        let result = self
            .complete(&request.messages, &request.options)
            .await
            .and_then(into_chat_response);

        match result {
            Ok(response) => {
                debug!(model = %self.model, usage = ?response.usage, "OpenAI completion received");
                run.handle_llm_end(&response.message.content, response.usage.as_ref())
                    .await;
                Ok(response)
            }
            Err(error) => {
                run.handle_llm_error(&error.to_string()).await;
                Err(CoreError::from(error))
            }
        }
    }

    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream> {
        let response = self.chat(request).await?;
        let chunks: Vec<Result<ChatGenerationChunk>> = into_chunks(response).into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn clone_box(&self) -> Box<dyn ChatModel> {
        Box::new(self.clone())
    }
}
