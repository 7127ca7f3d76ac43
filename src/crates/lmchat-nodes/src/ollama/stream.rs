//! Accumulation of Ollama's streamed chat chunks.
//!
//! [`stream_response_chunks`] re-emits every line of an `/api/chat` stream as a
//! normalized [`ChatGenerationChunk`] and then one synthetic trailing chunk
//! carrying what only makes sense for the whole call: the summed token usage,
//! the last thinking text and the last line's metadata.
//!
//! ```text
//! client line 1 ──► chunk 1 ──► run.handle_llm_new_token
//! client line 2 ──► chunk 2 ──► run.handle_llm_new_token
//!      ...
//! (exhausted)   ──► trailing chunk { text: "", thinking, response_metadata, usage }
//! ```

use super::client::OllamaApi;
use super::types::{count, OllamaMessage};
use crate::error::Result;
use futures::{Stream, StreamExt};
use lmchat_core::llm::UsageMetadata;
use lmchat_core::{AbortSignal, AiMessageChunk, ChatGenerationChunk, RunManager, ToolCallChunk};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Running token totals for one streaming call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageAccumulator {
    usage: UsageMetadata,
}

impl UsageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the counters of one chunk's non-message fields. Missing counters
    /// count as zero.
    pub fn record(&mut self, rest: &Map<String, Value>) {
        self.usage
            .add(count(rest, "prompt_eval_count"), count(rest, "eval_count"));
    }

    pub fn snapshot(&self) -> UsageMetadata {
        self.usage
    }
}

/// One streaming chat call against an Ollama client.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Complete request body, reasoning fields included. `stream` is forced on.
    pub body: Map<String, Value>,
    pub model: String,
    /// Pull `model` first if the server does not have it.
    pub check_or_pull_model: bool,
}

/// Convert an Ollama message into the host's chunk shape: content plus one
/// tool call chunk per tool call.
pub fn convert_ollama_message(message: &OllamaMessage) -> AiMessageChunk {
    let mut chunk = AiMessageChunk::new(message.content.clone());
    chunk.tool_call_chunks = message
        .tool_calls
        .iter()
        .enumerate()
        .map(|(index, call)| ToolCallChunk {
            id: None,
            name: Some(call.function.name.clone()),
            args: call.function.arguments.to_string(),
            index: Some(index),
        })
        .collect();
    chunk
}

/// Thinking text of one line: the message's own field wins over a top-level
/// one, and an empty string counts as none.
fn chunk_thinking(message: &OllamaMessage, rest: &Map<String, Value>) -> Option<String> {
    let thinking = match &message.thinking {
        Some(thinking) => Some(thinking.clone()),
        None => rest.get("thinking").and_then(Value::as_str).map(str::to_string),
    };
    thinking.filter(|t| !t.is_empty())
}

/// Stream a chat call, yielding one chunk per received line and a final
/// summary chunk.
///
/// Nothing happens until the stream is first polled. The model check and pull
/// run before the request is opened, at most once. If `signal` is aborted, the
/// client is asked to abort after the next line arrives; the stream then ends
/// once the client stops producing lines, and the summary chunk still follows.
/// Callback failures are logged by the run manager and never end the stream.
pub fn stream_response_chunks(
    client: Arc<dyn OllamaApi>,
    request: StreamRequest,
    signal: Option<AbortSignal>,
    run_manager: Option<RunManager>,
) -> impl Stream<Item = Result<ChatGenerationChunk>> + Send {
    async_stream::try_stream! {
        let StreamRequest { mut body, model, check_or_pull_model } = request;

        if check_or_pull_model && !client.model_exists(&model).await? {
            info!(model = %model, "Model not found locally, pulling");
            client.pull(&model, true).await?;
        }

        body.insert("stream".to_string(), Value::Bool(true));
        let mut lines = client.chat_stream(body).await?;

        let mut usage = UsageAccumulator::new();
        let mut last_metadata: Option<Map<String, Value>> = None;
        let mut last_thinking: Option<String> = None;
        let mut lines_seen = 0usize;

        while let Some(line) = lines.next().await {
            let line = line?;
            lines_seen += 1;

            if signal.as_ref().map_or(false, AbortSignal::is_aborted) {
                debug!(model = %model, "Abort requested, cancelling Ollama request");
                client.abort();
            }

            let thinking = chunk_thinking(&line.message, &line.rest);
            usage.record(&line.rest);
            if let Some(text) = &thinking {
                last_thinking = Some(text.clone());
            }

            let mut message = convert_ollama_message(&line.message);
            if let Some(text) = thinking {
                message = message.with_kwarg("thinking", text);
            }
            last_metadata = Some(line.rest);

            let text = line.message.content;
            yield ChatGenerationChunk::with_text(text.clone(), message);

            if let Some(run) = &run_manager {
                run.handle_llm_new_token(&text).await;
            }
        }

        let total = usage.snapshot();
        debug!(
            model = %model,
            lines = lines_seen,
            input_tokens = total.input_tokens,
            output_tokens = total.output_tokens,
            "Ollama stream finished"
        );

        let mut summary = AiMessageChunk::new("").with_usage(total);
        if let Some(text) = last_thinking {
            summary = summary.with_kwarg("thinking", text);
        }
        summary.response_metadata = last_metadata;
        yield ChatGenerationChunk::with_text("", summary);
    }
}
