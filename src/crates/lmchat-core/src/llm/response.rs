//! Response types returned by chat models.

use crate::error::Result;
use crate::messages::{ChatGenerationChunk, Message};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;

/// Lazy sequence of generation chunks produced by a streaming call.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatGenerationChunk>> + Send>>;

/// Token usage for one call.
///
/// `total_tokens` always equals `input_tokens + output_tokens`; build values
/// through [`UsageMetadata::new`] or [`UsageMetadata::add`] to keep it so.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl UsageMetadata {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }

    /// Add counts and recompute the total.
    pub fn add(&mut self, input_tokens: u64, output_tokens: u64) {
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
        self.total_tokens = self.input_tokens + self.output_tokens;
    }
}

/// A complete (non-streamed) chat response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The assistant message.
    pub message: Message,

    /// Token usage, when the provider reported it.
    pub usage: Option<UsageMetadata>,

    /// Reasoning text, for thinking models.
    pub thinking: Option<String>,

    /// Raw provider metadata.
    pub metadata: Map<String, Value>,
}

/// Drain a chunk stream into a single [`ChatResponse`].
///
/// The first error ends aggregation and is returned as-is.
pub async fn aggregate_stream(mut stream: ChunkStream) -> Result<ChatResponse> {
    let mut merged: Option<ChatGenerationChunk> = None;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        merged = Some(match merged {
            Some(acc) => acc.concat(chunk),
            None => chunk,
        });
    }

    let message = merged.unwrap_or_default().message;
    let thinking = message.thinking().map(str::to_string);
    let usage = message.usage_metadata;
    let metadata = message.response_metadata.clone().unwrap_or_default();

    Ok(ChatResponse {
        message: message.into_message(),
        usage,
        thinking,
        metadata,
    })
}
