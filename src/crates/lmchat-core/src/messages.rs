//! Message types exchanged between the host and chat models.
//!
//! Two families live here:
//!
//! - [`Message`] - a complete conversational message (input to a model, or a
//!   finished response).
//! - [`AiMessageChunk`] / [`ChatGenerationChunk`] - incremental pieces of a
//!   streamed response, in the normalized shape the host's callback and
//!   aggregation machinery expects.
//!
//! # Chunk aggregation
//!
//! Chunks form a monoid under [`AiMessageChunk::concat`]: content is appended,
//! and metadata or usage carried by a later chunk replaces what came before.
//! Streaming providers emit cumulative usage on their trailing chunk, so
//! "later wins" is the right merge for usage.
//!
//! String `additional_kwargs` (such as `thinking`) are appended like content;
//! other values are replaced by the later chunk. A summary chunk (one carrying
//! `response_metadata`) repeats rather than continues, so its string kwargs
//! only fill keys the stream never set.

use crate::llm::UsageMetadata;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a message sender.
///
/// Unit roles serialize to lowercase strings: `System` → `"system"`,
/// `Human` → `"human"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions.
    System,

    /// End-user input.
    Human,

    /// Model output.
    Assistant,

    /// Tool execution result.
    Tool,

    /// Application-specific role.
    Custom(String),
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier used to associate results with the call.
    pub id: String,

    /// Tool name.
    pub name: String,

    /// JSON arguments.
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A partial tool call carried by a streamed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallChunk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Arguments serialized as a JSON string.
    pub args: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

/// Base message type for conversational AI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Text content
    pub content: String,

    /// Optional participant name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Tool calls (for assistant messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Tool call ID (for tool messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Base64 image payloads attached to the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl Message {
    /// Create a new message with the given role and content
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_calls: None,
            tool_call_id: None,
            images: Vec::new(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a human message
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a tool message
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(MessageRole::Tool, content)
        }
    }

    /// Set the participant name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set tool calls (for assistant messages)
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// Attach a base64 encoded image
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.images.push(image.into());
        self
    }

    /// Get the text content
    pub fn text(&self) -> &str {
        &self.content
    }
}

/// An incremental piece of an assistant message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiMessageChunk {
    /// Text delta.
    pub content: String,

    /// Provider extras, e.g. `thinking`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_kwargs: Map<String, Value>,

    /// Raw provider response metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_metadata: Option<Map<String, Value>>,

    /// Token usage, normally only on the trailing chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_chunks: Vec<ToolCallChunk>,
}

impl AiMessageChunk {
    /// Create a chunk carrying only text.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Insert a value into `additional_kwargs`.
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional_kwargs.insert(key.into(), value.into());
        self
    }

    /// Set the response metadata.
    pub fn with_response_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.response_metadata = Some(metadata);
        self
    }

    /// Set the usage metadata.
    pub fn with_usage(mut self, usage: UsageMetadata) -> Self {
        self.usage_metadata = Some(usage);
        self
    }

    /// The `thinking` text attached to this chunk, if any.
    pub fn thinking(&self) -> Option<&str> {
        self.additional_kwargs.get("thinking").and_then(Value::as_str)
    }

    /// Merge a later chunk into this one.
    pub fn concat(mut self, other: AiMessageChunk) -> Self {
        self.content.push_str(&other.content);

        let summary = other.response_metadata.is_some();
        for (key, value) in other.additional_kwargs {
            if let (Some(Value::String(existing)), Value::String(more)) =
                (self.additional_kwargs.get_mut(&key), &value)
            {
                if !summary {
                    existing.push_str(more);
                }
                continue;
            }
            self.additional_kwargs.insert(key, value);
        }

        if other.response_metadata.is_some() {
            self.response_metadata = other.response_metadata;
        }
        if other.usage_metadata.is_some() {
            self.usage_metadata = other.usage_metadata;
        }
        self.tool_call_chunks.extend(other.tool_call_chunks);
        self
    }

    /// Finalize into a complete assistant [`Message`].
    ///
    /// Tool call chunks whose arguments do not parse as JSON are kept with the
    /// raw string as their argument value.
    pub fn into_message(self) -> Message {
        let tool_calls: Vec<ToolCall> = self
            .tool_call_chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let arguments = serde_json::from_str(&chunk.args)
                    .unwrap_or_else(|_| Value::String(chunk.args.clone()));
                ToolCall::new(
                    chunk.id.unwrap_or_else(|| format!("call_{}", i)),
                    chunk.name.unwrap_or_default(),
                    arguments,
                )
            })
            .collect();

        let message = Message::assistant(self.content);
        if tool_calls.is_empty() {
            message
        } else {
            message.with_tool_calls(tool_calls)
        }
    }
}

/// One unit of streamed generation output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatGenerationChunk {
    /// Text emitted by this chunk.
    pub text: String,

    /// Normalized message delta.
    pub message: AiMessageChunk,
}

impl ChatGenerationChunk {
    /// Create a chunk whose text mirrors the message content.
    pub fn new(message: AiMessageChunk) -> Self {
        Self {
            text: message.content.clone(),
            message,
        }
    }

    /// Create a chunk with explicit text.
    pub fn with_text(text: impl Into<String>, message: AiMessageChunk) -> Self {
        Self {
            text: text.into(),
            message,
        }
    }

    /// Merge a later chunk into this one.
    pub fn concat(mut self, other: ChatGenerationChunk) -> Self {
        self.text.push_str(&other.text);
        self.message = self.message.concat(other.message);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_constructors() {
        let msg = Message::human("Hello");
        assert_eq!(msg.role, MessageRole::Human);
        assert_eq!(msg.text(), "Hello");

        let tool = Message::tool("42", "call_1");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_value(MessageRole::Human).unwrap(), json!("human"));
        assert_eq!(serde_json::to_value(MessageRole::System).unwrap(), json!("system"));
    }

    #[test]
    fn test_chunk_concat_appends_content_and_prefers_later_metadata() {
        let first = AiMessageChunk::new("Hel").with_kwarg("thinking", "a");
        let mut meta = Map::new();
        meta.insert("done".into(), json!(true));
        let second = AiMessageChunk::new("lo")
            .with_kwarg("thinking", "b")
            .with_response_metadata(meta.clone())
            .with_usage(UsageMetadata::new(3, 4));

        let merged = first.concat(second);
        assert_eq!(merged.content, "Hello");
        assert_eq!(merged.thinking(), Some("a"));
        assert_eq!(merged.response_metadata, Some(meta));
        assert_eq!(merged.usage_metadata.unwrap().total_tokens, 7);
    }

    #[test]
    fn test_concat_joins_thinking_pieces() {
        let mut meta = Map::new();
        meta.insert("done".into(), json!(true));
        let merged = AiMessageChunk::new("")
            .with_kwarg("thinking", "The sky ")
            .concat(AiMessageChunk::new("").with_kwarg("thinking", "scatters "))
            .concat(AiMessageChunk::new("Blue.").with_kwarg("thinking", "blue light."))
            .concat(
                AiMessageChunk::new("")
                    .with_kwarg("thinking", "blue light.")
                    .with_response_metadata(meta),
            );

        assert_eq!(merged.content, "Blue.");
        assert_eq!(merged.thinking(), Some("The sky scatters blue light."));
    }

    #[test]
    fn test_concat_replaces_non_string_kwargs() {
        let merged = AiMessageChunk::new("")
            .with_kwarg("refusal", json!(null))
            .with_kwarg("tier", 1)
            .concat(AiMessageChunk::new("").with_kwarg("tier", 2).with_kwarg("refusal", "no"));

        assert_eq!(merged.additional_kwargs["tier"], json!(2));
        assert_eq!(merged.additional_kwargs["refusal"], json!("no"));
    }

    #[test]
    fn test_summary_kwargs_fill_missing_keys() {
        let merged = AiMessageChunk::new("Hi").concat(
            AiMessageChunk::new("")
                .with_kwarg("thinking", "short")
                .with_response_metadata(Map::new()),
        );
        assert_eq!(merged.thinking(), Some("short"));
    }

    #[test]
    fn test_concat_keeps_earlier_usage_when_later_has_none() {
        let first = AiMessageChunk::new("a").with_usage(UsageMetadata::new(1, 1));
        let merged = first.concat(AiMessageChunk::new("b"));
        assert_eq!(merged.usage_metadata, Some(UsageMetadata::new(1, 1)));
    }

    #[test]
    fn test_into_message_parses_tool_call_args() {
        let mut chunk = AiMessageChunk::new("");
        chunk.tool_call_chunks.push(ToolCallChunk {
            id: Some("call_7".into()),
            name: Some("weather".into()),
            args: r#"{"city":"Oslo"}"#.into(),
            index: Some(0),
        });

        let message = chunk.into_message();
        let calls = message.tool_calls.unwrap();
        assert_eq!(calls[0].id, "call_7");
        assert_eq!(calls[0].arguments, json!({"city": "Oslo"}));
    }

    #[test]
    fn test_generation_chunk_text_mirrors_content() {
        let chunk = ChatGenerationChunk::new(AiMessageChunk::new("hi"));
        assert_eq!(chunk.text, "hi");

        let merged = chunk.concat(ChatGenerationChunk::with_text("", AiMessageChunk::new("")));
        assert_eq!(merged.text, "hi");
    }
}
