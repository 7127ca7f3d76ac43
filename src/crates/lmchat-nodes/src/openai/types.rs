//! OpenAI chat completions wire types.

use lmchat_core::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiMessage {
    pub role: String,

    /// A string, or an array of content parts when images are attached.
    #[serde(default)]
    pub content: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,

    /// Reasoning text, as returned by OpenAI-compatible reasoning servers.
    #[serde(default, skip_serializing)]
    pub reasoning_content: Option<String>,
}

impl OpenAiMessage {
    /// The text content, empty when the message has none.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    pub id: String,

    #[serde(rename = "type", default = "function_type")]
    pub kind: String,

    pub function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiFunctionCall {
    pub name: String,

    /// JSON-encoded arguments.
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponse {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub model: String,

    pub choices: Vec<OpenAiChoice>,

    #[serde(default)]
    pub usage: Option<OpenAiUsage>,

    #[serde(default)]
    pub system_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoice {
    #[serde(default)]
    pub index: usize,

    pub message: OpenAiMessage,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OpenAiUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,

    #[serde(default)]
    pub total_tokens: u64,

    #[serde(default)]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CompletionTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: Option<u64>,
}

/// Convert a host message to OpenAI's chat format.
pub fn to_openai_message(msg: &Message) -> OpenAiMessage {
    let role = match &msg.role {
        MessageRole::System => "system".to_string(),
        MessageRole::Human => "user".to_string(),
        MessageRole::Assistant => "assistant".to_string(),
        MessageRole::Tool => "tool".to_string(),
        MessageRole::Custom(role) => role.clone(),
    };

    let content = if msg.images.is_empty() {
        Value::String(msg.content.clone())
    } else {
        let mut parts = vec![json!({ "type": "text", "text": msg.content })];
        parts.extend(msg.images.iter().map(|image| {
            json!({ "type": "image_url", "image_url": { "url": image_url(image) } })
        }));
        Value::Array(parts)
    };

    let tool_calls = msg.tool_calls.as_ref().map(|calls| {
        calls
            .iter()
            .map(|call| OpenAiToolCall {
                id: call.id.clone(),
                kind: function_type(),
                function: OpenAiFunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.to_string(),
                },
            })
            .collect()
    });

    OpenAiMessage {
        role,
        content,
        name: msg.name.clone(),
        tool_call_id: msg.tool_call_id.clone(),
        tool_calls,
        reasoning_content: None,
    }
}

/// Images are either URLs or bare base64 data.
fn image_url(image: &str) -> String {
    if image.starts_with("http://") || image.starts_with("https://") || image.starts_with("data:") {
        image.to_string()
    } else {
        format!("data:image/jpeg;base64,{}", image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmchat_core::ToolCall;

    #[test]
    fn test_message_conversion() {
        let msg = to_openai_message(&Message::human("Hello"));
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, json!("Hello"));

        let tool = to_openai_message(&Message::tool("72F", "call_1"));
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_tool_call_arguments_are_strings() {
        let msg = Message::assistant("")
            .with_tool_calls(vec![ToolCall::new("call_1", "weather", json!({"city": "Oslo"}))]);
        let converted = to_openai_message(&msg);
        let calls = converted.tool_calls.unwrap();
        assert_eq!(calls[0].kind, "function");
        assert_eq!(calls[0].function.arguments, r#"{"city":"Oslo"}"#);
    }

    #[test]
    fn test_images_become_content_parts() {
        let msg = Message::human("What is this?")
            .with_image("aGVsbG8=")
            .with_image("https://example.com/cat.png");
        let converted = to_openai_message(&msg);

        assert_eq!(converted.content[0]["type"], "text");
        assert_eq!(
            converted.content[1]["image_url"]["url"],
            "data:image/jpeg;base64,aGVsbG8="
        );
        assert_eq!(converted.content[2]["image_url"]["url"], "https://example.com/cat.png");
        assert_eq!(converted.text(), "What is this?");
    }

    #[test]
    fn test_reasoning_content_not_sent() {
        let mut msg = to_openai_message(&Message::assistant("x"));
        msg.reasoning_content = Some("thoughts".into());
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("reasoning_content").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let response: OpenAiResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": null},
                "finish_reason": "tool_calls"
            }],
            "usage": {
                "prompt_tokens": 9,
                "completion_tokens": 12,
                "total_tokens": 21,
                "completion_tokens_details": {"reasoning_tokens": 4}
            }
        }))
        .unwrap();

        assert_eq!(response.choices[0].message.text(), "");
        let usage = response.usage.unwrap();
        assert_eq!(usage.completion_tokens_details.unwrap().reasoning_tokens, Some(4));
    }
}
