//! Ollama wire types.

use lmchat_core::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OllamaMessage {
    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<OllamaToolCall>,

    /// Name of the tool that produced a `tool` message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaToolCall {
    pub function: OllamaFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaFunctionCall {
    pub name: String,

    #[serde(default)]
    pub arguments: Value,
}

/// One NDJSON line of a streamed `/api/chat` response.
///
/// `rest` holds every field except `message` verbatim (`model`, `created_at`,
/// `done`, `done_reason`, `prompt_eval_count`, `eval_count`, durations, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OllamaChatChunk {
    #[serde(default)]
    pub message: OllamaMessage,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl OllamaChatChunk {
    /// Prompt tokens evaluated, reported on the final line.
    pub fn prompt_eval_count(&self) -> u64 {
        count(&self.rest, "prompt_eval_count")
    }

    /// Completion tokens generated, reported on the final line.
    pub fn eval_count(&self) -> u64 {
        count(&self.rest, "eval_count")
    }

    pub fn is_done(&self) -> bool {
        self.rest.get("done").and_then(Value::as_bool).unwrap_or(false)
    }
}

pub(crate) fn count(fields: &Map<String, Value>, key: &str) -> u64 {
    fields.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// One NDJSON line of a streamed `/api/pull` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullProgress {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub digest: Option<String>,

    #[serde(default)]
    pub total: Option<u64>,

    #[serde(default)]
    pub completed: Option<u64>,
}

impl PullProgress {
    /// Completion percentage for layer downloads.
    pub fn percent(&self) -> Option<f64> {
        match (self.completed, self.total) {
            (Some(done), Some(total)) if total > 0 => Some(done as f64 * 100.0 / total as f64),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagModel {
    pub name: String,
}

/// Convert a host message to Ollama's chat format.
pub fn to_ollama_message(msg: &Message) -> OllamaMessage {
    let role = match &msg.role {
        MessageRole::System => "system".to_string(),
        MessageRole::Human => "user".to_string(),
        MessageRole::Assistant => "assistant".to_string(),
        MessageRole::Tool => "tool".to_string(),
        MessageRole::Custom(role) => role.clone(),
    };

    let tool_calls = msg
        .tool_calls
        .iter()
        .flatten()
        .map(|call| OllamaToolCall {
            function: OllamaFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        })
        .collect();

    OllamaMessage {
        role,
        content: msg.content.clone(),
        thinking: None,
        images: msg.images.clone(),
        tool_calls,
        tool_name: if msg.role == MessageRole::Tool {
            msg.name.clone()
        } else {
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmchat_core::ToolCall;
    use serde_json::json;

    #[test]
    fn test_chunk_splits_message_from_rest() {
        let chunk: OllamaChatChunk = serde_json::from_value(json!({
            "model": "qwen3",
            "created_at": "2025-01-01T00:00:00Z",
            "message": {"role": "assistant", "content": "Hi", "thinking": "hmm"},
            "done": true,
            "prompt_eval_count": 12,
            "eval_count": 3
        }))
        .unwrap();

        assert_eq!(chunk.message.content, "Hi");
        assert_eq!(chunk.message.thinking.as_deref(), Some("hmm"));
        assert!(!chunk.rest.contains_key("message"));
        assert_eq!(chunk.rest.get("model"), Some(&json!("qwen3")));
        assert_eq!(chunk.prompt_eval_count(), 12);
        assert_eq!(chunk.eval_count(), 3);
        assert!(chunk.is_done());
    }

    #[test]
    fn test_chunk_without_counts() {
        let chunk: OllamaChatChunk =
            serde_json::from_value(json!({"message": {"content": "a"}, "done": false})).unwrap();
        assert_eq!(chunk.prompt_eval_count(), 0);
        assert_eq!(chunk.eval_count(), 0);
        assert_eq!(chunk.message.role, "");
    }

    #[test]
    fn test_message_conversion_all_roles() {
        assert_eq!(to_ollama_message(&Message::system("s")).role, "system");
        assert_eq!(to_ollama_message(&Message::human("h")).role, "user");
        assert_eq!(to_ollama_message(&Message::assistant("a")).role, "assistant");

        let tool = to_ollama_message(&Message::tool("72F", "call_1").with_name("weather"));
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_name.as_deref(), Some("weather"));
    }

    #[test]
    fn test_message_conversion_tool_calls_and_images() {
        let msg = Message::assistant("")
            .with_tool_calls(vec![ToolCall::new("1", "weather", json!({"city": "Oslo"}))])
            .with_image("aGVsbG8=");

        let converted = to_ollama_message(&msg);
        assert_eq!(converted.tool_calls[0].function.name, "weather");
        assert_eq!(converted.images, vec!["aGVsbG8="]);

        let body = serde_json::to_value(&converted).unwrap();
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn test_pull_progress_percent() {
        let progress = PullProgress {
            status: "pulling".into(),
            total: Some(200),
            completed: Some(50),
            ..Default::default()
        };
        assert_eq!(progress.percent(), Some(25.0));
        assert_eq!(PullProgress::default().percent(), None);
    }
}
