//! Ollama and OpenAI chat model nodes with reasoning support.
//!
//! This crate implements the [`ChatModel`] trait from `lmchat-core` for two
//! vendors and wraps each in a workflow node:
//!
//! - **Ollama** ([`LmChatOllama`]) - local or hosted Ollama servers, streamed
//!   over NDJSON, with `think`/`reasoning` support for thinking models
//! - **OpenAI** ([`LmChatOpenAi`]) - the chat completions API, with
//!   `reasoning` effort for reasoning models
//!
//! Reasoning toggles are reconciled into the vendor request by
//! [`reasoning`]; the Ollama chunk stream is accumulated by
//! [`ollama::stream_response_chunks`].
//!
//! # Example Usage
//!
//! ## Supplying a model from a node
//!
//! ```rust,ignore
//! use lmchat_nodes::LmChatOllama;
//! use lmchat_core::llm::{ChatRequest, CallOptions};
//! use lmchat_core::{Message, NodeType};
//!
//! let node = LmChatOllama::new();
//! let supplied = node.supply_data(ctx, 0).await?;
//!
//! // `{"think": true, "reasoningEffort": "medium"}` in the node options
//! let params = supplied.response.invocation_params(&CallOptions::default());
//! assert_eq!(params["think"], true);
//!
//! let response = supplied
//!     .response
//!     .chat(ChatRequest::new(vec![Message::human("What is 17 * 23?")]))
//!     .await?;
//! println!("{}", response.message.content);
//! ```
//!
//! ## Using a client directly
//!
//! ```rust,ignore
//! use lmchat_nodes::config::{OllamaConfig, OllamaOptions};
//! use lmchat_nodes::ollama::ChatOllamaWithReasoning;
//!
//! let config = OllamaConfig::new("http://localhost:11434", "qwen3");
//! let options = OllamaOptions {
//!     think: Some(true),
//!     ..Default::default()
//! };
//! let model = ChatOllamaWithReasoning::from_config(config, options)?;
//! ```

pub mod config;
pub mod error;
pub mod failed_attempt;
pub mod nodes;
pub mod ollama;
pub mod openai;
pub mod reasoning;
pub mod tracing_callback;

// Re-export commonly used types
pub use config::{
    OllamaConfig, OllamaCredentials, OllamaOptions, OpenAiConfig, OpenAiCredentials,
    OpenAiOptions, ResponseFormat,
};
pub use error::{LlmError, Result};
pub use failed_attempt::{AttemptDecision, FailedAttemptHandler, RetryPolicy};
pub use nodes::{LmChatOllama, LmChatOpenAi};
pub use ollama::ChatOllamaWithReasoning;
pub use openai::ChatOpenAiWithReasoning;
pub use reasoning::{reconcile_ollama, reconcile_openai, ReasoningToggles};
pub use tracing_callback::LlmTracing;

// Re-export lmchat-core types for convenience
pub use lmchat_core::llm::{CallOptions, ChatModel, ChatRequest, ChatResponse, ReasoningEffort};
pub use lmchat_core::Message;
