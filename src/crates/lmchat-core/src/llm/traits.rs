//! The chat model contract the host programs against.
//!
//! A node's `supply_data` returns an `Arc<dyn ChatModel>`; chains and agents
//! then call it without knowing which vendor sits behind it.
//!
//! # Example Implementation
//!
//! ```rust,ignore
//! use lmchat_core::llm::{CallOptions, ChatModel, ChatRequest, ChatResponse, ChunkStream};
//! use async_trait::async_trait;
//!
//! #[derive(Clone)]
//! struct EchoModel;
//!
//! #[async_trait]
//! impl ChatModel for EchoModel {
//!     fn model_name(&self) -> &str { "echo" }
//!
//!     fn invocation_params(&self, _options: &CallOptions) -> serde_json::Map<String, serde_json::Value> {
//!         serde_json::Map::new()
//!     }
//!
//!     async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> { todo!() }
//!     async fn stream(&self, request: ChatRequest) -> Result<ChunkStream> { todo!() }
//!
//!     fn clone_box(&self) -> Box<dyn ChatModel> { Box::new(self.clone()) }
//! }
//! ```

use crate::error::Result;
use crate::llm::config::{CallOptions, ChatRequest};
use crate::llm::response::{ChatResponse, ChunkStream};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Core trait for chat-based language models.
///
/// # Threading and Safety
///
/// Implementations must be `Send + Sync`; the host shares them as
/// `Arc<dyn ChatModel>` across concurrently running workflow nodes.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Identifier of the model this instance talks to.
    fn model_name(&self) -> &str;

    /// The vendor request parameters a call with `options` would send,
    /// excluding the messages themselves.
    ///
    /// Must be pure: calling it has no effect on the model or the network.
    fn invocation_params(&self, options: &CallOptions) -> Map<String, Value>;

    /// Generate a complete response.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Stream a response chunk by chunk.
    ///
    /// The returned stream is lazy; no chunk is requested from the vendor until
    /// it is polled.
    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream>;

    /// Check if the model/provider is reachable.
    ///
    /// Default implementation assumes availability.
    async fn is_available(&self) -> Result<bool> {
        Ok(true)
    }

    /// Clone this model into a boxed trait object.
    fn clone_box(&self) -> Box<dyn ChatModel>;
}

impl Clone for Box<dyn ChatModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
