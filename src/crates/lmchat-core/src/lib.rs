//! Host-side contracts for lmchat.
//!
//! This crate defines what a workflow host expects from a chat model node,
//! without any vendor code:
//!
//! - [`llm`] - the [`ChatModel`](llm::ChatModel) trait, call options, usage
//!   accounting and chunk streams
//! - [`messages`] - conversation messages and normalized stream chunks
//! - [`callbacks`] - run-tracking handlers fed while a model generates
//! - [`signal`] - cooperative abort signals
//! - [`node`] - node metadata and the `supply_data` factory contract
//!
//! Vendor adapters live in `lmchat-nodes`.
//!
//! # Example
//!
//! ```rust,ignore
//! use lmchat_core::llm::{CallOptions, ChatRequest};
//! use lmchat_core::Message;
//! use futures::StreamExt;
//!
//! let supplied = node.supply_data(ctx, 0).await?;
//! let mut stream = supplied
//!     .response
//!     .stream(ChatRequest::new(vec![Message::human("Why is the sky blue?")]))
//!     .await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.text);
//! }
//! ```

pub mod callbacks;
pub mod error;
pub mod llm;
pub mod messages;
pub mod node;
pub mod signal;

pub use callbacks::{CallbackHandler, CallbackManager, RunManager};
pub use error::{CoreError, Result};
pub use messages::{AiMessageChunk, ChatGenerationChunk, Message, MessageRole, ToolCall, ToolCallChunk};
pub use node::{NodeType, NodeTypeDescription, SupplyData, SupplyDataContext};
pub use signal::{AbortController, AbortSignal};
