//! Chat model traits and types.
//!
//! The host depends only on this module; vendor crates implement
//! [`ChatModel`] and return it from their node's `supply_data`.
//!
//! - [`ChatModel`] - the trait to implement
//! - [`CallOptions`] / [`ChatRequest`] - per-call input, including the abort
//!   signal and reasoning toggles
//! - [`ChatResponse`] / [`ChunkStream`] - complete and streamed output
//! - [`UsageMetadata`] - token accounting

pub mod config;
pub mod response;
pub mod traits;

pub use config::{CallOptions, ChatRequest, ReasoningEffort};
pub use response::{aggregate_stream, ChatResponse, ChunkStream, UsageMetadata};
pub use traits::ChatModel;
