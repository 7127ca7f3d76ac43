//! Ollama: HTTP client, stream accumulation and the chat model adapter.

pub mod chat_model;
pub mod client;
pub mod stream;
pub mod types;

pub use chat_model::ChatOllamaWithReasoning;
pub use client::{OllamaApi, OllamaChunkStream, OllamaHttpClient};
pub use stream::{convert_ollama_message, stream_response_chunks, StreamRequest, UsageAccumulator};
pub use types::{OllamaChatChunk, OllamaMessage};
