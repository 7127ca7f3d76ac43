//! OpenAI: chat completions client and the chat model adapter.

pub mod chat_model;
pub mod client;
pub mod types;

pub use chat_model::ChatOpenAiWithReasoning;
pub use client::{OpenAiApi, OpenAiHttpClient};
pub use types::{OpenAiMessage, OpenAiResponse};
