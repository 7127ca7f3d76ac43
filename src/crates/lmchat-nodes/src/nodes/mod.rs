//! Workflow host nodes that supply chat models.
//!
//! Each node pairs its editor description with a `supply_data` factory that
//! reads credentials and parameters from the host and builds a chat model
//! wired to the host's execution log.

mod ollama;
mod openai;

pub use ollama::LmChatOllama;
pub use openai::LmChatOpenAi;

use crate::failed_attempt::FailedAttemptHandler;
use crate::tracing_callback::LlmTracing;
use lmchat_core::node::{Codex, ConnectionType, CredentialRequirement, PropertyOption};
use lmchat_core::{CallbackManager, CoreError, Result, SupplyDataContext};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolve and parse the credentials of type `kind`.
async fn credentials<T: DeserializeOwned>(ctx: &Arc<dyn SupplyDataContext>, kind: &str) -> Result<T> {
    let value = ctx.get_credentials(kind).await?;
    serde_json::from_value(value).map_err(|e| CoreError::Credentials(format!("{}: {}", kind, e)))
}

/// A required string parameter.
fn string_parameter(ctx: &Arc<dyn SupplyDataContext>, name: &str, item_index: usize) -> Result<String> {
    match ctx.required_parameter(name, item_index)? {
        serde_json::Value::String(value) if !value.is_empty() => Ok(value),
        other => Err(CoreError::configuration(format!(
            "Parameter '{}' must be a non-empty string, got {}",
            name, other
        ))),
    }
}

/// Callbacks and retry reporting wired to the host.
fn host_wiring(ctx: &Arc<dyn SupplyDataContext>) -> (CallbackManager, FailedAttemptHandler) {
    let callbacks = CallbackManager::new().with_handler(Arc::new(LlmTracing::new(ctx.clone())));
    (callbacks, FailedAttemptHandler::reporting_to(ctx.clone()))
}

fn chat_model_codex(documentation: &str) -> Codex {
    let mut subcategories = BTreeMap::new();
    subcategories.insert(
        "AI".to_string(),
        vec!["Language Models".to_string(), "Root Nodes".to_string()],
    );
    subcategories.insert(
        "Language Models".to_string(),
        vec!["Chat Models (Recommended)".to_string()],
    );
    Codex {
        categories: vec!["AI".to_string()],
        subcategories,
        primary_documentation: vec![documentation.to_string()],
    }
}

fn required_credential(name: &str) -> Vec<CredentialRequirement> {
    vec![CredentialRequirement {
        name: name.to_string(),
        required: true,
    }]
}

fn effort_options() -> Vec<PropertyOption> {
    vec![
        PropertyOption::new("Low", "low"),
        PropertyOption::new("Medium", "medium"),
        PropertyOption::new("High", "high"),
    ]
}

/// Chat model sub-nodes connect to chains and agents.
const HINT_TARGETS: [ConnectionType; 2] = [ConnectionType::AiChain, ConnectionType::AiAgent];
