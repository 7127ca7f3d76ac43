//! Reasoning parameter reconciliation.
//!
//! Each vendor exposes "thinking" through different request fields. These
//! functions take the already-built base parameters of a request and inject
//! the vendor fields for the user's toggles. They never fail: an absent toggle
//! means the feature is off, and keys unrelated to reasoning pass through
//! untouched.
//!
//! | vendor | precondition                       | injected                                  |
//! |--------|------------------------------------|-------------------------------------------|
//! | Ollama | `think == true` and effort present | `think: true`, `reasoning: {effort}`      |
//! | OpenAI | effort present                     | `reasoning: {effort}`                     |

use lmchat_core::llm::{CallOptions, ReasoningEffort};
use serde_json::{json, Map, Value};

/// Inject Ollama reasoning fields.
///
/// Both toggles are required. `think: true` without an effort, or an effort
/// with thinking off, leaves `params` unchanged.
pub fn reconcile_ollama(
    mut params: Map<String, Value>,
    think: Option<bool>,
    effort: Option<ReasoningEffort>,
) -> Map<String, Value> {
    if let (Some(true), Some(effort)) = (think, effort) {
        params.insert("think".to_string(), Value::Bool(true));
        params.insert("reasoning".to_string(), effort_object(effort));
    }
    params
}

/// Inject OpenAI reasoning fields. The effort alone is enough.
pub fn reconcile_openai(
    mut params: Map<String, Value>,
    effort: Option<ReasoningEffort>,
) -> Map<String, Value> {
    if let Some(effort) = effort {
        params.insert("reasoning".to_string(), effort_object(effort));
    }
    params
}

fn effort_object(effort: ReasoningEffort) -> Value {
    json!({ "effort": effort.as_str() })
}

/// The toggles in force for one call: call options override what the model
/// was configured with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReasoningToggles {
    pub think: Option<bool>,
    pub effort: Option<ReasoningEffort>,
}

impl ReasoningToggles {
    pub fn new(think: Option<bool>, effort: Option<ReasoningEffort>) -> Self {
        Self { think, effort }
    }

    /// Overlay the call's toggles on these defaults.
    pub fn resolve(&self, options: &CallOptions) -> ReasoningToggles {
        ReasoningToggles {
            think: options.think.or(self.think),
            effort: options.reasoning_effort.or(self.effort),
        }
    }
}
