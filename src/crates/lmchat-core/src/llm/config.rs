//! Per-call configuration for chat model requests.
//!
//! [`CallOptions`] carries everything that may vary between two calls to the
//! same model instance: the abort signal, the reasoning toggles, stop
//! sequences, and a passthrough map for vendor keys this layer does not know
//! about. Options set here override whatever the model was constructed with.

use crate::messages::Message;
use crate::signal::AbortSignal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// How hard a reasoning-capable model should think.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(ReasoningEffort::Low),
            "medium" => Ok(ReasoningEffort::Medium),
            "high" => Ok(ReasoningEffort::High),
            other => Err(format!("unknown reasoning effort: {}", other)),
        }
    }
}

/// Options for a single model call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Cancellation signal polled while streaming.
    pub signal: Option<AbortSignal>,

    /// Request model "thinking" output.
    pub think: Option<bool>,

    /// Requested reasoning effort.
    pub reasoning_effort: Option<ReasoningEffort>,

    /// Sequences that stop generation.
    pub stop: Vec<String>,

    /// Vendor keys merged verbatim into the request body.
    pub extra: Map<String, Value>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an abort signal.
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Enable or disable thinking output.
    pub fn with_think(mut self, think: bool) -> Self {
        self.think = Some(think);
        self
    }

    /// Set the reasoning effort.
    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    /// Set stop sequences.
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    /// Add a passthrough key.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Whether the attached signal (if any) has fired.
    pub fn is_aborted(&self) -> bool {
        self.signal.as_ref().map_or(false, AbortSignal::is_aborted)
    }
}

/// A request to a chat model.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Conversation so far.
    pub messages: Vec<Message>,

    /// Per-call options.
    pub options: CallOptions,
}

impl ChatRequest {
    /// Create a request with default options.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            options: CallOptions::default(),
        }
    }

    /// Replace the call options.
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }
}
