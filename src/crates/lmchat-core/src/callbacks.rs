//! Run-tracking callbacks.
//!
//! Models own a [`CallbackManager`] and open one [`RunManager`] per call. The
//! run manager fans events out to every registered [`CallbackHandler`].
//!
//! A run keeps its input messages, so handlers receive the prompts again at
//! the end of the run and need no per-run state of their own.
//!
//! Dispatch is a side channel: a handler returning an error is logged and
//! otherwise ignored, so tracing can never interrupt the generation it is
//! observing.

use crate::llm::UsageMetadata;
use crate::messages::Message;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Receives events about model runs. Every method defaults to a no-op.
#[async_trait]
pub trait CallbackHandler: Send + Sync {
    /// Name used in log output when the handler fails.
    fn name(&self) -> &str {
        "callback"
    }

    async fn handle_llm_start(&self, _run_id: u64, _messages: &[Message]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn handle_llm_new_token(&self, _run_id: u64, _token: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// `prompts` are the messages the run was started with.
    async fn handle_llm_end(
        &self,
        _run_id: u64,
        _prompts: &[Message],
        _output: &str,
        _usage: Option<&UsageMetadata>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn handle_llm_error(&self, _run_id: u64, _error: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Set of handlers attached to a model instance.
#[derive(Clone, Default)]
pub struct CallbackManager {
    handlers: Vec<Arc<dyn CallbackHandler>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler.
    pub fn with_handler(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn add_handler(&mut self, handler: Arc<dyn CallbackHandler>) {
        self.handlers.push(handler);
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Open a run and notify handlers that it started.
    pub async fn start_run(&self, messages: &[Message]) -> RunManager {
        let run = RunManager {
            run_id: NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
            handlers: self.handlers.clone(),
            messages: messages.into(),
        };
        for handler in &run.handlers {
            if let Err(e) = handler.handle_llm_start(run.run_id, messages).await {
                warn!(handler = handler.name(), run_id = run.run_id, "handle_llm_start failed: {}", e);
            }
        }
        run
    }
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackManager")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Dispatches events for a single run.
#[derive(Clone)]
pub struct RunManager {
    run_id: u64,
    handlers: Vec<Arc<dyn CallbackHandler>>,
    messages: Arc<[Message]>,
}

impl RunManager {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// The messages the run was started with.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub async fn handle_llm_new_token(&self, token: &str) {
        for handler in &self.handlers {
            if let Err(e) = handler.handle_llm_new_token(self.run_id, token).await {
                warn!(handler = handler.name(), run_id = self.run_id, "handle_llm_new_token failed: {}", e);
            }
        }
    }

    pub async fn handle_llm_end(&self, output: &str, usage: Option<&UsageMetadata>) {
        for handler in &self.handlers {
            if let Err(e) = handler
                .handle_llm_end(self.run_id, &self.messages, output, usage)
                .await
            {
                warn!(handler = handler.name(), run_id = self.run_id, "handle_llm_end failed: {}", e);
            }
        }
    }

    pub async fn handle_llm_error(&self, error: &str) {
        for handler in &self.handlers {
            if let Err(e) = handler.handle_llm_error(self.run_id, error).await {
                warn!(handler = handler.name(), run_id = self.run_id, "handle_llm_error failed: {}", e);
            }
        }
    }
}
