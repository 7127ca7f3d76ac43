//! Reports model runs to the host's execution log.

use async_trait::async_trait;
use lmchat_core::llm::UsageMetadata;
use lmchat_core::node::AiEvent;
use lmchat_core::{CallbackHandler, Message, SupplyDataContext};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Rough characters-per-token ratio for estimating usage when the provider
/// reports none.
const CHARS_PER_TOKEN: usize = 4;

/// Callback handler that logs each run through `tracing` and reports its
/// outcome to the host as `ai-llm-generated-output` or `ai-llm-errored`.
///
/// Holds no per-run state; prompts arrive with the end event.
pub struct LlmTracing {
    ctx: Arc<dyn SupplyDataContext>,
}

impl LlmTracing {
    pub fn new(ctx: Arc<dyn SupplyDataContext>) -> Self {
        Self { ctx }
    }

    fn estimate_tokens(prompts: &[Message], output: &str) -> UsageMetadata {
        let prompt_chars: usize = prompts.iter().map(|m| m.content.len()).sum();
        UsageMetadata::new(
            (prompt_chars / CHARS_PER_TOKEN) as u64,
            (output.len() / CHARS_PER_TOKEN) as u64,
        )
    }
}

#[async_trait]
impl CallbackHandler for LlmTracing {
    fn name(&self) -> &str {
        "llm-tracing"
    }

    async fn handle_llm_start(&self, run_id: u64, messages: &[Message]) -> anyhow::Result<()> {
        debug!(run_id, node = %self.ctx.node_name(), messages = messages.len(), "LLM run started");
        Ok(())
    }

    async fn handle_llm_new_token(&self, run_id: u64, token: &str) -> anyhow::Result<()> {
        trace!(run_id, token, "LLM token");
        Ok(())
    }

    async fn handle_llm_end(
        &self,
        run_id: u64,
        prompts: &[Message],
        output: &str,
        usage: Option<&UsageMetadata>,
    ) -> anyhow::Result<()> {
        let (usage_key, usage) = match usage {
            Some(usage) => ("tokenUsage", *usage),
            None => ("tokenUsageEstimate", Self::estimate_tokens(prompts, output)),
        };
        info!(
            run_id,
            node = %self.ctx.node_name(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            total_tokens = usage.total_tokens,
            "LLM run finished"
        );

        let messages: Vec<Value> = prompts
            .iter()
            .map(|m| json!({ "role": m.role, "content": m.content }))
            .collect();
        self.ctx.log_ai_event(
            AiEvent::LlmGeneratedOutput,
            json!({
                "messages": messages,
                "response": {
                    "generations": [{ "text": output }],
                    usage_key: {
                        "promptTokens": usage.input_tokens,
                        "completionTokens": usage.output_tokens,
                        "totalTokens": usage.total_tokens,
                    },
                },
            }),
        );
        Ok(())
    }

    async fn handle_llm_error(&self, run_id: u64, error: &str) -> anyhow::Result<()> {
        debug!(run_id, node = %self.ctx.node_name(), "LLM run errored: {}", error);
        self.ctx
            .log_ai_event(AiEvent::LlmErrored, json!({ "error": error, "runId": run_id }));
        Ok(())
    }
}
