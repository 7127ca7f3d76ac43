use super::{
    chat_model_codex, credentials, effort_options, host_wiring, required_credential,
    string_parameter, HINT_TARGETS,
};
use crate::config::{OllamaConfig, OllamaCredentials, OllamaOptions};
use crate::ollama::ChatOllamaWithReasoning;
use async_trait::async_trait;
use lmchat_core::node::{
    connection_hint_notice, ConnectionType, NodeProperty, PropertyOption, PropertyType,
};
use lmchat_core::{CoreError, NodeType, NodeTypeDescription, Result, SupplyData, SupplyDataContext};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const DOCS_URL: &str =
    "https://docs.n8n.io/integrations/builtin/cluster-nodes/sub-nodes/n8n-nodes-langchain.lmchatollama/";

/// The "Ollama Chat Model" node.
#[derive(Debug, Clone)]
pub struct LmChatOllama {
    description: NodeTypeDescription,
}

impl LmChatOllama {
    pub fn new() -> Self {
        Self {
            description: NodeTypeDescription {
                display_name: "Ollama Chat Model".to_string(),
                name: "lmChatOllama".to_string(),
                icon: "file:ollama.svg".to_string(),
                group: vec!["transform".to_string()],
                versions: vec![1.0],
                description: "Language Model Ollama".to_string(),
                default_name: "Ollama Chat Model".to_string(),
                codex: chat_model_codex(DOCS_URL),
                inputs: Vec::new(),
                outputs: vec![ConnectionType::AiLanguageModel],
                output_names: vec!["Model".to_string()],
                credentials: required_credential("ollamaApi"),
                properties: vec![
                    connection_hint_notice(&HINT_TARGETS),
                    model_property(),
                    options_property(),
                ],
            },
        }
    }
}

impl Default for LmChatOllama {
    fn default() -> Self {
        Self::new()
    }
}

fn model_property() -> NodeProperty {
    NodeProperty::new("Model", "model", PropertyType::Options, "llama3.2")
        .with_description(
            "The model which will generate the completion. Models are loaded from the Ollama instance.",
        )
}

fn options_property() -> NodeProperty {
    NodeProperty::new("Options", "options", PropertyType::Collection, json!({}))
        .with_placeholder("Add Option")
        .with_description("Additional options to add")
        .with_children(vec![
            NodeProperty::new("Sampling Temperature", "temperature", PropertyType::Number, 0.7)
                .with_description("Controls the randomness of the generated text"),
            NodeProperty::new("Top K", "topK", PropertyType::Number, -1)
                .with_description("Limits the number of highest probability vocabulary tokens to consider"),
            NodeProperty::new("Top P", "topP", PropertyType::Number, 1)
                .with_description("Cumulative probability threshold for nucleus sampling"),
            NodeProperty::new("Frequency Penalty", "frequencyPenalty", PropertyType::Number, 0.0),
            NodeProperty::new("Presence Penalty", "presencePenalty", PropertyType::Number, 0.0),
            NodeProperty::new("Repetition Penalty", "repeatPenalty", PropertyType::Number, 1),
            NodeProperty::new("Context Length", "numCtx", PropertyType::Number, 2048)
                .with_description("Size of the context window used to generate the next token"),
            NodeProperty::new("Max Tokens to Generate", "numPredict", PropertyType::Number, -1)
                .with_description("-1 generates until the model stops"),
            NodeProperty::new("Number of GPUs", "numGpu", PropertyType::Number, -1),
            NodeProperty::new("Number of CPU Threads", "numThread", PropertyType::Number, 0),
            NodeProperty::new("Keep Alive", "keepAlive", PropertyType::String, "5m")
                .with_description("How long the model stays loaded after the request, e.g. 5m or 1h"),
            NodeProperty::new("Output Format", "format", PropertyType::Options, "default")
                .with_options(vec![
                    PropertyOption::new("Default", "default"),
                    PropertyOption::new("JSON", "json"),
                ]),
            NodeProperty::new("Think", "think", PropertyType::Boolean, false)
                .with_description("Let thinking models reason before answering"),
            NodeProperty::new("Reasoning Effort", "reasoningEffort", PropertyType::Options, "medium")
                .with_description("How much the model should reason. Applies when Think is on.")
                .with_options(effort_options()),
        ])
}

#[async_trait]
impl NodeType for LmChatOllama {
    fn description(&self) -> &NodeTypeDescription {
        &self.description
    }

    async fn supply_data(&self, ctx: Arc<dyn SupplyDataContext>, item_index: usize) -> Result<SupplyData> {
        let creds: OllamaCredentials = credentials(&ctx, "ollamaApi").await?;
        let model_name = string_parameter(&ctx, "model", item_index)?;
        let options = OllamaOptions::from_value(ctx.parameter_or("options", item_index, json!({})))
            .map_err(|e| CoreError::configuration(format!("Invalid Ollama options: {}", e)))?;

        debug!(
            node = %ctx.node_name(),
            model = %model_name,
            base_url = %creds.base_url,
            "Supplying Ollama chat model"
        );

        let (callbacks, failed_attempt) = host_wiring(&ctx);
        let model = ChatOllamaWithReasoning::from_config(
            OllamaConfig::from_credentials(&creds, model_name),
            options,
        )?
        .with_callbacks(callbacks)
        .with_failed_attempt_handler(failed_attempt);

        Ok(SupplyData {
            response: Arc::new(model),
        })
    }
}
