use super::{
    chat_model_codex, credentials, effort_options, host_wiring, required_credential,
    string_parameter, HINT_TARGETS,
};
use crate::config::{OpenAiConfig, OpenAiCredentials, OpenAiOptions, DEFAULT_OPENAI_URL};
use crate::openai::ChatOpenAiWithReasoning;
use async_trait::async_trait;
use lmchat_core::node::{
    connection_hint_notice, ConnectionType, NodeProperty, PropertyOption, PropertyType,
};
use lmchat_core::{CoreError, NodeType, NodeTypeDescription, Result, SupplyData, SupplyDataContext};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const DOCS_URL: &str =
    "https://docs.n8n.io/integrations/builtin/cluster-nodes/sub-nodes/n8n-nodes-langchain.lmchatopenai/";

/// From this version on the model is picked with a resource locator and
/// read from `model.value`.
const RESOURCE_LOCATOR_VERSION: f32 = 1.2;

/// The "OpenAI Chat Model" node.
#[derive(Debug, Clone)]
pub struct LmChatOpenAi {
    description: NodeTypeDescription,
}

impl LmChatOpenAi {
    pub fn new() -> Self {
        Self {
            description: NodeTypeDescription {
                display_name: "OpenAI Chat Model".to_string(),
                name: "lmChatOpenAi".to_string(),
                icon: "file:openAiLight.svg".to_string(),
                group: vec!["transform".to_string()],
                versions: vec![1.0, 1.1, 1.2],
                description: "For advanced usage with an AI chain".to_string(),
                default_name: "OpenAI Chat Model".to_string(),
                codex: chat_model_codex(DOCS_URL),
                inputs: Vec::new(),
                outputs: vec![ConnectionType::AiLanguageModel],
                output_names: vec!["Model".to_string()],
                credentials: required_credential("openAiApi"),
                properties: vec![
                    connection_hint_notice(&HINT_TARGETS),
                    NodeProperty::new("Model", "model", PropertyType::Options, "gpt-4o-mini")
                        .with_description("The model which will generate the completion")
                        .for_versions(vec![1.0, 1.1]),
                    NodeProperty::new(
                        "Model",
                        "model",
                        PropertyType::ResourceLocator,
                        json!({ "mode": "list", "value": "gpt-4o-mini" }),
                    )
                    .with_description("The model. Choose from the list, or specify an ID.")
                    .for_versions(vec![RESOURCE_LOCATOR_VERSION]),
                    options_property(),
                ],
            },
        }
    }
}

impl Default for LmChatOpenAi {
    fn default() -> Self {
        Self::new()
    }
}

fn options_property() -> NodeProperty {
    NodeProperty::new("Options", "options", PropertyType::Collection, json!({}))
        .with_placeholder("Add Option")
        .with_description("Additional options to add")
        .with_children(vec![
            NodeProperty::new("Base URL", "baseURL", PropertyType::String, DEFAULT_OPENAI_URL)
                .with_description("Override the default base URL for the API"),
            NodeProperty::new("Frequency Penalty", "frequencyPenalty", PropertyType::Number, 0.0)
                .with_description("Positive values penalize tokens by how often they already appear"),
            NodeProperty::new("Maximum Number of Tokens", "maxTokens", PropertyType::Number, -1)
                .with_description("The maximum number of tokens to generate. -1 means no limit."),
            NodeProperty::new("Response Format", "responseFormat", PropertyType::Options, "text")
                .with_options(vec![
                    PropertyOption::new("Text", "text").with_description("Regular text response"),
                    PropertyOption::new("JSON", "json_object").with_description(
                        "Enables JSON mode, which should guarantee the message the model generates is valid JSON",
                    ),
                ]),
            NodeProperty::new("Presence Penalty", "presencePenalty", PropertyType::Number, 0.0),
            NodeProperty::new("Sampling Temperature", "temperature", PropertyType::Number, 0.7),
            NodeProperty::new("Timeout", "timeout", PropertyType::Number, 60000)
                .with_description("Maximum amount of time a request is allowed to take in milliseconds"),
            NodeProperty::new("Max Retries", "maxRetries", PropertyType::Number, 2)
                .with_description("Maximum number of retries to attempt"),
            NodeProperty::new("Top P", "topP", PropertyType::Number, 1),
            NodeProperty::new("Reasoning Effort", "reasoningEffort", PropertyType::Options, "medium")
                .with_description("Controls the amount of reasoning tokens to use. Only for reasoning models.")
                .with_options(effort_options()),
        ])
}

#[async_trait]
impl NodeType for LmChatOpenAi {
    fn description(&self) -> &NodeTypeDescription {
        &self.description
    }

    async fn supply_data(&self, ctx: Arc<dyn SupplyDataContext>, item_index: usize) -> Result<SupplyData> {
        let creds: OpenAiCredentials = credentials(&ctx, "openAiApi").await?;

        let version = ctx.node_type_version();
        let model_parameter = if version >= RESOURCE_LOCATOR_VERSION {
            "model.value"
        } else {
            "model"
        };
        let model_name = string_parameter(&ctx, model_parameter, item_index)?;

        let options = OpenAiOptions::from_value(ctx.parameter_or("options", item_index, json!({})))
            .map_err(|e| CoreError::configuration(format!("Invalid OpenAI options: {}", e)))?;
        let config = OpenAiConfig::from_node(&creds, &options, model_name);

        debug!(
            node = %ctx.node_name(),
            version,
            model = %config.model,
            base_url = %config.base_url,
            "Supplying OpenAI chat model"
        );

        let (callbacks, failed_attempt) = host_wiring(&ctx);
        let model = ChatOpenAiWithReasoning::from_config(config, options)?
            .with_callbacks(callbacks)
            .with_failed_attempt_handler(failed_attempt);

        Ok(SupplyData {
            response: Arc::new(model),
        })
    }
}
