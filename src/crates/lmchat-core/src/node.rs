//! The host's plugin contract for nodes that supply a chat model.
//!
//! A node is declarative metadata ([`NodeTypeDescription`]) plus one factory
//! operation, [`NodeType::supply_data`]. The host resolves credentials and
//! node parameters through a [`SupplyDataContext`] and receives a
//! [`SupplyData`] wrapping the constructed model.

use crate::error::{CoreError, Result};
use crate::llm::ChatModel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Kinds of connections between workflow nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionType {
    Main,
    AiLanguageModel,
    AiChain,
    AiAgent,
}

impl ConnectionType {
    /// Label shown to users in connection hints.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionType::Main => "Main",
            ConnectionType::AiLanguageModel => "Language Model",
            ConnectionType::AiChain => "AI Chain",
            ConnectionType::AiAgent => "AI Agent",
        }
    }
}

/// Events a node may report to the host's execution log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiEvent {
    #[serde(rename = "ai-llm-generated-output")]
    LlmGeneratedOutput,
    #[serde(rename = "ai-llm-errored")]
    LlmErrored,
}

impl AiEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiEvent::LlmGeneratedOutput => "ai-llm-generated-output",
            AiEvent::LlmErrored => "ai-llm-errored",
        }
    }
}

/// Type of a node property in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Options,
    Collection,
    ResourceLocator,
    Notice,
}

/// One selectable value of an `Options` property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyOption {
    pub name: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertyOption {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Declarative schema of one node parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProperty {
    pub display_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    pub default: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Values for `Options` properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PropertyOption>,
    /// Nested properties for `Collection` properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeProperty>,
    /// Node versions this property is shown for; empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub show_for_versions: Vec<f32>,
}

impl NodeProperty {
    pub fn new(
        display_name: impl Into<String>,
        name: impl Into<String>,
        kind: PropertyType,
        default: impl Into<Value>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            name: name.into(),
            kind,
            default: default.into(),
            description: None,
            placeholder: None,
            options: Vec::new(),
            children: Vec::new(),
            show_for_versions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_options(mut self, options: Vec<PropertyOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_children(mut self, children: Vec<NodeProperty>) -> Self {
        self.children = children;
        self
    }

    pub fn for_versions(mut self, versions: Vec<f32>) -> Self {
        self.show_for_versions = versions;
        self
    }

    /// Find a nested property by name.
    pub fn child(&self, name: &str) -> Option<&NodeProperty> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Notice shown above sub-nodes telling users where to connect them.
pub fn connection_hint_notice(targets: &[ConnectionType]) -> NodeProperty {
    let labels: Vec<&str> = targets.iter().map(ConnectionType::label).collect();
    NodeProperty::new(
        format!("This node must be connected to an {}", labels.join(" or ")),
        "notice",
        PropertyType::Notice,
        "",
    )
}

/// Credential type a node requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRequirement {
    pub name: String,
    pub required: bool,
}

/// Editor grouping and documentation links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Codex {
    pub categories: Vec<String>,
    pub subcategories: BTreeMap<String, Vec<String>>,
    pub primary_documentation: Vec<String>,
}

/// Declarative metadata of a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeDescription {
    pub display_name: String,
    pub name: String,
    pub icon: String,
    pub group: Vec<String>,
    pub versions: Vec<f32>,
    pub description: String,
    pub default_name: String,
    pub codex: Codex,
    pub inputs: Vec<ConnectionType>,
    pub outputs: Vec<ConnectionType>,
    pub output_names: Vec<String>,
    pub credentials: Vec<CredentialRequirement>,
    pub properties: Vec<NodeProperty>,
}

impl NodeTypeDescription {
    /// Find a top-level property by name.
    pub fn property(&self, name: &str) -> Option<&NodeProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Newest supported version.
    pub fn latest_version(&self) -> f32 {
        self.versions.iter().copied().fold(0.0, f32::max)
    }
}

/// Services the host provides while a node supplies its data.
#[async_trait]
pub trait SupplyDataContext: Send + Sync {
    /// Resolved credentials of the given type as a JSON object.
    async fn get_credentials(&self, kind: &str) -> Result<Value>;

    /// A node parameter by dotted name (e.g. `model.value`), if set.
    fn get_node_parameter(&self, name: &str, item_index: usize) -> Option<Value>;

    /// Version of the node instance being executed.
    fn node_type_version(&self) -> f32;

    /// Display name of the node instance.
    fn node_name(&self) -> String;

    /// Record an AI event in the host's execution log.
    fn log_ai_event(&self, event: AiEvent, payload: Value);
}

impl dyn SupplyDataContext {
    /// A required parameter, failing with [`CoreError::MissingParameter`].
    pub fn required_parameter(&self, name: &str, item_index: usize) -> Result<Value> {
        self.get_node_parameter(name, item_index)
            .ok_or_else(|| CoreError::MissingParameter(name.to_string()))
    }

    /// A parameter with a fallback default.
    pub fn parameter_or(&self, name: &str, item_index: usize, default: Value) -> Value {
        self.get_node_parameter(name, item_index).unwrap_or(default)
    }
}

/// What a node hands back to the host.
#[derive(Clone)]
pub struct SupplyData {
    pub response: Arc<dyn ChatModel>,
}

impl std::fmt::Debug for SupplyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupplyData")
            .field("model", &self.response.model_name())
            .finish()
    }
}

/// A plugin node that supplies a chat model to the workflow.
#[async_trait]
pub trait NodeType: Send + Sync {
    fn description(&self) -> &NodeTypeDescription;

    async fn supply_data(
        &self,
        ctx: Arc<dyn SupplyDataContext>,
        item_index: usize,
    ) -> Result<SupplyData>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_hint_notice() {
        let notice = connection_hint_notice(&[ConnectionType::AiChain, ConnectionType::AiAgent]);
        assert_eq!(notice.kind, PropertyType::Notice);
        assert_eq!(
            notice.display_name,
            "This node must be connected to an AI Chain or AI Agent"
        );
    }

    #[test]
    fn test_property_serialization_uses_host_names() {
        let prop = NodeProperty::new("Model", "model", PropertyType::Options, "llama3.2")
            .with_options(vec![PropertyOption::new("Llama 3.2", "llama3.2")]);
        let value = serde_json::to_value(&prop).unwrap();
        assert_eq!(value["displayName"], json!("Model"));
        assert_eq!(value["type"], json!("options"));
        assert!(value.get("children").is_none());
    }

    #[test]
    fn test_ai_event_names() {
        assert_eq!(
            serde_json::to_value(AiEvent::LlmGeneratedOutput).unwrap(),
            json!(AiEvent::LlmGeneratedOutput.as_str())
        );
        assert_eq!(ConnectionType::AiLanguageModel.label(), "Language Model");
    }
}
