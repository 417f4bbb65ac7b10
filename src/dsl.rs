use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::nodes::NodeKind;

/// On-disk shader graph, as exported by the node editor.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ShaderGraphDSL {
    pub version: String,
    pub metadata: Metadata,
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Metadata {
    pub name: String,
    pub created: Option<String>,
    pub modified: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    /// Editor annotation, repeated above the statements generated for this node.
    #[serde(default)]
    pub comment: Option<String>,
}

impl Node {
    /// Decode `type` + `params` into a typed node kind.
    pub fn kind(&self) -> Result<NodeKind> {
        let mut object = self.params.clone();
        object.insert(
            "type".to_string(),
            serde_json::Value::String(self.node_type.clone()),
        );
        serde_json::from_value(serde_json::Value::Object(object))
            .with_context(|| format!("invalid params for node {} ({})", self.id, self.node_type))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Connection {
    pub id: String,
    pub from: Endpoint,
    pub to: Endpoint,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Endpoint {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    #[serde(rename = "portId")]
    pub port_id: String,
}

pub fn load_graph_from_path(path: impl AsRef<std::path::Path>) -> Result<ShaderGraphDSL> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read graph json at {}", path.display()))?;
    parse_graph(&text).with_context(|| format!("failed to parse graph json at {}", path.display()))
}

pub fn parse_graph(text: &str) -> Result<ShaderGraphDSL> {
    serde_json::from_str(text).context("failed to parse graph json")
}
