use serde::Serialize;
use thiserror::Error;

use super::types::Stage;

/// Failure of a node routine. Propagates with `?` up to the sink that requested it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmitError {
    #[error("{node}: input `{pin}` is not connected")]
    UnconnectedInput { node: String, pin: String },

    #[error("{node}: type mismatch: {detail}")]
    TypeMismatch { node: String, detail: String },

    #[error("{node}: resource conflict on `{name}`: {detail}")]
    ResourceConflict {
        node: String,
        name: String,
        detail: String,
    },

    #[error("{node}: {what} is not available in the {stage} stage")]
    UnsupportedContext {
        node: String,
        what: String,
        stage: Stage,
    },

    #[error("{node}: no code generator for node type `{node_type}`")]
    UnknownNode { node: String, node_type: String },

    #[error("{node}: module `{module}` could not be resolved")]
    UnresolvedModule { node: String, module: String },
}

impl EmitError {
    /// Id of the node that reported the failure.
    pub fn node(&self) -> &str {
        match self {
            EmitError::UnconnectedInput { node, .. }
            | EmitError::TypeMismatch { node, .. }
            | EmitError::ResourceConflict { node, .. }
            | EmitError::UnsupportedContext { node, .. }
            | EmitError::UnknownNode { node, .. }
            | EmitError::UnresolvedModule { node, .. } => node,
        }
    }

    pub fn type_mismatch(node: &str, detail: impl Into<String>) -> Self {
        EmitError::TypeMismatch {
            node: node.to_string(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub node: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn from_error(stage: Stage, err: &EmitError) -> Self {
        Self {
            stage,
            node: Some(err.node().to_string()),
            message: err.to_string(),
        }
    }

    pub fn stage_level(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            node: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}
