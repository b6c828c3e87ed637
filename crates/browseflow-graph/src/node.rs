use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kind::{ContainerKind, NodeKind, Params};

/// Canvas coordinates of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The execution-relevant part of a node.
///
/// Rendering handles (icons, selection, resize state) are not stored here;
/// the editor derives them from `node_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "nodeType", default)]
    pub node_type: NodeKind,
    #[serde(default)]
    pub params: Params,
}

impl NodeData {
    /// Data for a fresh node of `kind`, filled from the defaults table.
    pub fn for_kind(kind: NodeKind) -> Self {
        Self {
            label: kind.label().to_string(),
            description: Some(kind.description().to_string()),
            node_type: kind,
            params: kind.default_params(),
        }
    }

    /// Apply a partial update. Fields absent from the patch are kept;
    /// `params` is replaced wholesale when present.
    pub fn apply(&mut self, patch: NodeDataPatch) {
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(node_type) = patch.node_type {
            self.node_type = node_type;
        }
        if let Some(params) = patch.params {
            self.params = params;
        }
    }
}

/// Partial update for [`NodeData`].
#[derive(Debug, Clone, Default)]
pub struct NodeDataPatch {
    pub label: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub node_type: Option<NodeKind>,
    pub params: Option<Params>,
}

impl NodeDataPatch {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn node_type(mut self, kind: NodeKind) -> Self {
        self.node_type = Some(kind);
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }
}

/// A node in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique within its graph.
    pub id: String,
    #[serde(rename = "type", default)]
    pub container: ContainerKind,
    pub position: Position,
    pub data: NodeData,
}

impl Node {
    /// Create a node of `kind` with default label, description, and params.
    pub fn new(id: impl Into<String>, kind: NodeKind, position: Position) -> Self {
        let container = if kind == NodeKind::Comment {
            ContainerKind::Comment
        } else {
            ContainerKind::Default
        };
        Self {
            id: id.into(),
            container,
            position,
            data: NodeData::for_kind(kind),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.label = label.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.data.description = Some(description.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.params.insert(key.into(), value);
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.data.node_type
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.data.params.get(key)
    }
}
