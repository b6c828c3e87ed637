//! Conversion between [`Graph`] and the workflow definition document the
//! execution service accepts.
//!
//! Only the execution-relevant projection crosses this boundary: node id,
//! container type, position, and `{label, description, nodeType, params}`.
//! Decoding is forward compatible: an unknown `nodeType` becomes `default`,
//! and missing params are filled from the node-kind defaults table. Only
//! structurally missing fields are rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use browseflow_core::error::{FlowError, Result};

use crate::edge::Edge;
use crate::graph::Graph;
use crate::kind::{ContainerKind, NodeKind};
use crate::node::{Node, NodeData, Position};

/// Caller-supplied document metadata.
#[derive(Debug, Clone)]
pub struct WorkflowMeta {
    pub name: String,
    pub description: String,
}

impl WorkflowMeta {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Submittable form of a graph (`POST /workflow/execute` body).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub workflow_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Graph view of this document.
    pub fn to_graph(&self) -> Graph {
        Graph {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }
}

/// Project a graph into a fresh workflow definition.
pub fn encode(graph: &Graph, meta: &WorkflowMeta) -> WorkflowDefinition {
    let now = Utc::now();
    WorkflowDefinition {
        workflow_id: format!("workflow_{}", Uuid::new_v4().simple()),
        name: meta.name.clone(),
        description: meta.description.clone(),
        nodes: graph.nodes.clone(),
        edges: graph.edges.clone(),
        created_at: now,
        updated_at: now,
    }
}

/// Rebuild a graph from any JSON document carrying `nodes` and `edges`.
///
/// Referential integrity is not checked here; dangling edges survive
/// decoding and are reported by validation.
pub fn decode(document: &Value) -> Result<Graph> {
    let obj = document
        .as_object()
        .ok_or_else(|| malformed("document is not a JSON object"))?;

    let nodes = obj
        .get("nodes")
        .ok_or_else(|| malformed("missing 'nodes'"))?
        .as_array()
        .ok_or_else(|| malformed("'nodes' is not an array"))?;
    let edges = obj
        .get("edges")
        .ok_or_else(|| malformed("missing 'edges'"))?
        .as_array()
        .ok_or_else(|| malformed("'edges' is not an array"))?;

    let nodes = nodes
        .iter()
        .enumerate()
        .map(|(i, v)| decode_node(i, v))
        .collect::<Result<Vec<_>>>()?;
    let edges = edges
        .iter()
        .enumerate()
        .map(|(i, v)| decode_edge(i, v))
        .collect::<Result<Vec<_>>>()?;

    Ok(Graph { nodes, edges })
}

/// Parse JSON text and decode it.
pub fn decode_str(text: &str) -> Result<Graph> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| malformed(&format!("invalid JSON: {}", e)))?;
    decode(&value)
}

fn decode_node(index: usize, value: &Value) -> Result<Node> {
    let obj = value
        .as_object()
        .ok_or_else(|| malformed(&format!("nodes[{}] is not an object", index)))?;

    let id = required_str(obj, "id", || format!("nodes[{}]", index))?;
    let position = obj
        .get("position")
        .ok_or_else(|| malformed(&format!("node '{}' has no position", id)))?;
    let position = Position {
        x: coordinate(position, "x", &id)?,
        y: coordinate(position, "y", &id)?,
    };
    let container = obj
        .get("type")
        .and_then(Value::as_str)
        .map(ContainerKind::parse)
        .unwrap_or_default();

    let data = obj.get("data").and_then(Value::as_object);
    let kind = data
        .and_then(|d| d.get("nodeType"))
        .and_then(Value::as_str)
        .map(NodeKind::parse)
        .unwrap_or_default();

    let mut node_data = NodeData::for_kind(kind);
    if let Some(d) = data {
        if let Some(label) = d.get("label").and_then(Value::as_str) {
            node_data.label = label.to_string();
        }
        // An explicit but absent description stays absent.
        node_data.description = d
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        // Explicit params are kept as written; defaults only stand in for
        // a missing or non-object `params`.
        if let Some(Value::Object(p)) = d.get("params") {
            node_data.params = p.clone();
        }
    }

    Ok(Node {
        id,
        container,
        position,
        data: node_data,
    })
}

fn decode_edge(index: usize, value: &Value) -> Result<Edge> {
    let obj = value
        .as_object()
        .ok_or_else(|| malformed(&format!("edges[{}] is not an object", index)))?;
    let ctx = || format!("edges[{}]", index);

    let handle = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(Edge::new(
        required_str(obj, "id", ctx)?,
        required_str(obj, "source", ctx)?,
        required_str(obj, "target", ctx)?,
    )
    .with_handles(handle("sourceHandle"), handle("targetHandle")))
}

fn required_str(
    obj: &serde_json::Map<String, Value>,
    key: &str,
    ctx: impl Fn() -> String,
) -> Result<String> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        // Numeric ids show up in hand-written files.
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(malformed(&format!("{} has no '{}'", ctx(), key))),
    }
}

fn coordinate(position: &Value, axis: &str, node_id: &str) -> Result<f64> {
    position
        .get(axis)
        .and_then(Value::as_f64)
        .ok_or_else(|| malformed(&format!("node '{}' position lacks '{}'", node_id, axis)))
}

fn malformed(message: &str) -> FlowError {
    FlowError::MalformedDocument(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Params;
    use crate::node::NodeDataPatch;
    use serde_json::json;

    fn sample_graph() -> Graph {
        let mut g = Graph::seed();
        let visit = g.add_node(NodeKind::VisitPage, Position::new(400.0, 300.5));
        g.set_param(&visit.id, "url", json!("https://example.org/list")).unwrap();
        let extract = g.add_node(NodeKind::ExtractData, Position::new(-20.0, 7.25));
        g.connect("1", &visit.id, Some("right".into()), Some("left".into()));
        g.connect(&visit.id, &extract.id, None, None);
        g.add_comment(Position::new(0.0, 0.0));
        g
    }

    #[test]
    fn test_round_trip_preserves_execution_projection() {
        let graph = sample_graph();
        let doc = encode(&graph, &WorkflowMeta::new("wf", "desc"));
        let value = serde_json::to_value(&doc).unwrap();
        let decoded = decode(&value).unwrap();
        assert_eq!(decoded, graph);
    }

    #[test]
    fn test_encode_sets_metadata() {
        let graph = Graph::seed();
        let a = encode(&graph, &WorkflowMeta::new("Scraper", "Scrapes things"));
        let b = encode(&graph, &WorkflowMeta::new("Scraper", "Scrapes things"));
        assert_eq!(a.name, "Scraper");
        assert_eq!(a.description, "Scrapes things");
        assert_eq!(a.created_at, a.updated_at);
        assert!(a.workflow_id.starts_with("workflow_"));
        assert_ne!(a.workflow_id, b.workflow_id);
    }

    #[test]
    fn test_encode_wire_shape() {
        let doc = encode(&Graph::seed(), &WorkflowMeta::new("n", "d"));
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value["created_at"].is_string());
        assert_eq!(value["nodes"][0]["data"]["nodeType"], "start");
        assert_eq!(value["nodes"][0]["data"]["params"], json!({}));
        assert!(value["nodes"][0]["data"].get("icon").is_none());
        assert_eq!(value["edges"][0]["source"], "1");
    }

    #[test]
    fn test_decode_missing_edges_is_malformed() {
        let err = decode(&json!({"nodes": []})).unwrap_err();
        assert!(matches!(err, FlowError::MalformedDocument(_)));
    }

    #[test]
    fn test_decode_non_array_nodes_is_malformed() {
        let err = decode(&json!({"nodes": {}, "edges": []})).unwrap_err();
        assert!(matches!(err, FlowError::MalformedDocument(_)));
    }

    #[test]
    fn test_decode_unknown_node_type_as_default() {
        let doc = json!({
            "nodes": [{
                "id": "n1",
                "type": "default",
                "position": {"x": 1, "y": 2},
                "data": {"label": "Hover", "nodeType": "hover_element", "params": {"selector": "a"}}
            }],
            "edges": []
        });
        let g = decode(&doc).unwrap();
        assert_eq!(g.nodes[0].kind(), NodeKind::Default);
        assert_eq!(g.nodes[0].data.label, "Hover");
        assert_eq!(g.nodes[0].data.params["selector"], json!("a"));
    }

    #[test]
    fn test_round_trip_keeps_partial_params() {
        let mut g = Graph::new();
        let wait = g.add_node(NodeKind::Wait, Position::new(10.0, 20.0));
        let mut params = Params::new();
        params.insert("wait_type".into(), json!("element"));
        params.insert("element_selector".into(), json!("#ready"));
        g.update_node_data(&wait.id, NodeDataPatch::default().params(params));

        let value = serde_json::to_value(encode(&g, &WorkflowMeta::new("wf", ""))).unwrap();
        let back = decode(&value).unwrap();
        assert_eq!(back, g);
        assert!(back.params(&wait.id).unwrap().get("duration").is_none());
    }

    #[test]
    fn test_decode_keeps_explicit_params_as_written() {
        let doc = json!({
            "nodes": [{
                "id": "v",
                "position": {"x": 0, "y": 0},
                "data": {"label": "Open", "nodeType": "visit_page", "params": {"timeout": 5000}}
            }],
            "edges": []
        });
        let g = decode(&doc).unwrap();
        assert_eq!(g.nodes[0].data.params, *json!({"timeout": 5000}).as_object().unwrap());
        assert!(!crate::validate(&g).is_valid());
    }

    #[test]
    fn test_decode_missing_params_uses_defaults() {
        let doc = json!({
            "nodes": [{
                "id": "v",
                "position": {"x": 0, "y": 0},
                "data": {"label": "Open", "nodeType": "visit_page"}
            }],
            "edges": []
        });
        let g = decode(&doc).unwrap();
        assert_eq!(g.nodes[0].data.params, NodeKind::VisitPage.default_params());
    }

    #[test]
    fn test_decode_ignores_ui_fields() {
        let doc = json!({
            "nodes": [{
                "id": "1",
                "type": "default",
                "position": {"x": 0, "y": 0},
                "selected": true,
                "data": {"label": "Start", "nodeType": "start", "icon": {"$$typeof": "react"}}
            }],
            "edges": [],
            "metadata": {"version": "1.0.0"}
        });
        let g = decode(&doc).unwrap();
        assert_eq!(g.nodes[0].kind(), NodeKind::Start);
    }

    #[test]
    fn test_decode_keeps_dangling_edges() {
        let doc = json!({
            "nodes": [{"id": "1", "position": {"x": 0, "y": 0}, "data": {"label": "s", "nodeType": "start"}}],
            "edges": [{"id": "e1", "source": "1", "target": "9"}]
        });
        let g = decode(&doc).unwrap();
        assert_eq!(g.dangling_edges().count(), 1);
    }

    #[test]
    fn test_decode_rejects_node_without_id() {
        let doc = json!({"nodes": [{"position": {"x": 0, "y": 0}}], "edges": []});
        assert!(matches!(decode(&doc), Err(FlowError::MalformedDocument(_))));
    }

    #[test]
    fn test_decode_str_invalid_json() {
        assert!(matches!(
            decode_str("{nodes"),
            Err(FlowError::MalformedDocument(_))
        ));
    }
}
