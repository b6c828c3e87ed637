use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use browseflow_core::error::{FlowError, Result};

use crate::edge::Edge;
use crate::kind::{NodeKind, Params};
use crate::node::{Node, NodeDataPatch, Position};

/// Process-wide sequence appended to time-based ids.
static ID_SEQ: AtomicU64 = AtomicU64::new(0);

/// The node/edge set owned by one editing session.
///
/// Mutations keep referential integrity: removing a node removes every edge
/// that references it. `connect` itself does not check endpoints, so the
/// editor can hold transient dangling edges; see [`crate::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The starter template: start → process → end.
    pub fn seed() -> Self {
        let nodes = vec![
            Node::new("1", NodeKind::Start, Position::new(250.0, 125.0)),
            Node::new("2", NodeKind::Default, Position::new(550.0, 125.0)),
            Node::new("3", NodeKind::End, Position::new(850.0, 125.0)),
        ];
        let edges = vec![Edge::new("e1-2", "1", "2"), Edge::new("e2-3", "2", "3")];
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Append a node of `kind` with defaults from the node-kind table.
    pub fn add_node(&mut self, kind: NodeKind, position: Position) -> Node {
        let id = self.fresh_id("node", |g, id| g.contains_node(id));
        let node = Node::new(id, kind, position);
        debug!(node_id = %node.id, kind = %kind, "Node added");
        self.nodes.push(node.clone());
        node
    }

    /// Append a comment annotation.
    pub fn add_comment(&mut self, position: Position) -> Node {
        let id = self.fresh_id("comment", |g, id| g.contains_node(id));
        let node = Node::new(id, NodeKind::Comment, position);
        debug!(node_id = %node.id, "Comment added");
        self.nodes.push(node.clone());
        node
    }

    /// Merge `patch` into a node's data. Unknown ids are ignored so stale
    /// editor references never fail.
    pub fn update_node_data(&mut self, node_id: &str, patch: NodeDataPatch) {
        match self.node_mut(node_id) {
            Some(node) => node.data.apply(patch),
            None => debug!(node_id, "update_node_data on unknown node ignored"),
        }
    }

    /// Move a node. Unknown ids are ignored.
    pub fn move_node(&mut self, node_id: &str, position: Position) {
        if let Some(node) = self.node_mut(node_id) {
            node.position = position;
        }
    }

    /// Set a single parameter on a node.
    pub fn set_param(&mut self, node_id: &str, key: &str, value: Value) -> Result<()> {
        let node = self
            .node_mut(node_id)
            .ok_or_else(|| FlowError::NodeNotFound(node_id.to_string()))?;
        node.data.params.insert(key.to_string(), value);
        Ok(())
    }

    /// Replace an `extract_data` node's `selectors` from editor text.
    ///
    /// The text must be a JSON object mapping field names to selector
    /// strings; anything else is rejected and the node is left as it was.
    pub fn set_selectors_json(&mut self, node_id: &str, text: &str) -> Result<()> {
        let invalid = |message: String| FlowError::InvalidParams {
            node: node_id.to_string(),
            message,
        };

        if !self.contains_node(node_id) {
            return Err(FlowError::NodeNotFound(node_id.to_string()));
        }

        let parsed: Value =
            serde_json::from_str(text).map_err(|e| invalid(format!("selectors: {}", e)))?;
        let map = parsed
            .as_object()
            .ok_or_else(|| invalid("selectors must be a JSON object".into()))?;
        if let Some((field, _)) = map.iter().find(|(_, v)| !v.is_string()) {
            return Err(invalid(format!("selector for '{}' must be a string", field)));
        }

        self.set_param(node_id, "selectors", Value::Object(map.clone()))
    }

    /// Change what a node does. Params are left exactly as they were.
    pub fn set_node_kind(&mut self, node_id: &str, kind: NodeKind) -> Result<()> {
        let node = self
            .node_mut(node_id)
            .ok_or_else(|| FlowError::NodeNotFound(node_id.to_string()))?;
        node.data.node_type = kind;
        Ok(())
    }

    /// Connect two nodes. No cycle or type checks are made.
    pub fn connect(
        &mut self,
        source: &str,
        target: &str,
        source_handle: Option<String>,
        target_handle: Option<String>,
    ) -> Edge {
        let base = format!("e{}-{}", source, target);
        let id = if self.edge(&base).is_none() {
            base
        } else {
            self.fresh_id(&base, |g, id| g.edge(id).is_some())
        };
        let edge = Edge::new(id, source, target).with_handles(source_handle, target_handle);
        debug!(edge_id = %edge.id, source, target, "Edge added");
        self.edges.push(edge.clone());
        edge
    }

    /// Remove a node and every edge referencing it.
    pub fn remove_node(&mut self, node_id: &str) -> Option<Node> {
        let idx = self.nodes.iter().position(|n| n.id == node_id)?;
        let node = self.nodes.remove(idx);
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(node_id));
        debug!(
            node_id,
            edges_removed = before - self.edges.len(),
            "Node removed"
        );
        Some(node)
    }

    pub fn remove_edge(&mut self, edge_id: &str) -> Option<Edge> {
        let idx = self.edges.iter().position(|e| e.id == edge_id)?;
        Some(self.edges.remove(idx))
    }

    /// Replace the whole graph, as an import does. No merge.
    pub fn replace(&mut self, other: Graph) {
        *self = other;
    }

    /// Edges whose source or target is not a node of this graph.
    pub fn dangling_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(|e| !self.contains_node(&e.source) || !self.contains_node(&e.target))
    }

    /// Node params by id, for quick inspection.
    pub fn params(&self, node_id: &str) -> Option<&Params> {
        self.node(node_id).map(|n| &n.data.params)
    }

    fn fresh_id(&self, prefix: &str, taken: impl Fn(&Self, &str) -> bool) -> String {
        loop {
            let seq = ID_SEQ.fetch_add(1, Ordering::Relaxed);
            let id = format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), seq);
            if !taken(self, &id) {
                return id;
            }
        }
    }
}
