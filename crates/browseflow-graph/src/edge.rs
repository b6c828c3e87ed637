use serde::{Deserialize, Serialize};

/// A directed connection between two nodes.
///
/// The editor tolerates dangling edges while a graph is being edited;
/// they are reported by validation before export or submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    #[serde(rename = "sourceHandle", default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(rename = "targetHandle", default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    /// Create an edge without port handles.
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_handles(mut self, source_handle: Option<String>, target_handle: Option<String>) -> Self {
        self.source_handle = source_handle;
        self.target_handle = target_handle;
        self
    }

    /// Whether this edge touches `node_id` on either end.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_omitted_when_absent() {
        let json = serde_json::to_value(Edge::new("e1-2", "1", "2")).unwrap();
        assert_eq!(json, serde_json::json!({"id": "e1-2", "source": "1", "target": "2"}));
    }

    #[test]
    fn test_handles_use_camel_case() {
        let edge = Edge::new("e", "a", "b").with_handles(Some("out".into()), None);
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["sourceHandle"], "out");
        assert!(json.get("targetHandle").is_none());
        assert!(edge.touches("a"));
        assert!(!edge.touches("c"));
    }
}
