use std::collections::HashSet;

use browseflow_core::error::{FlowError, Result};

use crate::graph::Graph;
use crate::kind::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The service would reject or misrun the workflow.
    Error,
    /// Accepted, but probably not what the author meant.
    Warning,
}

/// A problem found before export or submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    DuplicateNodeId(String),
    DuplicateEdgeId(String),
    DanglingEdge { edge: String, missing: String },
    MissingParam { node: String, param: String },
    /// No `start` node and every node has an incoming edge.
    NoEntryNode,
    /// `default` nodes have no step implementation on the service.
    NotExecutable { node: String },
}

impl Issue {
    pub fn severity(&self) -> Severity {
        match self {
            Issue::NotExecutable { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::DuplicateNodeId(id) => write!(f, "duplicate node id '{}'", id),
            Issue::DuplicateEdgeId(id) => write!(f, "duplicate edge id '{}'", id),
            Issue::DanglingEdge { edge, missing } => {
                write!(f, "edge '{}' references missing node '{}'", edge, missing)
            }
            Issue::MissingParam { node, param } => {
                write!(f, "node '{}' is missing required param '{}'", node, param)
            }
            Issue::NoEntryNode => write!(f, "workflow has no entry node"),
            Issue::NotExecutable { node } => {
                write!(f, "node '{}' has no executable node type", node)
            }
        }
    }
}

/// Result of [`validate`].
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub issues: Vec<Issue>,
}

impl Report {
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity() == Severity::Warning)
    }

    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    /// `Err(Validation)` listing every error; warnings do not fail.
    pub fn into_result(self) -> Result<()> {
        let errors: Vec<String> = self.errors().map(ToString::to_string).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FlowError::Validation(errors))
        }
    }
}

/// Check a graph for problems the execution service would trip over.
pub fn validate(graph: &Graph) -> Report {
    let mut issues = Vec::new();

    let mut seen = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            issues.push(Issue::DuplicateNodeId(node.id.clone()));
        }
    }

    let mut seen_edges = HashSet::new();
    for edge in &graph.edges {
        if !seen_edges.insert(edge.id.as_str()) {
            issues.push(Issue::DuplicateEdgeId(edge.id.clone()));
        }
        for end in [&edge.source, &edge.target] {
            if !seen.contains(end.as_str()) {
                issues.push(Issue::DanglingEdge {
                    edge: edge.id.clone(),
                    missing: end.clone(),
                });
            }
        }
    }

    for node in &graph.nodes {
        let kind = node.kind();
        for param in kind.required_params() {
            if !node.data.params.contains_key(*param) {
                issues.push(Issue::MissingParam {
                    node: node.id.clone(),
                    param: param.to_string(),
                });
            }
        }
        if !kind.is_executable() {
            issues.push(Issue::NotExecutable {
                node: node.id.clone(),
            });
        }
    }

    // The service starts from `start` nodes and nodes without incoming edges.
    let targets: HashSet<&str> = graph.edges.iter().map(|e| e.target.as_str()).collect();
    let has_entry = graph
        .nodes
        .iter()
        .any(|n| n.kind() == NodeKind::Start || !targets.contains(n.id.as_str()));
    if !has_entry {
        issues.push(Issue::NoEntryNode);
    }

    Report { issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::{Node, Position};

    #[test]
    fn test_seed_is_valid_with_warning() {
        let report = validate(&Graph::seed());
        assert!(report.is_valid());
        assert_eq!(
            report.warnings().collect::<Vec<_>>(),
            vec![&Issue::NotExecutable { node: "2".into() }]
        );
    }

    #[test]
    fn test_dangling_edge_reported() {
        let mut g = Graph::seed();
        g.edges.push(Edge::new("e1", "1", "9"));
        let report = validate(&g);
        assert!(!report.is_valid());
        assert!(report.issues.contains(&Issue::DanglingEdge {
            edge: "e1".into(),
            missing: "9".into()
        }));
    }

    #[test]
    fn test_duplicate_ids_reported() {
        let mut g = Graph::seed();
        g.nodes.push(Node::new("1", NodeKind::End, Position::default()));
        g.edges.push(Edge::new("e1-2", "1", "2"));
        let report = validate(&g);
        assert!(report.issues.contains(&Issue::DuplicateNodeId("1".into())));
        assert!(report.issues.contains(&Issue::DuplicateEdgeId("e1-2".into())));
    }

    #[test]
    fn test_missing_required_param() {
        let mut g = Graph::new();
        let mut node = Node::new("v", NodeKind::VisitPage, Position::default());
        node.data.params.remove("url");
        g.nodes.push(node);
        let err = validate(&g).into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Workflow validation failed: node 'v' is missing required param 'url'"
        );
    }

    #[test]
    fn test_cycle_without_start_has_no_entry() {
        let mut g = Graph::new();
        g.nodes.push(Node::new("a", NodeKind::Wait, Position::default()));
        g.nodes.push(Node::new("b", NodeKind::Wait, Position::default()));
        g.edges.push(Edge::new("ab", "a", "b"));
        g.edges.push(Edge::new("ba", "b", "a"));
        assert!(validate(&g).issues.contains(&Issue::NoEntryNode));
    }

    #[test]
    fn test_empty_graph_has_no_entry() {
        assert!(!validate(&Graph::new()).is_valid());
    }
}
