use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use browseflow_core::error::Result;

use crate::dsl;
use crate::edge::Edge;
use crate::graph::Graph;
use crate::node::Node;

/// Default file name for exported graphs.
pub const DEFAULT_FILE_NAME: &str = "workflow.json";

/// Version stamped into exported files.
pub const FILE_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub version: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// On-disk interchange form of a graph: `{nodes, edges, metadata}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DslFile {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub metadata: FileMetadata,
}

impl DslFile {
    pub fn from_graph(graph: &Graph) -> Self {
        Self {
            nodes: graph.nodes.clone(),
            edges: graph.edges.clone(),
            metadata: FileMetadata {
                version: FILE_VERSION.to_string(),
                created_at: Utc::now(),
            },
        }
    }
}

/// Pretty-printed export text.
pub fn export_string(graph: &Graph) -> Result<String> {
    Ok(serde_json::to_string_pretty(&DslFile::from_graph(graph))?)
}

/// Write `graph` to `path` as a DSL file.
pub fn export_file(graph: &Graph, path: &Path) -> Result<()> {
    std::fs::write(path, export_string(graph)?)?;
    info!(path = %path.display(), nodes = graph.nodes.len(), "Workflow exported");
    Ok(())
}

/// Read a DSL file into a new graph.
pub fn read_file(path: &Path) -> Result<Graph> {
    let text = std::fs::read_to_string(path)?;
    dsl::decode_str(&text)
}

/// Replace `graph` with the contents of `text`.
///
/// A malformed document is logged and leaves `graph` untouched. Returns
/// whether the import happened.
pub fn import_str(graph: &mut Graph, text: &str) -> bool {
    match dsl::decode_str(text) {
        Ok(imported) => {
            info!(
                nodes = imported.nodes.len(),
                edges = imported.edges.len(),
                "Workflow imported"
            );
            graph.replace(imported);
            true
        }
        Err(e) => {
            error!(error = %e, "Invalid DSL document, keeping current workflow");
            false
        }
    }
}

/// Like [`import_str`], reading from `path`. Unreadable files are logged
/// the same way.
pub fn import_file(graph: &mut Graph, path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(text) => import_str(graph, &text),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Cannot read DSL file");
            false
        }
    }
}
