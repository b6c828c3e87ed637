use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    // Execution service errors
    #[error("Execution service unreachable: {0}")]
    Transport(String),

    /// `body` is the service's error payload; empty when it could not be read.
    #[error("HTTP {status}{}", body_suffix(.body))]
    Service { status: u16, body: String },

    #[error("Unexpected service response: {0}")]
    Protocol(String),

    // Document errors
    #[error("Malformed workflow document: {0}")]
    MalformedDocument(String),

    #[error("Workflow validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    // Editing errors
    #[error("Invalid params for node {node}: {message}")]
    InvalidParams { node: String, message: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// Errors raised by the remote service rather than by local input.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            FlowError::Transport(_) | FlowError::Service { .. } | FlowError::Protocol(_)
        )
    }
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {}", body)
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
