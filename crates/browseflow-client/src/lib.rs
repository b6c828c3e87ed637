pub mod http;

use futures::future::BoxFuture;

use browseflow_core::error::Result;
use browseflow_core::types::{ExecutionHandle, StatusReport};
use browseflow_graph::WorkflowDefinition;

pub use http::HttpExecutionClient;

/// Remote workflow execution service.
///
/// Each call is a single request. Nothing here retries; retry policy
/// belongs to the caller.
pub trait ExecutionService: Send + Sync + 'static {
    /// Submit a workflow and obtain its execution handle.
    fn submit(&self, document: &WorkflowDefinition) -> BoxFuture<'_, Result<ExecutionHandle>>;

    /// Fetch the current status of an execution.
    fn fetch_status(&self, execution_id: &str) -> BoxFuture<'_, Result<StatusReport>>;

    /// Ask the service to stop an execution. `Ok(true)` means the request
    /// was accepted, not that the run has halted.
    fn request_stop(&self, execution_id: &str) -> BoxFuture<'_, Result<bool>>;
}
