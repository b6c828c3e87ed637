use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, warn};

use browseflow_core::config::ServiceConfig;
use browseflow_core::error::{FlowError, Result};
use browseflow_core::types::{ExecutionHandle, RemoteCatalog, StatusReport};
use browseflow_graph::WorkflowDefinition;

use crate::ExecutionService;

/// `ExecutionService` over the service's JSON HTTP API.
pub struct HttpExecutionClient {
    http: Client,
    base_url: String,
}

impl HttpExecutionClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FlowError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn execution_url(&self, action: &str, execution_id: &str) -> String {
        self.url(&format!(
            "/workflow/{}/{}",
            action,
            urlencoding::encode(execution_id)
        ))
    }

    /// `GET /nodes`: node types the service can execute.
    pub async fn list_node_types(&self) -> Result<RemoteCatalog> {
        let resp = self.send(self.http.get(self.url("/nodes"))).await?;
        let body = json_body(resp).await?;
        serde_json::from_value(body)
            .map_err(|e| FlowError::Protocol(format!("node catalog: {}", e)))
    }

    /// `GET /`: service banner, used as a health probe.
    pub async fn health(&self) -> Result<Value> {
        let resp = self.send(self.http.get(self.url("/"))).await?;
        json_body(resp).await
    }

    /// Send a request, mapping connection failures to `Transport` and
    /// non-success statuses to `Service`.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        let resp = request
            .send()
            .await
            .map_err(|e| FlowError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        // Prefer the service's JSON error body; fall back to the bare status.
        let body = match resp.text().await {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(json) => json.to_string(),
                Err(_) => String::new(),
            },
            Err(_) => String::new(),
        };
        warn!(status = status.as_u16(), body = %body, "Execution service returned error");
        Err(FlowError::Service {
            status: status.as_u16(),
            body,
        })
    }
}

async fn json_body(resp: Response) -> Result<Value> {
    let text = resp
        .text()
        .await
        .map_err(|e| FlowError::Transport(format!("Failed to read response body: {}", e)))?;
    serde_json::from_str(&text)
        .map_err(|e| FlowError::Protocol(format!("response is not JSON: {}", e)))
}

/// Pull `execution_id` out of a submit reply.
fn execution_handle(body: &Value) -> Result<ExecutionHandle> {
    body.get("execution_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(ExecutionHandle::new)
        .ok_or_else(|| FlowError::Protocol("no execution id in submit response".into()))
}

impl ExecutionService for HttpExecutionClient {
    fn submit(&self, document: &WorkflowDefinition) -> BoxFuture<'_, Result<ExecutionHandle>> {
        let document = document.clone();
        Box::pin(async move {
            debug!(
                workflow_id = %document.workflow_id,
                nodes = document.nodes.len(),
                edges = document.edges.len(),
                "Submitting workflow"
            );
            let resp = self
                .send(self.http.post(self.url("/workflow/execute")).json(&document))
                .await?;
            let body = json_body(resp).await?;
            execution_handle(&body)
        })
    }

    fn fetch_status(&self, execution_id: &str) -> BoxFuture<'_, Result<StatusReport>> {
        let url = self.execution_url("status", execution_id);
        Box::pin(async move {
            debug!(url = %url, "Fetching execution status");
            let resp = self.send(self.http.get(url)).await?;
            StatusReport::from_value(json_body(resp).await?)
        })
    }

    fn request_stop(&self, execution_id: &str) -> BoxFuture<'_, Result<bool>> {
        let url = self.execution_url("stop", execution_id);
        Box::pin(async move {
            debug!(url = %url, "Requesting stop");
            match self.send(self.http.post(url)).await {
                Ok(_) => Ok(true),
                Err(FlowError::Service { status, .. }) => {
                    debug!(status, "Stop request rejected");
                    Ok(false)
                }
                Err(e) => Err(e),
            }
        })
    }
}
