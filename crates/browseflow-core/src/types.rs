use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Opaque identifier the execution service assigns to a submitted workflow.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExecutionHandle {
    #[serde(rename = "executionId")]
    pub execution_id: String,
}

impl ExecutionHandle {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.execution_id
    }
}

impl std::fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.execution_id)
    }
}

/// Local view of a tracked execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    Idle,
    Starting,
    Running,
    Completed,
    Failed,
    Stopped,
    TimedOut,
}

impl ExecutionState {
    /// Terminal states only leave through a fresh submission.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionState::Completed
                | ExecutionState::Failed
                | ExecutionState::Stopped
                | ExecutionState::TimedOut
        )
    }

    /// A submission is in flight; new submissions are ignored.
    pub fn is_busy(self) -> bool {
        matches!(self, ExecutionState::Starting | ExecutionState::Running)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Starting => "starting",
            ExecutionState::Running => "running",
            ExecutionState::Completed => "completed",
            ExecutionState::Failed => "failed",
            ExecutionState::Stopped => "stopped",
            ExecutionState::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// Human-readable text for a remote status string. Unknown values pass
/// through verbatim.
pub fn status_text(status: &str) -> String {
    match status {
        "running" => "Running...".to_string(),
        "completed" => "Completed".to_string(),
        "failed" => "Failed".to_string(),
        "stopped" => "Stopped".to_string(),
        other => other.to_string(),
    }
}

/// One step result as reported by the execution service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub node_id: String,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
}

/// Reply of `GET /workflow/status/{id}`.
///
/// `status` is kept as the raw string so backend additions are never
/// rejected; `raw` preserves the full payload for display and logging.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: String,
    pub error: Option<String>,
    pub workflow_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub total_duration: Option<f64>,
    pub steps: Vec<StepReport>,
    pub raw: serde_json::Value,
}

impl StatusReport {
    /// Parse a status payload. Only `status` is required.
    pub fn from_value(raw: serde_json::Value) -> Result<Self> {
        let status = raw
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FlowError::Protocol("status response has no 'status' field".into()))?
            .to_string();

        let str_field = |key: &str| {
            raw.get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        // Steps are decorative; a malformed list is dropped rather than failing the poll.
        let steps = raw
            .get("steps")
            .cloned()
            .and_then(|v| serde_json::from_value::<Vec<StepReport>>(v).ok())
            .unwrap_or_default();

        Ok(Self {
            error: str_field("error"),
            workflow_id: str_field("workflow_id"),
            start_time: str_field("start_time"),
            end_time: str_field("end_time"),
            total_duration: raw.get("total_duration").and_then(|v| v.as_f64()),
            steps,
            status,
            raw,
        })
    }

    pub fn status_text(&self) -> String {
        status_text(&self.status)
    }

    /// Steps the service marked as failed.
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.status == "failed")
    }
}

/// One entry of the service's `GET /nodes` catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteNodeType {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_params: Vec<String>,
    #[serde(default)]
    pub optional_params: Vec<String>,
}

/// Node catalog keyed by node type.
pub type RemoteCatalog = BTreeMap<String, RemoteNodeType>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_classification() {
        assert!(ExecutionState::Starting.is_busy());
        assert!(ExecutionState::Running.is_busy());
        assert!(!ExecutionState::Idle.is_busy());
        for s in [
            ExecutionState::Completed,
            ExecutionState::Failed,
            ExecutionState::Stopped,
            ExecutionState::TimedOut,
        ] {
            assert!(s.is_terminal());
            assert!(!s.is_busy());
        }
        assert_eq!(ExecutionState::TimedOut.to_string(), "timed_out");
    }

    #[test]
    fn test_status_text_passes_unknown_through() {
        assert_eq!(status_text("running"), "Running...");
        assert_eq!(status_text("queued"), "queued");
    }

    #[test]
    fn test_status_report_parses_backend_payload() {
        let raw = json!({
            "execution_id": "abc",
            "workflow_id": "workflow_1",
            "status": "failed",
            "error": "selector not found",
            "start_time": "2026-01-01T00:00:00",
            "total_duration": 1.5,
            "steps": [
                {"node_id": "1", "node_type": "start", "status": "success"},
                {"node_id": "2", "node_type": "click_element", "status": "failed", "error": "timeout"}
            ],
            "extra": {"kept": true}
        });
        let report = StatusReport::from_value(raw).unwrap();
        assert_eq!(report.status, "failed");
        assert_eq!(report.error.as_deref(), Some("selector not found"));
        assert_eq!(report.workflow_id.as_deref(), Some("workflow_1"));
        assert_eq!(report.total_duration, Some(1.5));
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.failed_steps().count(), 1);
        assert_eq!(report.raw["extra"]["kept"], json!(true));
    }

    #[test]
    fn test_status_report_requires_status() {
        let err = StatusReport::from_value(json!({"error": "x"})).unwrap_err();
        assert!(matches!(err, FlowError::Protocol(_)));
    }

    #[test]
    fn test_status_report_empty_error_is_none() {
        let report = StatusReport::from_value(json!({"status": "failed", "error": ""})).unwrap();
        assert!(report.error.is_none());
    }

    #[test]
    fn test_status_report_tolerates_bad_steps() {
        let report =
            StatusReport::from_value(json!({"status": "running", "steps": "nope"})).unwrap();
        assert!(report.steps.is_empty());
    }
}
