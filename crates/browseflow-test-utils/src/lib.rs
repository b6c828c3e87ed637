//! Shared mocks and fixtures for browseflow tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use browseflow_client::ExecutionService;
use browseflow_core::config::TrackerConfig;
use browseflow_core::error::{FlowError, Result};
use browseflow_core::types::{ExecutionHandle, StatusReport};
use browseflow_graph::{encode, Graph, NodeKind, Position, WorkflowDefinition, WorkflowMeta};

/// One scripted service reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(Value),
    Transport(String),
    Service(u16),
}

impl Reply {
    pub fn status(status: &str) -> Self {
        Reply::Status(json!({ "status": status }))
    }

    pub fn failed(error: &str) -> Self {
        Reply::Status(json!({ "status": "failed", "error": error }))
    }

    fn into_error(self) -> Option<FlowError> {
        match self {
            Reply::Status(_) => None,
            Reply::Transport(msg) => Some(FlowError::Transport(msg)),
            Reply::Service(status) => Some(FlowError::Service {
                status,
                body: String::new(),
            }),
        }
    }
}

/// In-memory `ExecutionService` that plays back queued replies and counts
/// every call.
pub struct ScriptedService {
    submit_reply: Mutex<Option<Reply>>,
    status_replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    stop_reply: Mutex<Reply>,
    status_delay: Option<Duration>,
    submit_delay: Option<Duration>,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
}

impl ScriptedService {
    /// Accepts submissions as `exec-1` and reports `running` forever.
    pub fn new() -> Self {
        Self {
            submit_reply: Mutex::new(None),
            status_replies: Mutex::new(VecDeque::new()),
            fallback: Reply::status("running"),
            stop_reply: Mutex::new(Reply::status("stopped")),
            status_delay: None,
            submit_delay: None,
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
        }
    }

    /// Fail every submission with this reply's error.
    pub fn with_submit_error(self, reply: Reply) -> Self {
        *self.submit_reply.lock().unwrap() = Some(reply);
        self
    }

    /// Queue status replies, played back in order before the fallback.
    pub fn with_statuses(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.status_replies.lock().unwrap().extend(replies);
        self
    }

    /// Reply used once the queue is empty.
    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    /// Reply to stop requests. Any `Status` reply means accepted.
    pub fn with_stop_reply(self, reply: Reply) -> Self {
        *self.stop_reply.lock().unwrap() = reply;
        self
    }

    /// Hold each status query for `delay` before replying.
    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = Some(delay);
        self
    }

    /// Hold each submission for `delay` before replying.
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    fn next_status(&self) -> Reply {
        self.status_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionService for ScriptedService {
    fn submit(&self, _document: &WorkflowDefinition) -> BoxFuture<'_, Result<ExecutionHandle>> {
        Box::pin(async move {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.submit_delay {
                tokio::time::sleep(delay).await;
            }
            let scripted = self.submit_reply.lock().unwrap().clone();
            match scripted.and_then(Reply::into_error) {
                Some(e) => Err(e),
                None => Ok(ExecutionHandle::new("exec-1")),
            }
        })
    }

    fn fetch_status(&self, _execution_id: &str) -> BoxFuture<'_, Result<StatusReport>> {
        Box::pin(async move {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.next_status();
            if let Some(delay) = self.status_delay {
                tokio::time::sleep(delay).await;
            }
            match reply {
                Reply::Status(value) => StatusReport::from_value(value),
                other => Err(other
                    .into_error()
                    .unwrap_or_else(|| FlowError::Protocol("unscripted".into()))),
            }
        })
    }

    fn request_stop(&self, _execution_id: &str) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            match self.stop_reply.lock().unwrap().clone() {
                Reply::Status(_) => Ok(true),
                Reply::Service(_) => Ok(false),
                Reply::Transport(msg) => Err(FlowError::Transport(msg)),
            }
        })
    }
}

/// Tracker settings with a one-second interval and the default attempt cap.
pub fn fast_tracker_config() -> TrackerConfig {
    TrackerConfig {
        poll_interval_secs: 1,
        ..TrackerConfig::default()
    }
}

/// Seed graph encoded as a submittable document.
pub fn seed_document() -> WorkflowDefinition {
    encode(&Graph::seed(), &WorkflowMeta::new("fixture", "test workflow"))
}

/// Document with an edge pointing at a missing node, so validation fails.
pub fn invalid_document() -> WorkflowDefinition {
    let mut graph = Graph::new();
    let start = graph.add_node(NodeKind::Start, Position { x: 0.0, y: 0.0 });
    graph.connect(&start.id, "ghost", None, None);
    encode(&graph, &WorkflowMeta::new("broken", ""))
}
