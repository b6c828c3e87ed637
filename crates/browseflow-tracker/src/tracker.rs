use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use browseflow_client::ExecutionService;
use browseflow_core::config::TrackerConfig;
use browseflow_core::error::Result;
use browseflow_core::types::{status_text, ExecutionHandle, ExecutionState, StatusReport};
use browseflow_graph::{validate, WorkflowDefinition};

/// Error text when the service reports failure without a reason.
const GENERIC_FAILURE: &str = "Execution failed";
const TIMEOUT_MESSAGE: &str = "Execution timed out";

/// Observable state of one tracker.
#[derive(Debug, Clone, Default)]
pub struct TrackerSnapshot {
    pub state: ExecutionState,
    pub handle: Option<ExecutionHandle>,
    /// Display text for the latest status.
    pub status_text: String,
    pub error: Option<String>,
    /// Status queries issued for the current run.
    pub attempts: u32,
    pub last_report: Option<StatusReport>,
    /// Bumped on every accepted submission; stale pollers compare against it.
    pub run: u64,
}

/// What `submit` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted by the service; polling has started.
    Started(ExecutionHandle),
    /// The attempt ended in `failed`; carries the error text.
    Failed(String),
    /// A run is already starting or running; nothing changed.
    Busy,
}

/// Cancellation handle for a detached polling task.
pub struct PollHandle {
    cancel: CancellationToken,
}

impl PollHandle {
    /// Stop scheduling further ticks. An in-flight status query is not
    /// aborted, but its reply can no longer change the state.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Drives one execution at a time through
/// `idle -> starting -> running -> {completed | failed | timed_out | stopped}`.
///
/// All transitions go through a single `watch` channel, so observers see
/// every state in order and only the tracker writes it.
pub struct ExecutionTracker {
    service: Arc<dyn ExecutionService>,
    config: TrackerConfig,
    validate_before_submit: bool,
    state: Arc<watch::Sender<TrackerSnapshot>>,
    poller: Mutex<Option<PollHandle>>,
}

impl ExecutionTracker {
    pub fn new(service: Arc<dyn ExecutionService>, config: TrackerConfig) -> Self {
        let (tx, _) = watch::channel(TrackerSnapshot::default());
        Self {
            service,
            config,
            validate_before_submit: false,
            state: Arc::new(tx),
            poller: Mutex::new(None),
        }
    }

    /// Validate documents before sending them; invalid ones fail locally.
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_before_submit = enabled;
        self
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.state.borrow().clone()
    }

    pub fn state(&self) -> ExecutionState {
        self.state.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.state.subscribe()
    }

    /// Submit a workflow. Ignored while a run is starting or running.
    pub async fn submit(&self, document: WorkflowDefinition) -> SubmitOutcome {
        let mut run = None;
        self.state.send_if_modified(|s| {
            if s.state.is_busy() {
                return false;
            }
            *s = TrackerSnapshot {
                state: ExecutionState::Starting,
                status_text: "Starting...".to_string(),
                run: s.run + 1,
                ..TrackerSnapshot::default()
            };
            run = Some(s.run);
            true
        });
        let Some(run) = run else {
            debug!("Submit ignored, execution already in flight");
            return SubmitOutcome::Busy;
        };

        if let Some(previous) = self.take_poller() {
            previous.cancel();
        }

        info!(workflow_id = %document.workflow_id, run, "Submitting workflow");

        if self.validate_before_submit {
            if let Err(e) = validate(&document.to_graph()).into_result() {
                return self.fail_submission(run, e.to_string());
            }
        }

        let handle = match self.service.submit(&document).await {
            Ok(handle) => handle,
            Err(e) => return self.fail_submission(run, e.to_string()),
        };

        let moved = self.state.send_if_modified(|s| {
            if s.run != run || s.state != ExecutionState::Starting {
                return false;
            }
            s.state = ExecutionState::Running;
            s.handle = Some(handle.clone());
            s.status_text = status_text("running");
            true
        });
        if !moved {
            return SubmitOutcome::Failed("Submission superseded".to_string());
        }

        info!(execution_id = %handle, "Execution started, polling status");
        let poller = self.spawn_poller(handle.clone(), run);
        if let Ok(mut slot) = self.poller.lock() {
            *slot = Some(poller);
        }
        SubmitOutcome::Started(handle)
    }

    /// Ask the service to stop the current run. On acceptance the state
    /// becomes `stopped` and polling halts; otherwise nothing changes and
    /// the caller may retry.
    pub async fn stop(&self) -> Result<bool> {
        let (run, handle) = {
            let s = self.state.borrow();
            match (&s.state, &s.handle) {
                (ExecutionState::Running, Some(h)) => (s.run, h.clone()),
                _ => return Ok(false),
            }
        };

        let accepted = match self.service.request_stop(handle.as_str()).await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(execution_id = %handle, error = %e, "Stop request failed");
                return Err(e);
            }
        };
        if !accepted {
            warn!(execution_id = %handle, "Stop request rejected by service");
            return Ok(false);
        }

        let stopped = self.state.send_if_modified(|s| {
            if s.run != run || s.state != ExecutionState::Running {
                return false;
            }
            s.state = ExecutionState::Stopped;
            s.status_text = status_text("stopped");
            true
        });
        if let Some(poller) = self.take_poller() {
            poller.cancel();
        }
        if stopped {
            info!(execution_id = %handle, "Execution stopped");
        }
        Ok(stopped)
    }

    /// Resolve once the tracker is idle or in a terminal state.
    pub async fn wait_terminal(&self) -> TrackerSnapshot {
        let mut rx = self.state.subscribe();
        let result = match rx.wait_for(|s| !s.state.is_busy()).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        };
        result
    }

    fn fail_submission(&self, run: u64, message: String) -> SubmitOutcome {
        error!(run, error = %message, "Workflow submission failed");
        self.state.send_if_modified(|s| {
            if s.run != run {
                return false;
            }
            s.state = ExecutionState::Failed;
            s.status_text = status_text("failed");
            s.error = Some(message.clone());
            true
        });
        SubmitOutcome::Failed(message)
    }

    fn take_poller(&self) -> Option<PollHandle> {
        self.poller.lock().ok().and_then(|mut slot| slot.take())
    }

    fn spawn_poller(&self, handle: ExecutionHandle, run: u64) -> PollHandle {
        let cancel = CancellationToken::new();
        let poll = StatusPoller {
            service: self.service.clone(),
            state: self.state.clone(),
            interval: self.config.poll_interval(),
            max_attempts: self.config.max_poll_attempts.max(1),
            handle,
            run,
        };
        tokio::spawn(poll.run(cancel.clone()));
        PollHandle { cancel }
    }
}

impl Drop for ExecutionTracker {
    fn drop(&mut self) {
        if let Some(poller) = self.take_poller() {
            poller.cancel();
        }
    }
}

/// Outcome of one status tick.
#[derive(Debug, Clone, PartialEq)]
enum Tick {
    Continue,
    Finish(ExecutionState, Option<String>),
}

/// Map a remote status onto the local state machine. `status` is
/// authoritative; error text only decorates `failed`.
fn classify(report: &StatusReport, attempts: u32, max_attempts: u32) -> Tick {
    match report.status.as_str() {
        "completed" => Tick::Finish(ExecutionState::Completed, None),
        "failed" => Tick::Finish(
            ExecutionState::Failed,
            Some(
                report
                    .error
                    .clone()
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            ),
        ),
        "stopped" => Tick::Finish(ExecutionState::Stopped, None),
        // "running" and anything unrecognized keep polling.
        _ if attempts >= max_attempts => {
            Tick::Finish(ExecutionState::TimedOut, Some(TIMEOUT_MESSAGE.to_string()))
        }
        _ => Tick::Continue,
    }
}

/// Self-rescheduling status poll for one run.
struct StatusPoller {
    service: Arc<dyn ExecutionService>,
    state: Arc<watch::Sender<TrackerSnapshot>>,
    interval: Duration,
    max_attempts: u32,
    handle: ExecutionHandle,
    run: u64,
}

impl StatusPoller {
    async fn run(self, cancel: CancellationToken) {
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            attempts += 1;

            let result = self.service.fetch_status(self.handle.as_str()).await;
            if !self.apply(result, attempts) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        debug!(execution_id = %self.handle, attempts, "Status polling ended");
    }

    /// Record one tick. Returns whether another tick should be scheduled,
    /// which is only the case while this run is still `running`.
    fn apply(&self, result: Result<StatusReport>, attempts: u32) -> bool {
        let mut keep_polling = false;

        self.state.send_if_modified(|s| {
            // A late reply after stop or resubmission must not re-arm polling.
            if s.run != self.run || s.state != ExecutionState::Running {
                return false;
            }
            s.attempts = attempts;

            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    error!(execution_id = %self.handle, error = %e, "Status query failed");
                    s.state = ExecutionState::Failed;
                    s.status_text = status_text("failed");
                    s.error = Some(format!("Status query failed: {}", e));
                    return true;
                }
            };

            s.status_text = report.status_text();
            match classify(&report, attempts, self.max_attempts) {
                Tick::Continue => {
                    debug!(
                        execution_id = %self.handle,
                        status = %report.status,
                        attempts,
                        "Execution still running"
                    );
                    keep_polling = true;
                }
                Tick::Finish(state, error) => {
                    if state == ExecutionState::TimedOut {
                        warn!(execution_id = %self.handle, attempts, "Execution timed out");
                        s.status_text = TIMEOUT_MESSAGE.to_string();
                    } else {
                        info!(execution_id = %self.handle, state = %state, "Execution finished");
                    }
                    if state == ExecutionState::Completed && report.error.is_some() {
                        warn!(
                            execution_id = %self.handle,
                            "Service reported completed with an error message"
                        );
                    }
                    s.state = state;
                    s.error = error;
                }
            }
            s.last_report = Some(report);
            true
        });

        keep_polling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(value: serde_json::Value) -> StatusReport {
        StatusReport::from_value(value).unwrap()
    }

    #[test]
    fn test_classify_terminal_statuses() {
        assert_eq!(
            classify(&report(json!({"status": "completed"})), 1, 60),
            Tick::Finish(ExecutionState::Completed, None)
        );
        assert_eq!(
            classify(&report(json!({"status": "failed", "error": "boom"})), 1, 60),
            Tick::Finish(ExecutionState::Failed, Some("boom".into()))
        );
        assert_eq!(
            classify(&report(json!({"status": "failed"})), 1, 60),
            Tick::Finish(ExecutionState::Failed, Some(GENERIC_FAILURE.into()))
        );
    }

    #[test]
    fn test_classify_completed_ignores_error_text() {
        assert_eq!(
            classify(&report(json!({"status": "completed", "error": "noise"})), 3, 60),
            Tick::Finish(ExecutionState::Completed, None)
        );
    }

    #[test]
    fn test_classify_unknown_status_keeps_polling() {
        assert_eq!(
            classify(&report(json!({"status": "queued"})), 59, 60),
            Tick::Continue
        );
        assert_eq!(
            classify(&report(json!({"status": "queued"})), 60, 60),
            Tick::Finish(ExecutionState::TimedOut, Some(TIMEOUT_MESSAGE.into()))
        );
    }

    #[test]
    fn test_classify_completed_on_last_attempt_wins() {
        assert_eq!(
            classify(&report(json!({"status": "completed"})), 60, 60),
            Tick::Finish(ExecutionState::Completed, None)
        );
    }
}
