//! Execution tracking for submitted workflows.
//!
//! [`ExecutionTracker`] owns the lifecycle of one run at a time: it submits a
//! definition, polls the service on a fixed interval until a terminal status
//! or the attempt cap, and handles stop requests.

pub mod tracker;

pub use tracker::{ExecutionTracker, PollHandle, SubmitOutcome, TrackerSnapshot};
