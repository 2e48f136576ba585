//! # wp-pipeline
//!
//! The detection-correlation and incident-lifecycle pipeline.
//!
//! Intelligence records flow one direction: records are grouped by dedup
//! key and scored into detections, qualifying detections escalate into
//! risk items, and detections correlate into incidents with playbook
//! tasks and a timeline. The [`Scheduler`] drives the whole pipeline
//! periodically under a lease-based single-flight lock; the same
//! operations are safe to invoke ad hoc because every mutation is an
//! upsert keyed by a natural business key.

mod correlation;
mod error;
mod escalation;
mod grouper;
mod incident_sync;
mod pipeline;
mod retry;
mod scheduler;

pub use correlation::CorrelationSummary;
pub use error::PipelineError;
pub use grouper::group_records;
pub use incident_sync::IncidentSyncSummary;
pub use pipeline::Pipeline;
pub use retry::{run_with_retries, RetryConfig};
pub use scheduler::{
    Scheduler, SchedulerStatus, TickCounters, TickOutcome, SCHEDULER_LOCK_NAME,
};
