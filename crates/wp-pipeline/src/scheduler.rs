//! Periodic pipeline scheduler with a lease-based single-flight lock.
//!
//! Each tick: sleep a random jitter, try to acquire the shared lease,
//! and if it is held elsewhere skip the tick as a routine outcome. The
//! holder runs correlation then incident sync under a hard timeout and
//! a transient-error retry policy, and always releases the lease before
//! the tick ends. The lease TTL is strictly shorter than the interval,
//! so a crashed holder's lock expires before the next tick needs it.

use crate::correlation::CorrelationSummary;
use crate::error::PipelineError;
use crate::incident_sync::IncidentSyncSummary;
use crate::pipeline::Pipeline;
use crate::retry::{run_with_retries, RetryConfig};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn, Instrument};
use wp_core::{LockStore, SchedulerConfig};

/// Lease name shared by every scheduler replica.
pub const SCHEDULER_LOCK_NAME: &str = "scheduler:main";

/// Counters from one successful pipeline run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TickCounters {
    /// Correlation pass counters.
    pub correlation: CorrelationSummary,
    /// Incident sync pass counters.
    pub incident_sync: IncidentSyncSummary,
}

/// Outcome of the most recent tick.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum TickOutcome {
    /// No tick has completed yet.
    NeverRan,
    /// Another holder had the lease; nothing ran.
    Skipped,
    /// The pipeline ran to completion.
    Success(TickCounters),
    /// The run exceeded the hard timeout and was abandoned.
    TimedOut,
    /// The run failed after exhausting retries.
    Failed(String),
}

/// Point-in-time scheduler status for operators.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Whether the periodic loop is running.
    pub running: bool,
    /// Estimated time of the next tick attempt, when running.
    pub next_run_estimate: Option<DateTime<Utc>>,
    /// Outcome of the most recent tick.
    pub last_outcome: TickOutcome,
}

struct SchedulerState {
    running: bool,
    next_run_estimate: Option<DateTime<Utc>>,
    last_outcome: TickOutcome,
}

/// Drives the pipeline periodically under the single-flight lease.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    locks: Arc<dyn LockStore>,
    config: SchedulerConfig,
    retry: RetryConfig,
    state: Arc<RwLock<SchedulerState>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Scheduler {
    /// Creates a scheduler over the pipeline and lock store.
    pub fn new(
        pipeline: Arc<Pipeline>,
        locks: Arc<dyn LockStore>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let retry = RetryConfig::from_scheduler(&config);
        Self {
            pipeline,
            locks,
            config,
            retry,
            state: Arc::new(RwLock::new(SchedulerState {
                running: false,
                next_run_estimate: None,
                last_outcome: TickOutcome::NeverRan,
            })),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Current status snapshot.
    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.read().await;
        SchedulerStatus {
            running: state.running,
            next_run_estimate: state.next_run_estimate,
            last_outcome: state.last_outcome.clone(),
        }
    }

    /// Signals the periodic loop to stop after the current tick.
    pub fn shutdown(&self) {
        // Send only fails when every receiver is gone, i.e. no loop runs.
        let _ = self.shutdown_tx.send(true);
    }

    /// Runs the periodic loop until [`Scheduler::shutdown`] is called.
    pub async fn run(&self) {
        let interval = Duration::from_secs(self.config.interval_secs);
        let mut shutdown_rx = self.shutdown_rx.clone();
        {
            let mut state = self.state.write().await;
            state.running = true;
            state.next_run_estimate = Some(Utc::now());
        }
        info!(
            interval_secs = self.config.interval_secs,
            lock_ttl_secs = self.config.lock_ttl_secs,
            "scheduler started"
        );

        loop {
            let outcome = self.tick().await;
            {
                let mut state = self.state.write().await;
                state.last_outcome = outcome;
                state.next_run_estimate =
                    Some(Utc::now() + ChronoDuration::seconds(self.config.interval_secs as i64));
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        let mut state = self.state.write().await;
        state.running = false;
        state.next_run_estimate = None;
        info!("scheduler stopped");
    }

    /// Runs a single tick: jitter, lease acquisition, guarded run, release.
    pub async fn tick(&self) -> TickOutcome {
        let jitter_ms = if self.config.jitter_secs > 0 {
            rand::thread_rng().gen_range(0..=self.config.jitter_secs * 1000)
        } else {
            0
        };
        if jitter_ms > 0 {
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
        }

        let ttl = Duration::from_secs(self.config.lock_ttl_secs);
        let acquired = match self.locks.try_acquire(SCHEDULER_LOCK_NAME, ttl).await {
            Ok(acquired) => acquired,
            Err(err) => {
                error!(%err, "lease acquisition failed");
                return TickOutcome::Failed(err.to_string());
            }
        };
        if !acquired {
            // Routine in multi-replica deployments, not an error.
            info!(lock = SCHEDULER_LOCK_NAME, "lease held elsewhere, skipping tick");
            return TickOutcome::Skipped;
        }

        let outcome = self
            .guarded_run()
            .instrument(wp_observability::tick_span!(SCHEDULER_LOCK_NAME))
            .await;

        // The lease is released on every path, including timeout; the TTL
        // only backstops a crashed holder.
        if let Err(err) = self.locks.release(SCHEDULER_LOCK_NAME).await {
            warn!(%err, "lease release failed, TTL expiry will recover it");
        }
        outcome
    }

    /// Runs the pipeline under the hard timeout and retry policy.
    async fn guarded_run(&self) -> TickOutcome {
        let timeout = Duration::from_secs(self.config.run_timeout_secs);
        let run = run_with_retries(&self.retry, "pipeline_tick", || self.run_once());
        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(counters)) => {
                info!(
                    new_detections = counters.correlation.new_detections,
                    deduped = counters.correlation.deduped,
                    incidents_opened = counters.incident_sync.incidents_opened,
                    "tick succeeded"
                );
                TickOutcome::Success(counters)
            }
            Ok(Err(err)) => {
                error!(%err, "tick failed");
                TickOutcome::Failed(err.to_string())
            }
            Err(_) => {
                error!(timeout_secs = self.config.run_timeout_secs, "tick timed out");
                TickOutcome::TimedOut
            }
        }
    }

    /// One full pipeline run: correlation then incident sync.
    async fn run_once(&self) -> Result<TickCounters, PipelineError> {
        let lookback =
            ChronoDuration::hours(self.pipeline.config().evaluation_window_hours);
        let correlation = self.pipeline.run_correlation(lookback).await?;
        let incident_sync = self
            .pipeline
            .run_incident_sync(self.pipeline.config().incident_sync_limit)
            .await?;
        Ok(TickCounters {
            correlation,
            incident_sync,
        })
    }
}
