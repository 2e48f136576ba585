//! Detection correlation batch.
//!
//! Pulls recent intel, groups it by detection key, and reconciles each
//! group against the detection store: merge into a live detection where
//! one exists inside the evaluation window, otherwise score and create a
//! new one. Per-group failures are counted and logged; the batch always
//! runs to completion.

use crate::error::PipelineError;
use crate::grouper::group_records;
use crate::pipeline::Pipeline;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use wp_core::models::IntelRecord;
use wp_core::scoring::score_group;
use wp_core::{Alert, AlertKind};

/// Counters for one correlation run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CorrelationSummary {
    /// Detections created this run.
    pub new_detections: u32,
    /// Groups merged into an existing open detection.
    pub deduped: u32,
    /// Detection alerts actually delivered.
    pub alerts_sent: u32,
    /// Risk items opened or refreshed by escalation.
    pub risk_items_opened: u32,
    /// Groups that failed and were skipped.
    pub failures: u32,
}

impl Pipeline {
    /// Runs one correlation pass over intel observed in the last `since`.
    pub async fn run_correlation(
        &self,
        since: Duration,
    ) -> Result<CorrelationSummary, PipelineError> {
        if since <= Duration::zero() {
            return Err(PipelineError::Validation(
                "correlation lookback must be positive".to_string(),
            ));
        }
        self.run_correlation_at(Utc::now(), since).await
    }

    /// Correlation pass with an explicit clock, for deterministic tests.
    pub async fn run_correlation_at(
        &self,
        now: DateTime<Utc>,
        since: Duration,
    ) -> Result<CorrelationSummary, PipelineError> {
        let records = self.intel.list_observed_since(now - since).await?;
        let groups = group_records(records);
        info!(groups = groups.len(), "correlation pass started");

        let mut summary = CorrelationSummary::default();
        for group in groups {
            match self.reconcile_group(&group, now).await {
                Ok(outcome) => {
                    summary.new_detections += outcome.created as u32;
                    summary.deduped += outcome.merged as u32;
                    summary.alerts_sent += outcome.alerted as u32;
                    summary.risk_items_opened += outcome.escalated as u32;
                }
                Err(err) => {
                    summary.failures += 1;
                    error!(
                        indicator = group.first().map(|r| r.indicator.as_str()).unwrap_or(""),
                        %err,
                        "group reconcile failed, continuing batch"
                    );
                }
            }
        }

        info!(
            new_detections = summary.new_detections,
            deduped = summary.deduped,
            alerts_sent = summary.alerts_sent,
            risk_items_opened = summary.risk_items_opened,
            failures = summary.failures,
            "correlation pass finished"
        );
        Ok(summary)
    }

    /// Reconciles one intel group: merge if an open detection exists for
    /// its key inside the evaluation window, otherwise create.
    async fn reconcile_group(
        &self,
        group: &[IntelRecord],
        now: DateTime<Utc>,
    ) -> Result<GroupOutcome, PipelineError> {
        let Some(base) = group.first() else {
            return Ok(GroupOutcome::default());
        };
        let key = wp_core::models::DetectionKey {
            asset_id: base.asset_id,
            indicator: base.indicator.clone(),
            source: base.source.clone(),
        };

        let window_start = now - Duration::hours(self.config.evaluation_window_hours);
        if let Some(mut existing) = self.detections.find_open_by_key(&key, window_start).await? {
            // Cheap merge: evidence counters only, no rescore.
            existing.hit_count += group.len() as u32;
            existing.last_seen = now;
            for record in group {
                if !existing.source_record_refs.contains(&record.id) {
                    existing.source_record_refs.push(record.id);
                }
            }
            self.detections.update(&existing).await?;
            debug!(detection_id = %existing.id, hits = existing.hit_count, "merged into open detection");
            return Ok(GroupOutcome {
                merged: true,
                ..GroupOutcome::default()
            });
        }

        let Some(detection) = score_group(&self.scoring, &self.matcher, group, now) else {
            return Ok(GroupOutcome::default());
        };
        self.detections.insert(detection.clone()).await?;
        info!(
            detection_id = %detection.id,
            severity = detection.severity,
            confidence = detection.confidence,
            "detection created"
        );

        let escalated = self.escalate_detection(&detection, now).await?.is_some();

        let mut alerted = false;
        if detection.severity >= self.config.alert_severity_threshold {
            let alert = Alert {
                kind: AlertKind::Detection,
                subject_id: detection.id,
                severity: format!("{}/5", detection.severity),
                message: detection.note.clone(),
                raised_at: now,
            };
            match self.alerts.notify(alert).await {
                Ok(()) => alerted = true,
                // Alerting is best-effort; the detection already exists.
                Err(err) => warn!(detection_id = %detection.id, %err, "detection alert failed"),
            }
        }

        Ok(GroupOutcome {
            created: true,
            alerted,
            escalated,
            ..GroupOutcome::default()
        })
    }
}

#[derive(Debug, Default)]
struct GroupOutcome {
    created: bool,
    merged: bool,
    alerted: bool,
    escalated: bool,
}
