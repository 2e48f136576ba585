//! Incident correlation and lifecycle operations.
//!
//! Folds unhandled detections into incidents: attach to an open incident
//! sharing the dedup key inside the lookback window, otherwise open a new
//! one with its playbook and timeline. Also hosts the operator-facing
//! lifecycle entry points (phase transitions and task toggles).

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;
use wp_core::lifecycle;
use wp_core::models::{
    Detection, Incident, IncidentDedupKey, IncidentPhase, IncidentTask, Priority, TaskStatus,
    TimelineEntry, TimelineEventType,
};
use wp_core::{generate_playbook_tasks, Alert, AlertKind, TransitionOutcome};

/// Counters for one incident sync run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IncidentSyncSummary {
    /// Incidents opened this run.
    pub incidents_opened: u32,
    /// Detections attached to an existing open incident.
    pub incidents_attached: u32,
    /// Incident-opened alerts actually delivered.
    pub alerts_sent: u32,
    /// Detections folded into an open incident instead of opening a
    /// duplicate. Mirrors `incidents_attached` today.
    pub suppressed_duplicates: u32,
    /// Detections that failed and were left unhandled.
    pub failures: u32,
}

enum SyncOutcome {
    Attached,
    Opened { alerted: bool },
}

impl Pipeline {
    /// Runs one incident sync pass over up to `limit` unhandled detections.
    pub async fn run_incident_sync(
        &self,
        limit: usize,
    ) -> Result<IncidentSyncSummary, PipelineError> {
        if limit == 0 {
            return Err(PipelineError::Validation(
                "incident sync limit must be positive".to_string(),
            ));
        }
        self.run_incident_sync_at(Utc::now(), limit).await
    }

    /// Incident sync pass with an explicit clock, for deterministic tests.
    pub async fn run_incident_sync_at(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<IncidentSyncSummary, PipelineError> {
        let pending = self.detections.list_unhandled(limit).await?;
        info!(pending = pending.len(), "incident sync pass started");

        let mut summary = IncidentSyncSummary::default();
        for detection in pending {
            match self.sync_detection(&detection, now).await {
                Ok(outcome) => {
                    match outcome {
                        SyncOutcome::Attached => {
                            summary.incidents_attached += 1;
                            summary.suppressed_duplicates += 1;
                        }
                        SyncOutcome::Opened { alerted } => {
                            summary.incidents_opened += 1;
                            summary.alerts_sent += alerted as u32;
                        }
                    }
                    // Handled marker is what keeps this pass idempotent.
                    self.detections.mark_handled(detection.id).await?;
                }
                Err(err) => {
                    summary.failures += 1;
                    error!(detection_id = %detection.id, %err, "incident sync failed for detection");
                }
            }
        }

        info!(
            incidents_opened = summary.incidents_opened,
            incidents_attached = summary.incidents_attached,
            alerts_sent = summary.alerts_sent,
            failures = summary.failures,
            "incident sync pass finished"
        );
        Ok(summary)
    }

    /// Attaches the detection to an open incident inside the dedup window,
    /// or opens a new incident for it.
    async fn sync_detection(
        &self,
        detection: &Detection,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, PipelineError> {
        let asset_key = detection
            .asset_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let opened_after = now - Duration::hours(self.config.incident_window_hours);

        if let Some(mut incident) = self
            .incidents
            .find_open_by_dedup_key(&asset_key, &detection.indicator, &detection.source, opened_after)
            .await?
        {
            let incident_id = incident.id;
            self.attach_detection(&mut incident, detection, now)
                .instrument(wp_observability::incident_span!(incident_id))
                .await?;
            return Ok(SyncOutcome::Attached);
        }

        let alerted = self.open_incident(detection, asset_key, now).await?;
        Ok(SyncOutcome::Opened { alerted })
    }

    async fn attach_detection(
        &self,
        incident: &mut Incident,
        detection: &Detection,
        now: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        if !incident.detection_refs.contains(&detection.id) {
            incident.detection_refs.push(detection.id);
        }
        if let Some(asset_id) = detection.asset_id {
            if !incident.asset_refs.contains(&asset_id) {
                incident.asset_refs.push(asset_id);
            }
        }
        incident.updated_at = now;
        self.incidents.update(incident).await?;

        self.incidents
            .append_timeline(TimelineEntry::new(
                incident.id,
                now,
                "system",
                TimelineEventType::LinkAdded,
                json!({ "detection_id": detection.id }),
            ))
            .await?;
        info!(
            incident_id = %incident.id,
            detection_id = %detection.id,
            "detection attached to open incident"
        );
        Ok(())
    }

    /// Opens a new incident for the detection: Triage phase, SLA from
    /// priority, playbook tasks, opening timeline entry, best-effort alert.
    /// Returns whether the alert was delivered.
    async fn open_incident(
        &self,
        detection: &Detection,
        asset_key: String,
        now: DateTime<Utc>,
    ) -> Result<bool, PipelineError> {
        let priority = Priority::from_detection_severity(detection.severity);
        let sla_due_at = now + Duration::hours(priority.sla_hours());
        let title = if detection.note.is_empty() {
            format!("Incident: {} {}", detection.source, detection.indicator)
        } else {
            detection.note.clone()
        };

        let incident = Incident {
            id: Uuid::new_v4(),
            title,
            severity: priority,
            status: IncidentPhase::Triage,
            opened_at: now,
            updated_at: now,
            closed_at: None,
            owner: None,
            sla_due_at,
            sla_status: lifecycle::compute_sla_status(now, now, sla_due_at),
            primary_asset_id: detection.asset_id,
            dedup_key: IncidentDedupKey {
                asset_id: asset_key,
                indicator: detection.indicator.clone(),
                source: detection.source.clone(),
                window_start: now,
            },
            detection_refs: vec![detection.id],
            asset_refs: detection.asset_id.into_iter().collect(),
            risk_item_refs: Vec::new(),
            summary: String::new(),
            root_cause: String::new(),
            lessons_learned: String::new(),
            tags: detection.ttps.iter().cloned().collect(),
        };
        let incident_id = incident.id;
        self.incidents.insert(incident).await?;

        self.incidents
            .append_timeline(TimelineEntry::new(
                incident_id,
                now,
                "system",
                TimelineEventType::Opened,
                json!({ "detection_id": detection.id, "priority": priority.to_string() }),
            ))
            .await?;

        let tasks = generate_playbook_tasks(incident_id, now);
        self.incidents.insert_tasks(tasks).await?;
        info!(
            incident_id = %incident_id,
            detection_id = %detection.id,
            %priority,
            "incident opened with playbook"
        );

        let alert = Alert {
            kind: AlertKind::IncidentOpened,
            subject_id: incident_id,
            severity: priority.to_string(),
            message: format!(
                "{} incident opened for {} ({})",
                priority, detection.indicator, detection.source
            ),
            raised_at: now,
        };
        match self.alerts.notify(alert).await {
            Ok(()) => {
                self.incidents
                    .append_timeline(TimelineEntry::new(
                        incident_id,
                        now,
                        "system",
                        TimelineEventType::Comms,
                        json!({ "channel": "alert", "priority": priority.to_string() }),
                    ))
                    .await?;
                Ok(true)
            }
            // Alerting is best-effort; the incident already exists.
            Err(err) => {
                warn!(incident_id = %incident_id, %err, "incident alert failed");
                Ok(false)
            }
        }
    }

    /// Applies a lifecycle phase transition to an incident.
    ///
    /// Illegal transitions come back as a rejected [`TransitionOutcome`]
    /// with the incident unchanged; only unknown ids are errors.
    pub async fn transition_incident(
        &self,
        incident_id: Uuid,
        new_phase: IncidentPhase,
        actor: Option<&str>,
    ) -> Result<TransitionOutcome, PipelineError> {
        let now = Utc::now();
        let incident = self
            .incidents
            .get(incident_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("incident {incident_id}")))?;

        let outcome = lifecycle::transition(&incident, new_phase, actor, now);
        if outcome.accepted {
            self.incidents.update(&outcome.incident).await?;
            if let Some(entry) = &outcome.timeline {
                self.incidents.append_timeline(entry.clone()).await?;
            }
        }
        Ok(outcome)
    }

    /// Flips a playbook task between Open and Done.
    pub async fn toggle_task(&self, task_id: Uuid) -> Result<IncidentTask, PipelineError> {
        let mut task = self
            .incidents
            .get_task(task_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("task {task_id}")))?;

        task.status = match task.status {
            TaskStatus::Open => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Open,
        };
        task.updated_at = Utc::now();
        self.incidents.update_task(&task).await?;
        Ok(task)
    }
}
