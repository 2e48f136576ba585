//! Incident model: the response-tracking unit plus its tasks and timeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incident priority, highest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
}

impl Priority {
    /// Maps a numeric detection severity (1-5) to a priority.
    pub fn from_detection_severity(severity: u8) -> Self {
        match severity {
            5 => Priority::P1,
            4 => Priority::P2,
            3 => Priority::P3,
            _ => Priority::P4,
        }
    }

    /// SLA window for this priority.
    ///
    /// Unrecognized severities never reach this table because the enum is
    /// closed; P3's 24h is the documented default for anything unmapped
    /// upstream.
    pub fn sla_hours(&self) -> i64 {
        match self {
            Priority::P1 => 4,
            Priority::P2 => 8,
            Priority::P3 => 24,
            Priority::P4 => 72,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::P1 => write!(f, "P1"),
            Priority::P2 => write!(f, "P2"),
            Priority::P3 => write!(f, "P3"),
            Priority::P4 => write!(f, "P4"),
        }
    }
}

/// Phases of the incident response lifecycle.
///
/// Legal transitions form a strict linear chain; see [`crate::lifecycle`].
/// Incidents opened by the correlator start in `Triage`; there is no
/// explicit entry through `Open` for detection-driven incidents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IncidentPhase {
    Open,
    Triage,
    Containment,
    Eradication,
    Recovery,
    Closed,
}

impl IncidentPhase {
    /// The single legal successor phase, if any.
    pub fn next(&self) -> Option<IncidentPhase> {
        match self {
            IncidentPhase::Open => Some(IncidentPhase::Triage),
            IncidentPhase::Triage => Some(IncidentPhase::Containment),
            IncidentPhase::Containment => Some(IncidentPhase::Eradication),
            IncidentPhase::Eradication => Some(IncidentPhase::Recovery),
            IncidentPhase::Recovery => Some(IncidentPhase::Closed),
            IncidentPhase::Closed => None,
        }
    }
}

impl std::fmt::Display for IncidentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncidentPhase::Open => write!(f, "Open"),
            IncidentPhase::Triage => write!(f, "Triage"),
            IncidentPhase::Containment => write!(f, "Containment"),
            IncidentPhase::Eradication => write!(f, "Eradication"),
            IncidentPhase::Recovery => write!(f, "Recovery"),
            IncidentPhase::Closed => write!(f, "Closed"),
        }
    }
}

/// Derived time-to-deadline health of an incident.
///
/// Never authoritative: stored only as a cache and recomputed on read and
/// on every accepted transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    Ok,
    AtRisk,
    Breached,
}

impl std::fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlaStatus::Ok => write!(f, "ok"),
            SlaStatus::AtRisk => write!(f, "at_risk"),
            SlaStatus::Breached => write!(f, "breached"),
        }
    }
}

/// Dedup key for incident correlation.
///
/// Two detections with the same key land in the same incident as long as
/// the existing incident is non-Closed and was opened within the lookback
/// window starting at `window_start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentDedupKey {
    /// Asset id as a string, empty when unresolved.
    pub asset_id: String,
    /// Indicator value, empty when absent.
    pub indicator: String,
    /// Feed name, empty when absent.
    pub source: String,
    /// Start of the dedup window this incident anchors.
    pub window_start: DateTime<Utc>,
}

/// A tracked security incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier.
    pub id: Uuid,
    /// Human-readable title.
    pub title: String,
    /// Priority/severity.
    pub severity: Priority,
    /// Current lifecycle phase.
    pub status: IncidentPhase,
    /// When the incident was opened.
    pub opened_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Set exactly when the incident enters `Closed`.
    pub closed_at: Option<DateTime<Utc>>,
    /// Assigned owner, if any.
    pub owner: Option<String>,
    /// SLA deadline.
    pub sla_due_at: DateTime<Utc>,
    /// Cached SLA status; recompute with [`Incident::current_sla_status`].
    pub sla_status: SlaStatus,
    /// Primary affected asset.
    pub primary_asset_id: Option<Uuid>,
    /// Dedup key that created this incident.
    pub dedup_key: IncidentDedupKey,
    /// Detections folded into this incident. Grows via attach.
    pub detection_refs: Vec<Uuid>,
    /// All affected assets.
    pub asset_refs: Vec<Uuid>,
    /// Linked risk items.
    pub risk_item_refs: Vec<Uuid>,
    /// Post-incident summary.
    pub summary: String,
    /// Post-incident root cause.
    pub root_cause: String,
    /// Post-incident lessons learned.
    pub lessons_learned: String,
    /// Categorization tags.
    pub tags: Vec<String>,
}

impl Incident {
    /// Recomputes the SLA status against the given clock.
    pub fn current_sla_status(&self, now: DateTime<Utc>) -> SlaStatus {
        crate::lifecycle::compute_sla_status(now, self.opened_at, self.sla_due_at)
    }
}

/// Status of a playbook task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Done,
}

/// One playbook step attached to an incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentTask {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning incident.
    pub incident_id: Uuid,
    /// Lifecycle phase this task belongs to.
    pub phase: IncidentPhase,
    /// Task title.
    pub title: String,
    /// Assigned analyst, if any.
    pub assignee: Option<String>,
    /// Due time.
    pub due_at: DateTime<Utc>,
    /// Open or Done.
    pub status: TaskStatus,
    /// Free-form notes.
    pub notes: String,
    /// Position in the playbook, starting at 1.
    pub order: u32,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Kinds of events recorded on the incident timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    /// Incident was opened.
    Opened,
    /// A detection was attached to an existing incident.
    LinkAdded,
    /// Lifecycle phase changed.
    StatusChange,
    /// An outbound notification was sent.
    Comms,
    /// Evidence was attached.
    Evidence,
}

/// Append-only timeline entry for an incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning incident.
    pub incident_id: Uuid,
    /// When the event happened.
    pub ts: DateTime<Utc>,
    /// Who caused the event.
    pub actor: String,
    /// Kind of event.
    pub event_type: TimelineEventType,
    /// Structured event detail.
    pub detail: serde_json::Value,
}

impl TimelineEntry {
    /// Creates an entry timestamped at `ts`.
    pub fn new(
        incident_id: Uuid,
        ts: DateTime<Utc>,
        actor: impl Into<String>,
        event_type: TimelineEventType,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            incident_id,
            ts,
            actor: actor.into(),
            event_type,
            detail,
        }
    }
}
