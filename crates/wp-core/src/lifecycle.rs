//! Incident lifecycle state machine and SLA derivation.
//!
//! Phases form a strict linear chain
//! `Open → Triage → Containment → Eradication → Recovery → Closed`:
//! no skipping, no reopening from Closed. A self-transition is an accepted
//! no-op; an illegal transition is rejected with the incident unchanged.
//! Either way the caller gets a tagged [`TransitionOutcome`] instead of a
//! silent overloaded return value, so "accepted" and "rejected" are
//! distinguishable without diffing before/after state.

use crate::models::{Incident, IncidentPhase, SlaStatus, TimelineEntry, TimelineEventType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sentinel actor when neither an explicit actor nor an owner exists.
pub const DEFAULT_ACTOR: &str = "user";

/// Result of a transition request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOutcome {
    /// Whether the request was accepted (self-transitions count as
    /// accepted no-ops; illegal requests are rejections).
    pub accepted: bool,
    /// The incident after the request. Unchanged unless a real phase
    /// change was accepted.
    pub incident: Incident,
    /// Timeline entry to append, present only for real phase changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimelineEntry>,
}

/// Applies a phase-transition request to an incident.
///
/// On an accepted real transition: `updated_at = now`, the cached SLA
/// status is recomputed, `closed_at` is set exactly when the new phase is
/// `Closed`, and a `status_change` timeline entry is produced. The actor
/// resolves as: explicit actor, else incident owner, else `"user"`.
pub fn transition(
    incident: &Incident,
    new_phase: IncidentPhase,
    actor: Option<&str>,
    now: DateTime<Utc>,
) -> TransitionOutcome {
    let current = incident.status;

    // Same status is an accepted no-op.
    if new_phase == current {
        return TransitionOutcome {
            accepted: true,
            incident: incident.clone(),
            timeline: None,
        };
    }

    if current.next() != Some(new_phase) {
        debug!(
            incident_id = %incident.id,
            from = %current,
            to = %new_phase,
            "rejected illegal phase transition"
        );
        return TransitionOutcome {
            accepted: false,
            incident: incident.clone(),
            timeline: None,
        };
    }

    let actor = actor
        .map(str::to_string)
        .or_else(|| incident.owner.clone())
        .unwrap_or_else(|| DEFAULT_ACTOR.to_string());

    let mut updated = incident.clone();
    updated.status = new_phase;
    updated.updated_at = now;
    updated.sla_status = compute_sla_status(now, updated.opened_at, updated.sla_due_at);
    if new_phase == IncidentPhase::Closed {
        updated.closed_at = Some(now);
    }

    let timeline = TimelineEntry::new(
        incident.id,
        now,
        actor,
        TimelineEventType::StatusChange,
        serde_json::json!({
            "from": current.to_string(),
            "to": new_phase.to_string(),
        }),
    );

    TransitionOutcome {
        accepted: true,
        incident: updated,
        timeline: Some(timeline),
    }
}

/// Derives the SLA status of an incident at `now`.
///
/// A degenerate window (`sla_due_at <= opened_at`) is breached outright;
/// past the deadline is breached; under 25% of the window remaining is
/// at-risk; otherwise ok.
pub fn compute_sla_status(
    now: DateTime<Utc>,
    opened_at: DateTime<Utc>,
    sla_due_at: DateTime<Utc>,
) -> SlaStatus {
    let total = (sla_due_at - opened_at).num_seconds();
    let remaining = (sla_due_at - now).num_seconds();

    if total <= 0 || remaining <= 0 {
        return SlaStatus::Breached;
    }
    if (remaining as f64) / (total as f64) < 0.25 {
        return SlaStatus::AtRisk;
    }
    SlaStatus::Ok
}
