//! Fixed-playbook task generation for new incidents.

use crate::models::{IncidentPhase, IncidentTask, TaskStatus};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Auto-generated note attached to every playbook task.
const AUTO_NOTE: &str = "Auto-generated task";

/// Phase/title templates, in playbook order.
const TEMPLATES: [(IncidentPhase, &str); 5] = [
    (
        IncidentPhase::Triage,
        "Review detection details and confirm scope on affected asset(s).",
    ),
    (
        IncidentPhase::Containment,
        "Contain the incident (isolate host/account, block indicators).",
    ),
    (
        IncidentPhase::Eradication,
        "Remove malicious artifacts and confirm systems are clean.",
    ),
    (
        IncidentPhase::Recovery,
        "Restore services and monitor for recurrence.",
    ),
    (
        IncidentPhase::Closed,
        "Document incident, root cause, and lessons learned.",
    ),
];

/// Emits the fixed five-task playbook for a freshly opened incident.
///
/// Pure function of the incident id and open time: every task is due at
/// `opened_at + 2h` (not staggered per phase), open, and unassigned.
pub fn generate_playbook_tasks(incident_id: Uuid, opened_at: DateTime<Utc>) -> Vec<IncidentTask> {
    let due_at = opened_at + Duration::hours(2);
    TEMPLATES
        .iter()
        .enumerate()
        .map(|(i, (phase, title))| IncidentTask {
            id: Uuid::new_v4(),
            incident_id,
            phase: *phase,
            title: (*title).to_string(),
            assignee: None,
            due_at,
            status: TaskStatus::Open,
            notes: AUTO_NOTE.to_string(),
            order: i as u32 + 1,
            created_at: opened_at,
            updated_at: opened_at,
        })
        .collect()
}
