//! Risk item model: an escalated finding tied to one asset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workflow status of a risk item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskStatus {
    Open,
    InProgress,
    Closed,
}

impl std::fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskStatus::Open => write!(f, "Open"),
            RiskStatus::InProgress => write!(f, "In-Progress"),
            RiskStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// An escalated finding requiring tracked remediation work.
///
/// Upsert key is `(asset_id, title)`: re-triggering the same finding
/// refreshes score, due date, and status rather than duplicating the row.
/// Re-upsert sets `status = Open` even if the item was closed; recurrence
/// re-alerts. Closing happens only through an external workflow action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskItem {
    /// Unique identifier.
    pub id: Uuid,
    /// Asset this finding applies to.
    pub asset_id: Uuid,
    /// Derived from source + indicator; half of the upsert key.
    pub title: String,
    /// Workflow status.
    pub status: RiskStatus,
    /// Asset criticality × detection severity.
    pub score: u32,
    /// Responsible owner.
    pub owner: String,
    /// Remediation deadline.
    pub due: DateTime<Utc>,
    /// Number of times this finding has triggered.
    pub hit_count: u32,
    /// When the item was first opened.
    pub created_at: DateTime<Utc>,
    /// Last refresh time.
    pub updated_at: DateTime<Utc>,
}
