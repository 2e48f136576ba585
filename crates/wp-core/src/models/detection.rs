//! Detection model: the unit of correlated evidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// The tuple identifying "the same underlying finding" for detections.
///
/// Equality is exact: a `None` asset slot is a valid key part and never
/// merges with a record that resolved to a real asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DetectionKey {
    /// Affected asset, if resolved.
    pub asset_id: Option<Uuid>,
    /// Indicator value.
    pub indicator: String,
    /// Feed name.
    pub source: String,
}

/// Correlated evidence for one (asset, indicator, source) finding.
///
/// At most one open detection exists per key within the rolling evaluation
/// window; repeated evidence inside the window increments `hit_count` and
/// advances `last_seen` instead of creating a new row. Detections are never
/// deleted, only superseded by window expiry of their openness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Unique identifier.
    pub id: Uuid,
    /// Affected asset, if resolved.
    pub asset_id: Option<Uuid>,
    /// Feed that produced the evidence.
    pub source: String,
    /// Indicator value.
    pub indicator: String,
    /// Severity 1-5, clamped at scoring time.
    pub severity: u8,
    /// Confidence 0-100.
    pub confidence: u8,
    /// ATT&CK technique tags matched from the evidence text.
    pub ttps: BTreeSet<String>,
    /// Analyst note, at most 240 characters.
    pub note: String,
    /// First time evidence for this key was seen.
    pub first_seen: DateTime<Utc>,
    /// Most recent evidence time.
    pub last_seen: DateTime<Utc>,
    /// Total intelligence records folded into this detection.
    pub hit_count: u32,
    /// Ids of the contributing intelligence records.
    pub source_record_refs: Vec<Uuid>,
    /// Whether the incident correlator has already processed this detection.
    pub incident_handled: bool,
}

impl Detection {
    /// Returns the dedup key for this detection.
    pub fn key(&self) -> DetectionKey {
        DetectionKey {
            asset_id: self.asset_id,
            indicator: self.indicator.clone(),
            source: self.source.clone(),
        }
    }
}
