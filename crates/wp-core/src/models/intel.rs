//! Intelligence record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of indicator an intelligence record carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorType {
    /// IPv4 or IPv6 address.
    Ip,
    /// DNS domain name.
    Domain,
    /// Hostname of an internal asset.
    Hostname,
    /// File hash (MD5, SHA1, SHA256).
    Hash,
    /// URL.
    Url,
    /// Anything else a feed may emit.
    Other(String),
}

impl std::fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndicatorType::Ip => write!(f, "ip"),
            IndicatorType::Domain => write!(f, "domain"),
            IndicatorType::Hostname => write!(f, "hostname"),
            IndicatorType::Hash => write!(f, "hash"),
            IndicatorType::Url => write!(f, "url"),
            IndicatorType::Other(name) => write!(f, "other:{}", name),
        }
    }
}

/// One observation from a third-party threat-intelligence feed.
///
/// Records are immutable once stored; the feed adapters that produce them
/// are external collaborators. `asset_id` is resolved ahead of time by an
/// identity-matching collaborator and may legitimately be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelRecord {
    /// Unique identifier for this record.
    pub id: Uuid,
    /// Feed that produced the observation (e.g. "shodan", "otx").
    pub source: String,
    /// Observed indicator value (address, hostname, hash, ...).
    pub indicator: String,
    /// Kind of the indicator.
    pub indicator_type: IndicatorType,
    /// Affected asset, when one could be resolved.
    pub asset_id: Option<Uuid>,
    /// Feed-supplied severity hint, 1-5.
    pub severity_hint: u8,
    /// Free-text summary from the feed.
    pub summary: String,
    /// When the activity was observed.
    pub observed_at: DateTime<Utc>,
}

impl IntelRecord {
    /// Creates a record observed now.
    pub fn new(
        source: impl Into<String>,
        indicator: impl Into<String>,
        indicator_type: IndicatorType,
        asset_id: Option<Uuid>,
        severity_hint: u8,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            indicator: indicator.into(),
            indicator_type,
            asset_id,
            severity_hint,
            summary: summary.into(),
            observed_at: Utc::now(),
        }
    }
}
