//! Detection scoring.
//!
//! Consumes a group of same-key intelligence records and produces one
//! [`Detection`] with deterministic severity, confidence, technique tags,
//! and analyst note. Deliberately simple: a fixed per-source bias table and
//! a single corroboration step for confidence, not a Bayesian model.

use crate::models::{Detection, IntelRecord};
use crate::ttp::TtpMatcher;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Maximum length of the analyst note, in characters.
pub const NOTE_MAX_CHARS: usize = 240;

/// Base confidence for a single-record detection.
const CONFIDENCE_BASE: u8 = 60;
/// Confidence boost when a second independent record corroborates.
/// Three or more records give no further boost.
const CONFIDENCE_CORROBORATION_BOOST: u8 = 20;

/// Immutable scoring configuration.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Per-source severity bias. Unknown sources bias 0.
    pub source_bias: HashMap<String, i8>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let source_bias = [
            ("shodan", 1),
            ("censys", 1),
            ("otx", 0),
            ("greynoise", 0),
            ("abuseipdb", -1),
            ("vt", 0),
        ]
        .into_iter()
        .map(|(s, b)| (s.to_string(), b))
        .collect();
        Self { source_bias }
    }
}

impl ScoringConfig {
    /// Returns the bias for a source, defaulting to 0.
    pub fn bias_for(&self, source: &str) -> i8 {
        self.source_bias.get(source).copied().unwrap_or(0)
    }
}

/// Scores a group of same-key intelligence records into one detection.
///
/// The group must be non-empty and share a dedup key; the severity hint is
/// taken from the earliest record (by `observed_at`, then id) so the result
/// is deterministic regardless of input order. `ttps` is the union of
/// matcher output over every record's summary and indicator.
pub fn score_group(
    config: &ScoringConfig,
    matcher: &TtpMatcher,
    group: &[IntelRecord],
    now: DateTime<Utc>,
) -> Option<Detection> {
    let base = group
        .iter()
        .min_by(|a, b| a.observed_at.cmp(&b.observed_at).then(a.id.cmp(&b.id)))?;

    let severity = clamp_severity(i16::from(base.severity_hint) + i16::from(config.bias_for(&base.source)));

    let mut confidence = CONFIDENCE_BASE;
    if group.len() > 1 {
        confidence += CONFIDENCE_CORROBORATION_BOOST;
    }
    let confidence = confidence.min(100);

    let ttps: std::collections::BTreeSet<String> = group
        .iter()
        .flat_map(|record| matcher.matches(&format!("{} {}", record.summary, record.indicator)))
        .collect();

    let asset_label = base
        .asset_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unassigned".to_string());
    let mut note = format!(
        "{}-sev {} activity on {} ({})",
        severity, base.source, asset_label, base.indicator
    );
    if !ttps.is_empty() {
        let list: Vec<&str> = ttps.iter().map(String::as_str).collect();
        note.push_str(&format!(". TTPs: {}", list.join(", ")));
    }
    note.push_str(". Review logs and consider mitigation.");
    // Hard truncation; cutting mid-sentence is accepted behavior.
    let note: String = note.chars().take(NOTE_MAX_CHARS).collect();

    Some(Detection {
        id: Uuid::new_v4(),
        asset_id: base.asset_id,
        source: base.source.clone(),
        indicator: base.indicator.clone(),
        severity,
        confidence,
        ttps,
        note,
        first_seen: now,
        last_seen: now,
        hit_count: group.len() as u32,
        source_record_refs: group.iter().map(|r| r.id).collect(),
        incident_handled: false,
    })
}

fn clamp_severity(raw: i16) -> u8 {
    raw.clamp(1, 5) as u8
}
