//! Correlation grouper.
//!
//! Partitions a batch of intelligence records into groups sharing a dedup
//! key. Group membership uses exact key equality: a record with a missing
//! asset slot still groups, but never merges with one that resolved to an
//! asset. Ordering is not significant to correctness, but the batch is
//! sorted before grouping so results are reproducible.

use wp_core::models::{DetectionKey, IntelRecord};

fn record_key(record: &IntelRecord) -> DetectionKey {
    DetectionKey {
        asset_id: record.asset_id,
        indicator: record.indicator.clone(),
        source: record.source.clone(),
    }
}

/// Groups records by `(asset_id, indicator, source)`.
///
/// Records are sorted by key, then `observed_at`, then id; each returned
/// group is non-empty and internally ordered the same way.
pub fn group_records(mut records: Vec<IntelRecord>) -> Vec<Vec<IntelRecord>> {
    records.sort_by(|a, b| {
        record_key(a)
            .cmp(&record_key(b))
            .then(a.observed_at.cmp(&b.observed_at))
            .then(a.id.cmp(&b.id))
    });

    let mut groups: Vec<Vec<IntelRecord>> = Vec::new();
    for record in records {
        match groups.last_mut() {
            Some(group) if record_key(&group[0]) == record_key(&record) => group.push(record),
            _ => groups.push(vec![record]),
        }
    }
    groups
}
