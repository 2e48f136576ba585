//! In-memory store implementation.
//!
//! Backs unit and integration tests, and works as-is for single-node
//! deployments where durability is not required. All collections live
//! behind `tokio::sync::RwLock`; every mutation takes the write guard for
//! the shortest possible span.

use super::{
    AssetStore, DetectionStore, IncidentStore, IntelStore, RiskItemStore, RiskItemUpsert,
    StoreError,
};
use crate::models::{
    Asset, Detection, DetectionKey, Incident, IncidentPhase, IncidentTask, IntelRecord, RiskItem,
    RiskStatus, TimelineEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One in-memory backend implementing every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    intel: Arc<RwLock<Vec<IntelRecord>>>,
    detections: Arc<RwLock<HashMap<Uuid, Detection>>>,
    risk_items: Arc<RwLock<HashMap<(Uuid, String), RiskItem>>>,
    assets: Arc<RwLock<HashMap<Uuid, Asset>>>,
    incidents: Arc<RwLock<HashMap<Uuid, Incident>>>,
    tasks: Arc<RwLock<HashMap<Uuid, IncidentTask>>>,
    timeline: Arc<RwLock<Vec<TimelineEntry>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored detections. Test helper.
    pub async fn detection_count(&self) -> usize {
        self.detections.read().await.len()
    }

    /// Number of stored incidents. Test helper.
    pub async fn incident_count(&self) -> usize {
        self.incidents.read().await.len()
    }
}

#[async_trait]
impl IntelStore for MemoryStore {
    async fn append(&self, record: IntelRecord) -> Result<(), StoreError> {
        self.intel.write().await.push(record);
        Ok(())
    }

    async fn list_observed_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<IntelRecord>, StoreError> {
        let intel = self.intel.read().await;
        Ok(intel
            .iter()
            .filter(|r| r.observed_at >= since)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DetectionStore for MemoryStore {
    async fn insert(&self, detection: Detection) -> Result<(), StoreError> {
        let mut detections = self.detections.write().await;
        if detections.contains_key(&detection.id) {
            return Err(StoreError::Conflict(format!(
                "detection {} already exists",
                detection.id
            )));
        }
        detections.insert(detection.id, detection);
        Ok(())
    }

    async fn update(&self, detection: &Detection) -> Result<(), StoreError> {
        let mut detections = self.detections.write().await;
        match detections.get_mut(&detection.id) {
            Some(existing) => {
                *existing = detection.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "detection {}",
                detection.id
            ))),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Detection>, StoreError> {
        Ok(self.detections.read().await.get(&id).cloned())
    }

    async fn find_open_by_key(
        &self,
        key: &DetectionKey,
        last_seen_after: DateTime<Utc>,
    ) -> Result<Option<Detection>, StoreError> {
        let detections = self.detections.read().await;
        Ok(detections
            .values()
            .filter(|d| d.key() == *key && d.last_seen >= last_seen_after)
            .max_by_key(|d| d.last_seen)
            .cloned())
    }

    async fn list_unhandled(&self, limit: usize) -> Result<Vec<Detection>, StoreError> {
        let detections = self.detections.read().await;
        let mut unhandled: Vec<Detection> = detections
            .values()
            .filter(|d| !d.incident_handled)
            .cloned()
            .collect();
        unhandled.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then(a.id.cmp(&b.id)));
        unhandled.truncate(limit);
        Ok(unhandled)
    }

    async fn mark_handled(&self, id: Uuid) -> Result<(), StoreError> {
        let mut detections = self.detections.write().await;
        match detections.get_mut(&id) {
            Some(detection) => {
                detection.incident_handled = true;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("detection {}", id))),
        }
    }

    async fn max_severity_for_asset(
        &self,
        asset_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<u8>, StoreError> {
        let detections = self.detections.read().await;
        Ok(detections
            .values()
            .filter(|d| d.asset_id == Some(asset_id) && d.last_seen >= since)
            .map(|d| d.severity)
            .max())
    }
}

#[async_trait]
impl RiskItemStore for MemoryStore {
    async fn upsert(
        &self,
        fields: RiskItemUpsert,
        now: DateTime<Utc>,
    ) -> Result<(RiskItem, bool), StoreError> {
        let mut items = self.risk_items.write().await;
        let key = (fields.asset_id, fields.title.clone());
        match items.get_mut(&key) {
            Some(item) => {
                item.status = RiskStatus::Open;
                item.score = fields.score;
                item.owner = fields.owner;
                item.due = fields.due;
                item.hit_count += 1;
                item.updated_at = now;
                Ok((item.clone(), false))
            }
            None => {
                let item = RiskItem {
                    id: Uuid::new_v4(),
                    asset_id: fields.asset_id,
                    title: fields.title,
                    status: RiskStatus::Open,
                    score: fields.score,
                    owner: fields.owner,
                    due: fields.due,
                    hit_count: 1,
                    created_at: now,
                    updated_at: now,
                };
                items.insert(key, item.clone());
                Ok((item, true))
            }
        }
    }

    async fn get_by_key(
        &self,
        asset_id: Uuid,
        title: &str,
    ) -> Result<Option<RiskItem>, StoreError> {
        let items = self.risk_items.read().await;
        Ok(items.get(&(asset_id, title.to_string())).cloned())
    }

    async fn list(&self) -> Result<Vec<RiskItem>, StoreError> {
        let items = self.risk_items.read().await;
        let mut all: Vec<RiskItem> = items.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Asset>, StoreError> {
        Ok(self.assets.read().await.get(&id).cloned())
    }

    async fn upsert(&self, asset: Asset) -> Result<(), StoreError> {
        self.assets.write().await.insert(asset.id, asset);
        Ok(())
    }

    async fn set_risk_score(&self, id: Uuid, risk_score: u32) -> Result<(), StoreError> {
        let mut assets = self.assets.write().await;
        match assets.get_mut(&id) {
            Some(asset) => {
                asset.risk_score = risk_score;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("asset {}", id))),
        }
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn insert(&self, incident: Incident) -> Result<(), StoreError> {
        let mut incidents = self.incidents.write().await;
        if incidents.contains_key(&incident.id) {
            return Err(StoreError::Conflict(format!(
                "incident {} already exists",
                incident.id
            )));
        }
        incidents.insert(incident.id, incident);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Incident>, StoreError> {
        Ok(self.incidents.read().await.get(&id).cloned())
    }

    async fn update(&self, incident: &Incident) -> Result<(), StoreError> {
        let mut incidents = self.incidents.write().await;
        match incidents.get_mut(&incident.id) {
            Some(existing) => {
                *existing = incident.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("incident {}", incident.id))),
        }
    }

    async fn find_open_by_dedup_key(
        &self,
        asset_id: &str,
        indicator: &str,
        source: &str,
        opened_after: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError> {
        let incidents = self.incidents.read().await;
        Ok(incidents
            .values()
            .filter(|i| {
                i.status != IncidentPhase::Closed
                    && i.dedup_key.asset_id == asset_id
                    && i.dedup_key.indicator == indicator
                    && i.dedup_key.source == source
                    && i.opened_at >= opened_after
            })
            .max_by_key(|i| i.opened_at)
            .cloned())
    }

    async fn insert_tasks(&self, new_tasks: Vec<IncidentTask>) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        for task in new_tasks {
            tasks.insert(task.id, task);
        }
        Ok(())
    }

    async fn list_tasks(&self, incident_id: Uuid) -> Result<Vec<IncidentTask>, StoreError> {
        let tasks = self.tasks.read().await;
        let mut list: Vec<IncidentTask> = tasks
            .values()
            .filter(|t| t.incident_id == incident_id)
            .cloned()
            .collect();
        list.sort_by_key(|t| t.order);
        Ok(list)
    }

    async fn get_task(&self, task_id: Uuid) -> Result<Option<IncidentTask>, StoreError> {
        Ok(self.tasks.read().await.get(&task_id).cloned())
    }

    async fn update_task(&self, task: &IncidentTask) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("task {}", task.id))),
        }
    }

    async fn append_timeline(&self, entry: TimelineEntry) -> Result<(), StoreError> {
        self.timeline.write().await.push(entry);
        Ok(())
    }

    async fn list_timeline(&self, incident_id: Uuid) -> Result<Vec<TimelineEntry>, StoreError> {
        let timeline = self.timeline.read().await;
        let mut list: Vec<TimelineEntry> = timeline
            .iter()
            .filter(|e| e.incident_id == incident_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.ts.cmp(&b.ts));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndicatorType;
    use chrono::Duration;

    #[tokio::test]
    async fn test_intel_window_filter() {
        let store = MemoryStore::new();
        let mut old = IntelRecord::new("otx", "a", IndicatorType::Ip, None, 3, "old");
        old.observed_at = Utc::now() - Duration::hours(48);
        let fresh = IntelRecord::new("otx", "b", IndicatorType::Ip, None, 3, "fresh");

        store.append(old).await.unwrap();
        store.append(fresh).await.unwrap();

        let since = Utc::now() - Duration::hours(24);
        let listed = store.list_observed_since(since).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].indicator, "b");
    }

    #[tokio::test]
    async fn test_risk_item_upsert_refreshes_instead_of_duplicating() {
        let store = MemoryStore::new();
        let asset_id = Uuid::new_v4();
        let now = Utc::now();
        let fields = RiskItemUpsert {
            asset_id,
            title: "Detection: shodan 203.0.113.7".to_string(),
            score: 12,
            owner: "ops".to_string(),
            due: now + Duration::days(14),
        };

        let risks: &dyn RiskItemStore = &store;
        let (first, created) = risks.upsert(fields.clone(), now).await.unwrap();
        assert!(created);
        assert_eq!(first.hit_count, 1);

        let later = now + Duration::hours(1);
        let (second, created) = risks
            .upsert(
                RiskItemUpsert {
                    score: 20,
                    due: later + Duration::days(14),
                    ..fields
                },
                later,
            )
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.hit_count, 2);
        assert_eq!(second.score, 20);
        assert_eq!(risks.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_open_incident_excludes_closed() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let incidents: &dyn IncidentStore = &store;
        let mut incident = sample_incident(now);
        incident.status = IncidentPhase::Closed;
        let key = incident.dedup_key.clone();
        incidents.insert(incident).await.unwrap();

        let found = incidents
            .find_open_by_dedup_key(
                &key.asset_id,
                &key.indicator,
                &key.source,
                now - Duration::hours(12),
            )
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_unhandled_listing_is_oldest_first_and_limited() {
        let store = MemoryStore::new();
        let detections: &dyn DetectionStore = &store;
        let now = Utc::now();
        for i in 0..3 {
            let mut d = sample_detection();
            d.first_seen = now - Duration::minutes(10 - i);
            detections.insert(d).await.unwrap();
        }
        let listed = store.list_unhandled(2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].first_seen <= listed[1].first_seen);

        store.mark_handled(listed[0].id).await.unwrap();
        let listed = store.list_unhandled(10).await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    fn sample_incident(now: DateTime<Utc>) -> Incident {
        Incident {
            id: Uuid::new_v4(),
            title: "test incident".to_string(),
            severity: crate::models::Priority::P3,
            status: IncidentPhase::Triage,
            opened_at: now,
            updated_at: now,
            closed_at: None,
            owner: None,
            sla_due_at: now + Duration::hours(24),
            sla_status: crate::models::SlaStatus::Ok,
            primary_asset_id: None,
            dedup_key: crate::models::IncidentDedupKey {
                asset_id: String::new(),
                indicator: "203.0.113.7".to_string(),
                source: "shodan".to_string(),
                window_start: now,
            },
            detection_refs: Vec::new(),
            asset_refs: Vec::new(),
            risk_item_refs: Vec::new(),
            summary: String::new(),
            root_cause: String::new(),
            lessons_learned: String::new(),
            tags: Vec::new(),
        }
    }

    fn sample_detection() -> Detection {
        let now = Utc::now();
        Detection {
            id: Uuid::new_v4(),
            asset_id: None,
            source: "otx".to_string(),
            indicator: "203.0.113.7".to_string(),
            severity: 3,
            confidence: 60,
            ttps: Default::default(),
            note: String::new(),
            first_seen: now,
            last_seen: now,
            hit_count: 1,
            source_record_refs: Vec::new(),
            incident_handled: false,
        }
    }
}
