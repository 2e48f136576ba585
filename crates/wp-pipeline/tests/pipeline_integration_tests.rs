//! End-to-end pipeline tests over the in-memory stores.
//!
//! These cover the behavior that only shows up across stage boundaries:
//! - reprocessing the same intel merges instead of duplicating detections
//! - the incident dedup window attaches inside 12h and opens anew outside
//! - escalation fires on severity alone or on corroborated severity 3
//! - the scheduler lease is mutually exclusive and recovers from a stale
//!   holder after TTL expiry

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use wp_core::models::{
    Detection, DetectionKey, IncidentPhase, IndicatorType, IntelRecord, TaskStatus,
    TimelineEventType,
};
use wp_core::{
    AlertKind, Asset, AssetStore, DetectionStore, IncidentStore, IntelStore, LockStore,
    MemoryAlertSink, MemoryLockStore, MemoryStore, PipelineConfig, RiskItemStore, SchedulerConfig,
    StoreError,
};
use wp_pipeline::{Pipeline, Scheduler, TickOutcome, SCHEDULER_LOCK_NAME};

/// Typed handles onto the shared in-memory backend, mirroring how the
/// pipeline itself holds its stores.
struct Harness {
    store: Arc<MemoryStore>,
    intel: Arc<dyn IntelStore>,
    assets: Arc<dyn AssetStore>,
    risks: Arc<dyn RiskItemStore>,
    incidents: Arc<dyn IncidentStore>,
    alerts: Arc<MemoryAlertSink>,
    pipeline: Pipeline,
}

fn harness(config: PipelineConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let alerts = Arc::new(MemoryAlertSink::new());
    let pipeline = Pipeline::new(
        config,
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        alerts.clone(),
    );
    Harness {
        intel: store.clone(),
        assets: store.clone(),
        risks: store.clone(),
        incidents: store.clone(),
        store,
        alerts,
        pipeline,
    }
}

fn intel_record(
    source: &str,
    indicator: &str,
    asset_id: Option<uuid::Uuid>,
    hint: u8,
    observed_at: DateTime<Utc>,
) -> IntelRecord {
    let mut record = IntelRecord::new(
        source,
        indicator,
        IndicatorType::Ip,
        asset_id,
        hint,
        "beaconing to known C2 infrastructure",
    );
    record.observed_at = observed_at;
    record
}

#[tokio::test]
async fn test_reprocessing_same_intel_merges_not_duplicates() {
    let h = harness(PipelineConfig::default());
    let now = Utc::now();
    let asset = Asset::new("db-server-01", 4);
    let asset_id = asset.id;
    h.assets.upsert(asset).await.unwrap();

    h.intel
        .append(intel_record("shodan", "203.0.113.7", Some(asset_id), 3, now))
        .await
        .unwrap();

    let first = h
        .pipeline
        .run_correlation_at(now, Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(first.new_detections, 1);
    assert_eq!(first.deduped, 0);

    // Same intel seen again on the next tick merges into the open detection.
    let second = h
        .pipeline
        .run_correlation_at(now + Duration::minutes(5), Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(second.new_detections, 0);
    assert_eq!(second.deduped, 1);
    assert_eq!(h.store.detection_count().await, 1);
}

#[tokio::test]
async fn test_incident_window_attaches_inside_and_reopens_outside() {
    // Shrink the detection merge window so repeated sightings become
    // separate detections while the 12h incident window still applies.
    let config = PipelineConfig {
        evaluation_window_hours: 1,
        ..PipelineConfig::default()
    };
    let h = harness(config);
    let t0 = Utc::now() - Duration::hours(30);
    let asset = Asset::new("web-frontend", 3);
    let asset_id = asset.id;
    let asset_key = asset_id.to_string();
    h.assets.upsert(asset).await.unwrap();

    // T: first sighting opens an incident.
    h.intel
        .append(intel_record("censys", "198.51.100.9", Some(asset_id), 4, t0))
        .await
        .unwrap();
    h.pipeline
        .run_correlation_at(t0, Duration::hours(24))
        .await
        .unwrap();
    let sync0 = h.pipeline.run_incident_sync_at(t0, 50).await.unwrap();
    assert_eq!(sync0.incidents_opened, 1);
    assert_eq!(h.store.incident_count().await, 1);

    // T+11h: inside the window, the new detection attaches.
    let t11 = t0 + Duration::hours(11);
    h.intel
        .append(intel_record("censys", "198.51.100.9", Some(asset_id), 4, t11))
        .await
        .unwrap();
    h.pipeline
        .run_correlation_at(t11, Duration::hours(1))
        .await
        .unwrap();
    let sync11 = h.pipeline.run_incident_sync_at(t11, 50).await.unwrap();
    assert_eq!(sync11.incidents_attached, 1);
    assert_eq!(sync11.incidents_opened, 0);
    assert_eq!(h.store.incident_count().await, 1);

    let incident = h
        .incidents
        .find_open_by_dedup_key(&asset_key, "198.51.100.9", "censys", t11 - Duration::hours(12))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(incident.detection_refs.len(), 2);

    // T+13h: the first incident is outside the window; a new one opens.
    let t13 = t0 + Duration::hours(13);
    h.intel
        .append(intel_record("censys", "198.51.100.9", Some(asset_id), 4, t13))
        .await
        .unwrap();
    h.pipeline
        .run_correlation_at(t13, Duration::hours(1))
        .await
        .unwrap();
    let sync13 = h.pipeline.run_incident_sync_at(t13, 50).await.unwrap();
    assert_eq!(sync13.incidents_opened, 1);
    assert_eq!(sync13.incidents_attached, 0);
    assert_eq!(h.store.incident_count().await, 2);
}

#[tokio::test]
async fn test_escalation_threshold_across_pipeline() {
    let h = harness(PipelineConfig::default());
    let now = Utc::now();
    let asset = Asset::new("hr-laptop", 2);
    let asset_id = asset.id;
    h.assets.upsert(asset).await.unwrap();

    // A single severity-3 record has confidence 60, below the
    // corroboration bar, so no risk item opens.
    h.intel
        .append(intel_record("shodan", "192.0.2.10", Some(asset_id), 2, now))
        .await
        .unwrap();
    h.pipeline
        .run_correlation_at(now, Duration::hours(24))
        .await
        .unwrap();
    assert!(h.risks.list().await.unwrap().is_empty());

    // Two records corroborating the same severity-3 indicator push
    // confidence to 80, which crosses the threshold.
    h.intel
        .append(intel_record("shodan", "192.0.2.11", Some(asset_id), 2, now))
        .await
        .unwrap();
    h.intel
        .append(intel_record("shodan", "192.0.2.11", Some(asset_id), 2, now))
        .await
        .unwrap();
    let summary = h
        .pipeline
        .run_correlation_at(now, Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(summary.risk_items_opened, 1);

    let items = h.risks.list().await.unwrap();
    assert_eq!(items.len(), 1);
    // criticality 2 × severity 3
    assert_eq!(items[0].score, 6);

    // Severity 4 escalates even without corroboration.
    h.intel
        .append(intel_record("censys", "192.0.2.12", Some(asset_id), 3, now))
        .await
        .unwrap();
    let summary = h
        .pipeline
        .run_correlation_at(now, Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(summary.risk_items_opened, 1);
    assert_eq!(h.risks.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_new_incident_gets_playbook_timeline_and_alert() {
    let h = harness(PipelineConfig::default());
    let now = Utc::now();
    let asset = Asset::new("payments-api", 5);
    let asset_id = asset.id;
    h.assets.upsert(asset).await.unwrap();

    // hint 4 + shodan bias = severity 5 → P1; the detection alert fires
    // too since 5 clears the severity threshold.
    h.intel
        .append(intel_record("shodan", "203.0.113.50", Some(asset_id), 4, now))
        .await
        .unwrap();
    h.pipeline
        .run_correlation_at(now, Duration::hours(24))
        .await
        .unwrap();
    let summary = h.pipeline.run_incident_sync_at(now, 50).await.unwrap();
    assert_eq!(summary.incidents_opened, 1);
    assert_eq!(summary.alerts_sent, 1);

    let incident = h
        .incidents
        .find_open_by_dedup_key(
            &asset_id.to_string(),
            "203.0.113.50",
            "shodan",
            now - Duration::hours(12),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(incident.status, IncidentPhase::Triage);
    assert_eq!(incident.sla_due_at, now + Duration::hours(4));

    let tasks = h.incidents.list_tasks(incident.id).await.unwrap();
    assert_eq!(tasks.len(), 5);
    assert!(tasks.iter().all(|t| t.due_at == now + Duration::hours(2)));
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Open));

    let timeline = h.incidents.list_timeline(incident.id).await.unwrap();
    let kinds: Vec<_> = timeline.iter().map(|e| e.event_type.clone()).collect();
    assert!(kinds.contains(&TimelineEventType::Opened));
    assert!(kinds.contains(&TimelineEventType::Comms));

    let alerts = h.alerts.sent().await;
    assert!(alerts.iter().any(|a| a.kind == AlertKind::Detection));
    assert!(alerts.iter().any(|a| a.kind == AlertKind::IncidentOpened));
}

#[tokio::test]
async fn test_transition_and_task_toggle_through_pipeline() {
    let h = harness(PipelineConfig::default());
    let now = Utc::now();
    h.intel
        .append(intel_record("censys", "198.51.100.77", None, 4, now))
        .await
        .unwrap();
    h.pipeline
        .run_correlation_at(now, Duration::hours(24))
        .await
        .unwrap();
    h.pipeline.run_incident_sync_at(now, 50).await.unwrap();

    let incident = h
        .incidents
        .find_open_by_dedup_key("", "198.51.100.77", "censys", now - Duration::hours(12))
        .await
        .unwrap()
        .unwrap();

    // Skipping a phase is rejected without mutating the incident.
    let skipped = h
        .pipeline
        .transition_incident(incident.id, IncidentPhase::Recovery, Some("alice"))
        .await
        .unwrap();
    assert!(!skipped.accepted);
    assert_eq!(skipped.incident.status, IncidentPhase::Triage);

    // The single legal successor is accepted and leaves a timeline entry.
    let moved = h
        .pipeline
        .transition_incident(incident.id, IncidentPhase::Containment, Some("alice"))
        .await
        .unwrap();
    assert!(moved.accepted);
    assert_eq!(moved.incident.status, IncidentPhase::Containment);

    let timeline = h.incidents.list_timeline(incident.id).await.unwrap();
    let change = timeline
        .iter()
        .find(|e| e.event_type == TimelineEventType::StatusChange)
        .unwrap();
    assert_eq!(change.actor, "alice");

    let tasks = h.incidents.list_tasks(incident.id).await.unwrap();
    let toggled = h.pipeline.toggle_task(tasks[0].id).await.unwrap();
    assert_eq!(toggled.status, TaskStatus::Done);
    let toggled_back = h.pipeline.toggle_task(tasks[0].id).await.unwrap();
    assert_eq!(toggled_back.status, TaskStatus::Open);
}

/// Delegates to the shared backend but refuses to insert detections for
/// one poisoned indicator, simulating a transient per-group store outage.
struct FailingDetectionStore {
    inner: Arc<MemoryStore>,
    poisoned_indicator: String,
}

#[async_trait]
impl DetectionStore for FailingDetectionStore {
    async fn insert(&self, detection: Detection) -> Result<(), StoreError> {
        if detection.indicator == self.poisoned_indicator {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        DetectionStore::insert(self.inner.as_ref(), detection).await
    }

    async fn update(&self, detection: &Detection) -> Result<(), StoreError> {
        DetectionStore::update(self.inner.as_ref(), detection).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Detection>, StoreError> {
        DetectionStore::get(self.inner.as_ref(), id).await
    }

    async fn find_open_by_key(
        &self,
        key: &DetectionKey,
        last_seen_after: DateTime<Utc>,
    ) -> Result<Option<Detection>, StoreError> {
        self.inner.find_open_by_key(key, last_seen_after).await
    }

    async fn list_unhandled(&self, limit: usize) -> Result<Vec<Detection>, StoreError> {
        self.inner.list_unhandled(limit).await
    }

    async fn mark_handled(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.mark_handled(id).await
    }

    async fn max_severity_for_asset(
        &self,
        asset_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<u8>, StoreError> {
        self.inner.max_severity_for_asset(asset_id, since).await
    }
}

#[tokio::test]
async fn test_alert_failures_never_block_writes() {
    let h = harness(PipelineConfig::default());
    let now = Utc::now();
    h.alerts.fail_deliveries(true).await;

    // hint 4 + censys bias = severity 5, so both alert call sites fire
    // and both fail.
    h.intel
        .append(intel_record("censys", "203.0.113.200", None, 4, now))
        .await
        .unwrap();

    let correlation = h
        .pipeline
        .run_correlation_at(now, Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(correlation.new_detections, 1);
    assert_eq!(correlation.alerts_sent, 0);
    // A dead sink is not a pipeline failure.
    assert_eq!(correlation.failures, 0);

    let sync = h.pipeline.run_incident_sync_at(now, 50).await.unwrap();
    assert_eq!(sync.incidents_opened, 1);
    assert_eq!(sync.alerts_sent, 0);
    assert_eq!(sync.failures, 0);
    assert_eq!(h.store.incident_count().await, 1);

    // The undelivered alert leaves no Comms entry on the timeline.
    let incident = h
        .incidents
        .find_open_by_dedup_key("", "203.0.113.200", "censys", now - Duration::hours(12))
        .await
        .unwrap()
        .unwrap();
    let timeline = h.incidents.list_timeline(incident.id).await.unwrap();
    assert!(timeline
        .iter()
        .any(|e| e.event_type == TimelineEventType::Opened));
    assert!(!timeline
        .iter()
        .any(|e| e.event_type == TimelineEventType::Comms));
}

#[tokio::test]
async fn test_failing_group_is_counted_and_batch_continues() {
    let store = Arc::new(MemoryStore::new());
    let alerts = Arc::new(MemoryAlertSink::new());
    let detections = Arc::new(FailingDetectionStore {
        inner: store.clone(),
        poisoned_indicator: "198.51.100.66".to_string(),
    });
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        store.clone(),
        detections,
        store.clone(),
        store.clone(),
        store.clone(),
        alerts,
    );

    let now = Utc::now();
    let intel: &dyn IntelStore = store.as_ref();
    intel
        .append(intel_record("otx", "198.51.100.66", None, 3, now))
        .await
        .unwrap();
    intel
        .append(intel_record("otx", "198.51.100.99", None, 3, now))
        .await
        .unwrap();

    let summary = pipeline
        .run_correlation_at(now, Duration::hours(24))
        .await
        .unwrap();
    // The poisoned group is counted as a failure; the healthy group still
    // lands.
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.new_detections, 1);
    assert_eq!(store.detection_count().await, 1);
}

#[tokio::test]
async fn test_scheduler_lease_exclusion_and_stale_recovery() {
    let locks = Arc::new(MemoryLockStore::new());
    let h = harness(PipelineConfig::default());
    let config = SchedulerConfig {
        jitter_secs: 0,
        ..SchedulerConfig::default()
    };
    let scheduler = Scheduler::new(Arc::new(h.pipeline), locks.clone(), config);

    let t0 = Utc::now();
    locks.set_time_override(t0).await;

    // A rival replica holds the lease: this tick is skipped, not failed.
    assert!(locks
        .try_acquire(SCHEDULER_LOCK_NAME, StdDuration::from_secs(240))
        .await
        .unwrap());
    assert_eq!(scheduler.tick().await, TickOutcome::Skipped);

    // The rival crashes without releasing. After its TTL passes, the
    // next tick acquires the stale lease and runs.
    locks.advance_time(StdDuration::from_secs(241)).await;
    assert!(matches!(scheduler.tick().await, TickOutcome::Success(_)));
}
