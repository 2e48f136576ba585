//! Storage traits for the pipeline's persisted collections.
//!
//! The logical shape is store-agnostic: append-only `intel_records` and
//! `incident_timeline`, upsert-by-natural-key `detections` and
//! `risk_items`, create-or-attach `incidents`, and per-incident tasks. Any
//! backend with atomic upsert-by-key and conditional updates fits; the
//! bundled [`MemoryStore`] backs tests and single-node deployments.
//!
//! Because every mutation is an upsert keyed by a natural business key,
//! concurrent pipeline runs are idempotent without locking domain data;
//! only the scheduler's own single-flight lease needs coordination.

mod memory;

pub use memory::MemoryStore;

use crate::models::{
    Asset, Detection, DetectionKey, Incident, IncidentTask, IntelRecord, RiskItem, TimelineEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in a store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// A uniqueness or upsert-key constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Transient I/O failure; retried by the scheduler's backoff policy.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// Anything else.
    #[error("Internal store error: {0}")]
    Internal(String),
}

/// Append-only store of intelligence records.
#[async_trait]
pub trait IntelStore: Send + Sync + 'static {
    /// Appends one record.
    async fn append(&self, record: IntelRecord) -> Result<(), StoreError>;

    /// Lists records with `observed_at >= since`.
    async fn list_observed_since(&self, since: DateTime<Utc>)
        -> Result<Vec<IntelRecord>, StoreError>;
}

/// Store of correlated detections.
#[async_trait]
pub trait DetectionStore: Send + Sync + 'static {
    /// Inserts a new detection.
    async fn insert(&self, detection: Detection) -> Result<(), StoreError>;

    /// Replaces an existing detection by id.
    async fn update(&self, detection: &Detection) -> Result<(), StoreError>;

    /// Fetches a detection by id.
    async fn get(&self, id: Uuid) -> Result<Option<Detection>, StoreError>;

    /// Finds the open detection for a dedup key, i.e. one whose
    /// `last_seen` falls at or after `last_seen_after`.
    async fn find_open_by_key(
        &self,
        key: &DetectionKey,
        last_seen_after: DateTime<Utc>,
    ) -> Result<Option<Detection>, StoreError>;

    /// Lists up to `limit` detections not yet handled by the incident
    /// correlator, oldest first.
    async fn list_unhandled(&self, limit: usize) -> Result<Vec<Detection>, StoreError>;

    /// Marks a detection as handled by the incident correlator.
    async fn mark_handled(&self, id: Uuid) -> Result<(), StoreError>;

    /// Maximum severity among an asset's detections with
    /// `last_seen >= since`, if any.
    async fn max_severity_for_asset(
        &self,
        asset_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<u8>, StoreError>;
}

/// Fields refreshed by a risk item upsert.
#[derive(Debug, Clone)]
pub struct RiskItemUpsert {
    /// Asset half of the upsert key.
    pub asset_id: Uuid,
    /// Title half of the upsert key.
    pub title: String,
    /// Criticality × severity.
    pub score: u32,
    /// Responsible owner.
    pub owner: String,
    /// Refreshed remediation deadline.
    pub due: DateTime<Utc>,
}

/// Store of risk items, upserted by `(asset_id, title)`.
#[async_trait]
pub trait RiskItemStore: Send + Sync + 'static {
    /// Atomically creates or refreshes the item for the upsert key.
    ///
    /// A refresh bumps `hit_count`, resets `status` to Open, and rewrites
    /// score, owner, and due. Returns the item and whether it was created.
    async fn upsert(
        &self,
        fields: RiskItemUpsert,
        now: DateTime<Utc>,
    ) -> Result<(RiskItem, bool), StoreError>;

    /// Fetches an item by its upsert key.
    async fn get_by_key(&self, asset_id: Uuid, title: &str)
        -> Result<Option<RiskItem>, StoreError>;

    /// Lists all items.
    async fn list(&self) -> Result<Vec<RiskItem>, StoreError>;
}

/// Store of assets, read by the escalator and written back with the
/// rolling risk score.
#[async_trait]
pub trait AssetStore: Send + Sync + 'static {
    /// Fetches an asset by id.
    async fn get(&self, id: Uuid) -> Result<Option<Asset>, StoreError>;

    /// Creates or replaces an asset.
    async fn upsert(&self, asset: Asset) -> Result<(), StoreError>;

    /// Sets an asset's rolling risk score.
    async fn set_risk_score(&self, id: Uuid, risk_score: u32) -> Result<(), StoreError>;
}

/// Store of incidents, their tasks, and their append-only timeline.
#[async_trait]
pub trait IncidentStore: Send + Sync + 'static {
    /// Inserts a new incident.
    async fn insert(&self, incident: Incident) -> Result<(), StoreError>;

    /// Fetches an incident by id.
    async fn get(&self, id: Uuid) -> Result<Option<Incident>, StoreError>;

    /// Replaces an existing incident by id.
    async fn update(&self, incident: &Incident) -> Result<(), StoreError>;

    /// Finds a non-Closed incident matching the dedup key components with
    /// `opened_at >= opened_after`.
    async fn find_open_by_dedup_key(
        &self,
        asset_id: &str,
        indicator: &str,
        source: &str,
        opened_after: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError>;

    /// Inserts playbook tasks in bulk.
    async fn insert_tasks(&self, tasks: Vec<IncidentTask>) -> Result<(), StoreError>;

    /// Lists an incident's tasks ordered by `order`.
    async fn list_tasks(&self, incident_id: Uuid) -> Result<Vec<IncidentTask>, StoreError>;

    /// Fetches a task by id.
    async fn get_task(&self, task_id: Uuid) -> Result<Option<IncidentTask>, StoreError>;

    /// Replaces an existing task by id.
    async fn update_task(&self, task: &IncidentTask) -> Result<(), StoreError>;

    /// Appends a timeline entry.
    async fn append_timeline(&self, entry: TimelineEntry) -> Result<(), StoreError>;

    /// Lists an incident's timeline ordered by `ts`.
    async fn list_timeline(&self, incident_id: Uuid) -> Result<Vec<TimelineEntry>, StoreError>;
}
