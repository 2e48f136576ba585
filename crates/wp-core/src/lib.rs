//! # wp-core
//!
//! Core domain models and pure logic for Watchpost.
//!
//! This crate provides the data model for the detection-correlation and
//! incident-lifecycle pipeline: intelligence records, detections, risk
//! items, incidents with their tasks and timeline, plus the pure functions
//! that operate on them (TTP matching, detection scoring, the incident
//! state machine, SLA derivation, and playbook generation). Storage is
//! abstracted behind async traits with in-memory implementations suitable
//! for tests and single-node deployments.

pub mod config;
pub mod lifecycle;
pub mod lock;
pub mod models;
pub mod notify;
pub mod playbook;
pub mod scoring;
pub mod store;
pub mod ttp;

pub use config::{ConfigError, PipelineConfig, SchedulerConfig};
pub use lifecycle::{compute_sla_status, transition, TransitionOutcome};
pub use lock::{LockError, LockRecord, LockStore, MemoryLockStore};
pub use models::{
    Asset, Detection, DetectionKey, IncidentDedupKey, Incident, IncidentPhase, IncidentTask,
    IndicatorType, IntelRecord, Priority, RiskItem, RiskStatus, SlaStatus, TaskStatus,
    TimelineEntry, TimelineEventType,
};
pub use notify::{Alert, AlertKind, AlertSink, AlertSinkError, LogAlertSink, MemoryAlertSink};
pub use playbook::generate_playbook_tasks;
pub use scoring::{score_group, ScoringConfig};
pub use store::{
    AssetStore, DetectionStore, IncidentStore, IntelStore, MemoryStore, RiskItemStore,
    RiskItemUpsert, StoreError,
};
pub use ttp::TtpMatcher;
