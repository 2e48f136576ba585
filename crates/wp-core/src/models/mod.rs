//! Domain data models for Watchpost.
//!
//! The pipeline flows one direction through these types:
//! intelligence records → detections → {risk items, incidents} →
//! incident tasks and timeline entries.

mod asset;
mod detection;
mod incident;
mod intel;
mod risk;

pub use asset::Asset;
pub use detection::{Detection, DetectionKey};
pub use incident::{
    Incident, IncidentDedupKey, IncidentPhase, IncidentTask, Priority, SlaStatus, TaskStatus,
    TimelineEntry, TimelineEventType,
};
pub use intel::{IndicatorType, IntelRecord};
pub use risk::{RiskItem, RiskStatus};
