//! Alert sink abstraction.
//!
//! Notification delivery transport (Teams/Slack webhooks, email) lives
//! outside the pipeline. The pipeline treats it as a fire-and-forget
//! external sink: failures are logged and counted by callers, and never
//! block store writes that already succeeded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors from an alert sink.
#[derive(Error, Debug)]
pub enum AlertSinkError {
    /// Delivery failed; best-effort callers log and move on.
    #[error("Alert delivery failed: {0}")]
    Delivery(String),
}

/// What an alert is about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A new high-severity detection.
    Detection,
    /// A newly opened incident.
    IncidentOpened,
}

/// An outbound alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// What triggered the alert.
    pub kind: AlertKind,
    /// Subject entity (detection or incident id).
    pub subject_id: Uuid,
    /// Severity rendered for humans ("4/5", "P1").
    pub severity: String,
    /// One-line message.
    pub message: String,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
}

/// Fire-and-forget notification sink.
#[async_trait]
pub trait AlertSink: Send + Sync + 'static {
    /// Delivers one alert.
    async fn notify(&self, alert: Alert) -> Result<(), AlertSinkError>;
}

/// [`AlertSink`] that emits alerts as structured log events.
///
/// The delivery transport (mail, chat, pager) is deployment-specific;
/// this sink is the built-in default so alerts always land somewhere.
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl LogAlertSink {
    /// Creates the sink.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, alert: Alert) -> Result<(), AlertSinkError> {
        tracing::warn!(
            kind = ?alert.kind,
            subject_id = %alert.subject_id,
            severity = %alert.severity,
            message = %alert.message,
            "alert"
        );
        Ok(())
    }
}

/// In-memory sink recording alerts for assertions.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    sent: Arc<RwLock<Vec<Alert>>>,
    fail: Arc<RwLock<bool>>,
}

impl MemoryAlertSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts delivered so far.
    pub async fn sent(&self) -> Vec<Alert> {
        self.sent.read().await.clone()
    }

    /// Makes every subsequent delivery fail, for best-effort tests.
    pub async fn fail_deliveries(&self, fail: bool) {
        *self.fail.write().await = fail;
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn notify(&self, alert: Alert) -> Result<(), AlertSinkError> {
        if *self.fail.read().await {
            return Err(AlertSinkError::Delivery("sink configured to fail".into()));
        }
        self.sent.write().await.push(alert);
        Ok(())
    }
}
