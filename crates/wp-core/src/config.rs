//! Pipeline configuration.
//!
//! All tunables live here as plain data with built-in defaults, loadable from
//! a YAML file. Rule tables (TTP keywords, source bias) stay immutable
//! configuration injected into the scorer rather than ambient state.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Scheduler timing and resilience knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between ticks.
    pub interval_secs: u64,
    /// Lease TTL in seconds. Must be strictly less than the interval so a
    /// crashed holder cannot starve ticks longer than one interval.
    pub lock_ttl_secs: u64,
    /// Maximum random delay before each tick attempt, seconds.
    pub jitter_secs: u64,
    /// Hard timeout for one pipeline run, seconds.
    pub run_timeout_secs: u64,
    /// Bounded retry attempts for one pipeline run.
    pub max_retries: u32,
    /// Initial backoff delay between retries, milliseconds.
    pub retry_base_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            lock_ttl_secs: 240,
            jitter_secs: 10,
            run_timeout_secs: 120,
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

/// Configuration for the correlation and incident pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rolling window for merging new evidence into an open detection, hours.
    pub evaluation_window_hours: i64,
    /// Lookback window for attaching detections to an open incident, hours.
    pub incident_window_hours: i64,
    /// Risk item remediation deadline, days from (re-)trigger.
    pub risk_due_days: i64,
    /// Window for the asset rolling risk score, days.
    pub asset_risk_window_days: i64,
    /// Detection severity at or above which the alert sink fires.
    pub alert_severity_threshold: u8,
    /// Fallback owner for risk items when the asset has none.
    pub default_risk_owner: String,
    /// Maximum detections handled per incident-sync pass.
    pub incident_sync_limit: usize,
    /// Scheduler knobs.
    pub scheduler: SchedulerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            evaluation_window_hours: 24,
            incident_window_hours: 12,
            risk_due_days: 14,
            asset_risk_window_days: 7,
            alert_severity_threshold: 4,
            default_risk_owner: "security-team@smb.example".to_string(),
            incident_sync_limit: 50,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a YAML file and validates it.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.lock_ttl_secs >= self.scheduler.interval_secs {
            return Err(ConfigError::InvalidValue(format!(
                "scheduler lock TTL ({}s) must be strictly less than the tick interval ({}s)",
                self.scheduler.lock_ttl_secs, self.scheduler.interval_secs
            )));
        }
        if self.evaluation_window_hours <= 0 || self.incident_window_hours <= 0 {
            return Err(ConfigError::InvalidValue(
                "evaluation and incident windows must be positive".to_string(),
            ));
        }
        if self.scheduler.max_retries == 0 {
            return Err(ConfigError::InvalidValue(
                "scheduler max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
