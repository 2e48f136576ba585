//! The pipeline facade: shared dependencies for every stage.

use std::sync::Arc;
use wp_core::{
    AlertSink, AssetStore, DetectionStore, IncidentStore, IntelStore, PipelineConfig,
    RiskItemStore, ScoringConfig, TtpMatcher,
};

/// Holds the stores, sinks, and configuration every pipeline stage needs.
///
/// All stages are synchronous single-pass logic that suspends only at I/O
/// boundaries; one `Pipeline` is safely shared across the scheduler tick
/// and ad-hoc API-triggered runs because every domain mutation is an
/// upsert keyed by a natural dedup key.
pub struct Pipeline {
    pub(crate) config: PipelineConfig,
    pub(crate) scoring: ScoringConfig,
    pub(crate) matcher: TtpMatcher,
    pub(crate) intel: Arc<dyn IntelStore>,
    pub(crate) detections: Arc<dyn DetectionStore>,
    pub(crate) risk_items: Arc<dyn RiskItemStore>,
    pub(crate) assets: Arc<dyn AssetStore>,
    pub(crate) incidents: Arc<dyn IncidentStore>,
    pub(crate) alerts: Arc<dyn AlertSink>,
}

impl Pipeline {
    /// Creates a pipeline with default scoring tables.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineConfig,
        intel: Arc<dyn IntelStore>,
        detections: Arc<dyn DetectionStore>,
        risk_items: Arc<dyn RiskItemStore>,
        assets: Arc<dyn AssetStore>,
        incidents: Arc<dyn IncidentStore>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            scoring: ScoringConfig::default(),
            matcher: TtpMatcher::default(),
            intel,
            detections,
            risk_items,
            assets,
            incidents,
            alerts,
        }
    }

    /// Replaces the scoring configuration.
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// Replaces the TTP keyword matcher.
    pub fn with_matcher(mut self, matcher: TtpMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Returns the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
