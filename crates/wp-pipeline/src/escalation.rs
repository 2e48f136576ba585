//! Risk escalation.
//!
//! Threshold policy over (severity, confidence) that opens or refreshes a
//! risk item and recomputes the affected asset's rolling risk score.
//! Unlike the detection reconciler's cheap merge, the escalator recomputes
//! score and due date on every trigger, so recurrence re-alerts.

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use wp_core::models::{Detection, RiskItem};
use wp_core::RiskItemUpsert;

/// Whether a detection qualifies for escalation.
fn meets_threshold(severity: u8, confidence: u8) -> bool {
    severity >= 4 || (severity >= 3 && confidence >= 70)
}

impl Pipeline {
    /// Escalates a detection into a risk item when it meets the threshold.
    ///
    /// Below-threshold detections, detections without a resolved asset,
    /// and detections referencing an unknown asset are all no-ops
    /// returning `Ok(None)`: policy outcomes, not errors.
    pub(crate) async fn escalate_detection(
        &self,
        detection: &Detection,
        now: DateTime<Utc>,
    ) -> Result<Option<RiskItem>, PipelineError> {
        if !meets_threshold(detection.severity, detection.confidence) {
            debug!(
                detection_id = %detection.id,
                severity = detection.severity,
                confidence = detection.confidence,
                "below escalation threshold"
            );
            return Ok(None);
        }

        let Some(asset_id) = detection.asset_id else {
            warn!(detection_id = %detection.id, "qualifying detection has no resolved asset");
            return Ok(None);
        };
        let Some(asset) = self.assets.get(asset_id).await? else {
            warn!(detection_id = %detection.id, %asset_id, "asset not found, skipping escalation");
            return Ok(None);
        };

        let title = format!("Detection: {} {}", detection.source, detection.indicator);
        let score = u32::from(asset.criticality) * u32::from(detection.severity);
        let owner = asset
            .owner
            .clone()
            .unwrap_or_else(|| self.config.default_risk_owner.clone());

        let (item, created) = self
            .risk_items
            .upsert(
                RiskItemUpsert {
                    asset_id,
                    title,
                    score,
                    owner,
                    due: now + Duration::days(self.config.risk_due_days),
                },
                now,
            )
            .await?;
        info!(
            risk_item_id = %item.id,
            %asset_id,
            score,
            created,
            "risk item escalated"
        );

        self.recompute_asset_risk(asset_id, asset.criticality, now)
            .await?;

        Ok(Some(item))
    }

    /// Recomputes the asset's rolling risk score:
    /// criticality × max severity of its detections seen in the window.
    async fn recompute_asset_risk(
        &self,
        asset_id: uuid::Uuid,
        criticality: u8,
        now: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        let since = now - Duration::days(self.config.asset_risk_window_days);
        if let Some(max_severity) = self
            .detections
            .max_severity_for_asset(asset_id, since)
            .await?
        {
            let risk_score = u32::from(criticality) * u32::from(max_severity);
            self.assets.set_risk_score(asset_id, risk_score).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries() {
        // severity 3 needs confidence 70.
        assert!(!meets_threshold(3, 69));
        assert!(meets_threshold(3, 70));
        // severity 4 qualifies regardless of confidence.
        assert!(meets_threshold(4, 0));
        assert!(meets_threshold(5, 0));
        // severity 2 never qualifies.
        assert!(!meets_threshold(2, 100));
    }
}
