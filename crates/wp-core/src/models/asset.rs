//! Asset model.
//!
//! Inventory management itself lives outside the pipeline; the escalator
//! only reads criticality and owner here and writes back the rolling risk
//! score.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An IT asset referenced by detections and incidents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Unique identifier.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Business criticality, 1-5.
    pub criticality: u8,
    /// Responsible owner.
    pub owner: Option<String>,
    /// Rolling risk score: criticality × max recent detection severity.
    pub risk_score: u32,
}

impl Asset {
    /// Creates an asset with no accumulated risk.
    pub fn new(name: impl Into<String>, criticality: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            criticality,
            owner: None,
            risk_score: 0,
        }
    }

    /// Sets the owner.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}
