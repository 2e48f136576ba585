//! Pipeline error taxonomy.
//!
//! Policy no-ops (an unmet escalation threshold, an illegal phase
//! transition) are values, not errors: they never appear here and are
//! never logged as failures.

use thiserror::Error;
use wp_core::{LockError, StoreError};

/// Errors surfaced by pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed input to an API-facing operation; rejected before any
    /// mutation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist. Surfaced to the caller, never
    /// retried.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store failure. Transient variants ride the scheduler's retry
    /// policy.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Lease lock failure.
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether retrying could help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::Store(StoreError::Unavailable(_))
                | PipelineError::Lock(LockError::Unavailable(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PipelineError::Store(StoreError::Unavailable("io".into())).is_transient());
        assert!(!PipelineError::Store(StoreError::NotFound("x".into())).is_transient());
        assert!(!PipelineError::Validation("bad".into()).is_transient());
        assert!(!PipelineError::NotFound("gone".into()).is_transient());
    }
}
