//! Lease-based named locks for single-flight coordination.
//!
//! A lock is one record per name holding an expiry timestamp. Acquisition
//! is an atomic conditional upsert that succeeds only when no lease exists
//! or the existing lease has already expired, so a crashed holder cannot
//! block future acquisitions beyond the TTL. Release sets `expires_at =
//! now` rather than deleting the record, which keeps release idempotent.
//!
//! This is deliberately a single compare-and-swap primitive over storage
//! rather than an external coordination service: portable across backends
//! and dependency-free. Domain data needs no such locks, since every
//! domain mutation is an upsert by natural key; only the scheduler's own
//! single-flight guarantee does.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur acquiring or releasing a lease.
#[derive(Error, Debug)]
pub enum LockError {
    /// The lock backend could not be reached.
    #[error("Lock store unavailable: {0}")]
    Unavailable(String),
    /// Anything else.
    #[error("Internal lock error: {0}")]
    Internal(String),
}

/// A named lease record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    /// Lease name; primary key.
    pub name: String,
    /// When the lease stops excluding other holders.
    pub expires_at: DateTime<Utc>,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

/// Storage-backed named leases.
#[async_trait]
pub trait LockStore: Send + Sync + 'static {
    /// Attempts to acquire the named lease for `ttl`.
    ///
    /// Returns `true` when this caller now holds the lease. `false` means
    /// another holder's lease is still live, which is not an error; the caller
    /// skips its work silently.
    async fn try_acquire(&self, name: &str, ttl: std::time::Duration) -> Result<bool, LockError>;

    /// Releases the named lease by expiring it immediately.
    ///
    /// Safe to call when the lease is not held; release is idempotent.
    async fn release(&self, name: &str) -> Result<(), LockError>;

    /// Returns the current lease record, if any.
    async fn get(&self, name: &str) -> Result<Option<LockRecord>, LockError>;
}

/// In-memory [`LockStore`].
///
/// Supports a test-only time override so lease expiry can be exercised
/// without waiting for wall-clock time to pass.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    locks: Arc<RwLock<HashMap<String, LockRecord>>>,
    time_override: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl MemoryLockStore {
    /// Creates an empty lock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the store's clock to `time` for expiry checks.
    pub async fn set_time_override(&self, time: DateTime<Utc>) {
        *self.time_override.write().await = Some(time);
    }

    /// Advances the (possibly pinned) clock by `duration`.
    pub async fn advance_time(&self, duration: std::time::Duration) {
        let mut pinned = self.time_override.write().await;
        let current = pinned.unwrap_or_else(Utc::now);
        *pinned = Some(
            current + Duration::from_std(duration).unwrap_or_else(|_| Duration::seconds(0)),
        );
    }

    async fn now(&self) -> DateTime<Utc> {
        self.time_override.read().await.unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(&self, name: &str, ttl: std::time::Duration) -> Result<bool, LockError> {
        let now = self.now().await;
        let expires_at =
            now + Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(0));

        let mut locks = self.locks.write().await;
        match locks.get(name) {
            Some(record) if record.expires_at > now => Ok(false),
            _ => {
                locks.insert(
                    name.to_string(),
                    LockRecord {
                        name: name.to_string(),
                        expires_at,
                        updated_at: now,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn release(&self, name: &str) -> Result<(), LockError> {
        let now = self.now().await;
        let mut locks = self.locks.write().await;
        if let Some(record) = locks.get_mut(name) {
            record.expires_at = now;
            record.updated_at = now;
        }
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<LockRecord>, LockError> {
        Ok(self.locks.read().await.get(name).cloned())
    }
}
