//! Lock resources.
//!
//! A lock references a device by ID; it never mutates the device record.
//! Several locks with independent reasons and expiries may target the
//! same device, and the device counts as locked while any of them is in
//! force.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;
use warden_core::{Clock, DeviceId, Error, LockName, Result};
use warden_store::KeyValueStore;

const LOCK_PREFIX: &str = "locks/";
const SCAN_PAGE_SIZE: usize = 512;

/// A lock in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// Lock name, server-generated.
    pub name: LockName,
    /// Device the lock targets.
    pub target: DeviceId,
    /// Operator-supplied reason, shown in denials.
    pub message: String,
    /// Optional expiry; a lock without one holds until deleted.
    pub expires: Option<OffsetDateTime>,
    /// Server-assigned creation time.
    pub created_at: OffsetDateTime,
}

impl Lock {
    /// Whether the lock is in force at `now`.
    pub fn is_in_force(&self, now: OffsetDateTime) -> bool {
        match self.expires {
            Some(expires) => now < expires,
            None => true,
        }
    }
}

/// Parameters for creating a lock.
#[derive(Debug, Clone)]
pub struct CreateLockSpec {
    /// Device the lock targets.
    pub target: DeviceId,
    /// Reason shown in denials; required.
    pub message: String,
    /// Optional expiry.
    pub expires: Option<OffsetDateTime>,
}

/// Registry of lock resources, kept separate from device records.
#[derive(Clone)]
pub struct LockRegistry {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl LockRegistry {
    /// Create a lock registry over the given store.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a lock targeting a device.
    pub async fn create_lock(&self, spec: CreateLockSpec) -> Result<Lock> {
        if spec.message.is_empty() {
            return Err(Error::bad_parameter("lock message required"));
        }
        if let Some(expires) = spec.expires {
            if expires <= self.clock.now() {
                return Err(Error::bad_parameter("lock expiry is in the past"));
            }
        }

        let lock = Lock {
            name: LockName::new(),
            target: spec.target,
            message: spec.message,
            expires: spec.expires,
            created_at: self.clock.now(),
        };
        let value = serde_json::to_vec(&lock)
            .map_err(|e| Error::internal(format!("encode lock: {e}")))?;
        self.store
            .create(&format!("{LOCK_PREFIX}{}", lock.name), value)
            .await?;

        info!(lock = %lock.name, device = %lock.target, "lock created");
        Ok(lock)
    }

    /// Delete a lock by name.
    pub async fn delete_lock(&self, name: LockName) -> Result<()> {
        self.store
            .delete(&format!("{LOCK_PREFIX}{name}"))
            .await
            .map_err(|e| match e {
                Error::NotFound { .. } => Error::not_found(format!("lock {name} not found")),
                other => other,
            })
    }

    /// All locks currently in force against a device.
    pub async fn locks_in_force(&self, target: DeviceId) -> Result<Vec<Lock>> {
        let now = self.clock.now();
        Ok(self
            .scan_locks()
            .await?
            .into_iter()
            .filter(|l| l.target == target && l.is_in_force(now))
            .collect())
    }

    async fn scan_locks(&self) -> Result<Vec<Lock>> {
        let mut locks = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .store
                .list(LOCK_PREFIX, SCAN_PAGE_SIZE, token.as_deref())
                .await?;
            for item in page.items {
                let lock: Lock = serde_json::from_slice(&item.value)
                    .map_err(|e| Error::internal(format!("decode lock: {e}")))?;
                locks.push(lock);
            }
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => return Ok(locks),
            }
        }
    }
}
