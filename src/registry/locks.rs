//! Worker locks - named concurrency caps shared across builders

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error)]
#[error("worker lock '{0}' is closed")]
pub struct LockClosed(String);

/// A process-wide named token capping how many pipelines holding it may
/// execute at once.
///
/// The lock is advisory: a builder participates only by attaching a
/// [`LockAccess`], and nothing forces every builder on a worker pool to
/// do so.
#[derive(Debug)]
pub struct WorkerLock {
    name: String,
    max_count: usize,
    semaphore: Arc<Semaphore>,
}

impl WorkerLock {
    /// Create a lock allowing `max_count` concurrent holders.
    pub fn new(name: impl Into<String>, max_count: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            max_count,
            semaphore: Arc::new(Semaphore::new(max_count)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Exclusive-access handle for builder registration.
    pub fn access(self: &Arc<Self>) -> LockAccess {
        LockAccess {
            lock: Arc::clone(self),
        }
    }
}

/// A builder's claim on a worker lock, acquired for the duration of a
/// pipeline execution.
#[derive(Debug, Clone)]
pub struct LockAccess {
    lock: Arc<WorkerLock>,
}

impl LockAccess {
    pub fn lock_name(&self) -> &str {
        &self.lock.name
    }

    /// Wait for a slot. The guard releases it on drop.
    pub async fn acquire(&self) -> Result<LockGuard, LockClosed> {
        let permit = self
            .lock
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LockClosed(self.lock.name.clone()))?;
        Ok(LockGuard { _permit: permit })
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<LockGuard> {
        self.lock
            .semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| LockGuard { _permit: permit })
    }
}

/// Held slot on a worker lock
#[derive(Debug)]
pub struct LockGuard {
    _permit: OwnedSemaphorePermit,
}
