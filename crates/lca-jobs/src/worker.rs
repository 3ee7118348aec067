//! Worker pool for calculation jobs
//!
//! Bounds how many jobs process at once and keeps outcome statistics:
//! - Slot acquisition (waits while the pool is full)
//! - Outcome accounting per finished job
//! - Closing on shutdown

use crate::error::JobError;
use crate::job::JobStatus;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    /// Jobs accepted by `start_calculation`
    pub total_started: usize,
    pub total_completed: usize,
    pub total_failed: usize,
    pub total_cancelled: usize,
    /// Jobs currently holding a worker slot
    pub active_count: usize,
    /// Configured slot count
    pub max_concurrent: usize,
}

impl PoolStats {
    /// Jobs that reached a terminal state
    #[inline]
    #[must_use]
    pub fn total_finished(&self) -> usize {
        self.total_completed + self.total_failed + self.total_cancelled
    }
}

/// A held worker slot; frees itself on drop
#[derive(Debug)]
pub struct WorkerSlot {
    _permit: OwnedSemaphorePermit,
    stats: Arc<Mutex<PoolStats>>,
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        let mut stats = self.stats.lock();
        stats.active_count = stats.active_count.saturating_sub(1);
    }
}

/// Semaphore-bounded worker pool
#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    stats: Arc<Mutex<PoolStats>>,
}

impl WorkerPool {
    /// Create pool with `max_concurrent` slots
    #[inline]
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            stats: Arc::new(Mutex::new(PoolStats {
                max_concurrent,
                ..PoolStats::default()
            })),
        }
    }

    /// Count a newly accepted job
    pub fn record_started(&self) {
        self.stats.lock().total_started += 1;
    }

    /// Wait for a free slot
    ///
    /// # Errors
    /// - `JobError::ShuttingDown` once the pool is closed
    pub async fn acquire(&self) -> Result<WorkerSlot, JobError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| JobError::ShuttingDown)?;
        self.stats.lock().active_count += 1;
        Ok(WorkerSlot {
            _permit: permit,
            stats: Arc::clone(&self.stats),
        })
    }

    /// Count a job's final status
    pub fn record_outcome(&self, status: JobStatus) {
        let mut stats = self.stats.lock();
        match status {
            JobStatus::Completed => stats.total_completed += 1,
            JobStatus::Failed => stats.total_failed += 1,
            JobStatus::Cancelled => stats.total_cancelled += 1,
            JobStatus::Pending | JobStatus::Processing => {}
        }
    }

    /// Stop handing out slots; waiters get `ShuttingDown`
    pub fn close(&self) {
        self.permits.close();
    }

    /// Check if closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Get pool statistics
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        *self.stats.lock()
    }
}
