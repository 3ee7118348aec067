//! In-memory job store
//!
//! - Job records: `DashMap<JobId, Arc<JobEntry>>`, each record behind its own
//!   `RwLock` so a transition and everything it attaches land together
//! - Active index: `DashMap<ProductId, JobId>`; an entry exists while the
//!   product has a non-terminal job and is claimed with `entry()`
//! - Per-product history in creation order
//! - Sync outcomes of completed jobs
//!
//! Lock order: an active-index guard may be held while taking a record lock,
//! never the reverse.

use crate::config::ConflictPolicy;
use crate::error::JobError;
use crate::job::{CalculationJob, JobStatus};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lca_model::{CalculationOptions, JobId, LcaResults, ProductId};
use lca_sync::SyncResult;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Acknowledgement of a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAck {
    pub job_id: JobId,
    /// Status after the request
    pub status: JobStatus,
    /// Job had already finished; nothing changed
    pub already_terminal: bool,
}

/// A job record plus its cooperative stop flag
#[derive(Debug)]
pub struct JobEntry {
    job: RwLock<CalculationJob>,
    stop: AtomicBool,
}

impl JobEntry {
    fn new(job: CalculationJob) -> Self {
        Self {
            job: RwLock::new(job),
            stop: AtomicBool::new(false),
        }
    }

    /// Snapshot of the record
    #[must_use]
    pub fn snapshot(&self) -> CalculationJob {
        self.job.read().clone()
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.job.read().status
    }

    /// Ask the running calculation to stop at its next checkpoint
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Check if a stop was requested
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Record progress; see [`CalculationJob::advance`]
    pub fn advance(&self, progress: u8) -> bool {
        self.job.write().advance(progress)
    }

    /// Cancel unless terminal. Caller releases the active index.
    fn cancel(&self) -> CancelAck {
        let mut job = self.job.write();
        let already_terminal = job.is_terminal();
        if !already_terminal {
            let cancelled = job.transition(JobStatus::Cancelled);
            debug_assert!(cancelled.is_ok(), "non-terminal job refused cancellation");
            if let Err(e) = cancelled {
                tracing::error!(job_id = %job.id, "Cancellation refused: {e}");
            }
            self.request_stop();
        }
        CancelAck {
            job_id: job.id,
            status: job.status,
            already_terminal,
        }
    }
}

/// Shared job state
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: DashMap<JobId, Arc<JobEntry>>,
    active: DashMap<ProductId, JobId>,
    history: DashMap<ProductId, Vec<JobId>>,
    sync_results: DashMap<JobId, SyncResult>,
}

impl JobStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending job unless the product already has an active one
    ///
    /// With `ConflictPolicy::CancelAndReplace` the active job is cancelled
    /// and its id returned alongside the new job. Claiming the active slot,
    /// cancelling the old job and registering the new one all happen under
    /// the same index entry.
    ///
    /// # Errors
    /// - `JobError::Conflict` if the product has an active job and the
    ///   policy is `Reject`
    pub fn create(
        &self,
        product_id: ProductId,
        options: CalculationOptions,
        initial_estimate_secs: u64,
        policy: ConflictPolicy,
    ) -> Result<(Arc<JobEntry>, Option<JobId>), JobError> {
        let job = CalculationJob::new(product_id, options, initial_estimate_secs);
        let job_id = job.id;

        // The slot guard is held until the record and its history line are in
        let mut slot = match self.active.entry(product_id) {
            Entry::Occupied(slot) => slot,
            Entry::Vacant(slot) => {
                let entry = self.register(product_id, job);
                slot.insert(job_id);
                return Ok((entry, None));
            }
        };

        let active_id = *slot.get();
        let mut replaced = None;
        match self.entry(active_id) {
            Some(active) if active.status().is_terminal() => {}
            Some(active) => {
                if policy == ConflictPolicy::Reject {
                    return Err(JobError::Conflict {
                        product_id,
                        active_job: active_id,
                    });
                }
                if !active.cancel().already_terminal {
                    replaced = Some(active_id);
                }
            }
            // Unresolved ids count as live
            None if policy == ConflictPolicy::Reject => {
                return Err(JobError::Conflict {
                    product_id,
                    active_job: active_id,
                });
            }
            None => {}
        }

        let entry = self.register(product_id, job);
        slot.insert(job_id);
        Ok((entry, replaced))
    }

    fn register(&self, product_id: ProductId, job: CalculationJob) -> Arc<JobEntry> {
        let job_id = job.id;
        let entry = Arc::new(JobEntry::new(job));
        self.jobs.insert(job_id, Arc::clone(&entry));
        self.history.entry(product_id).or_default().push(job_id);
        entry
    }

    /// Record handle
    #[must_use]
    pub fn entry(&self, job_id: JobId) -> Option<Arc<JobEntry>> {
        self.jobs.get(&job_id).map(|e| Arc::clone(e.value()))
    }

    /// Snapshot of a job
    ///
    /// # Errors
    /// - `JobError::NotFound` for unknown ids
    pub fn get(&self, job_id: JobId) -> Result<CalculationJob, JobError> {
        self.entry(job_id)
            .map(|e| e.snapshot())
            .ok_or(JobError::NotFound(job_id))
    }

    /// Move `pending -> processing`
    ///
    /// # Errors
    /// - `JobError::NotFound`, `JobError::IllegalTransition`
    pub fn start_processing(&self, job_id: JobId) -> Result<(), JobError> {
        let entry = self.entry(job_id).ok_or(JobError::NotFound(job_id))?;
        let mut job = entry.job.write();
        job.transition(JobStatus::Processing)
    }

    /// Attach results and complete atomically
    ///
    /// # Errors
    /// - `JobError::NotFound`, `JobError::IllegalTransition` (job was
    ///   cancelled meanwhile)
    pub fn complete(
        &self,
        job_id: JobId,
        results: Arc<LcaResults>,
    ) -> Result<CalculationJob, JobError> {
        let entry = self.entry(job_id).ok_or(JobError::NotFound(job_id))?;
        let snapshot = {
            let mut job = entry.job.write();
            job.complete(results)?;
            job.clone()
        };
        self.release(snapshot.product_id, job_id);
        Ok(snapshot)
    }

    /// Fail with a message
    ///
    /// # Errors
    /// - `JobError::NotFound`, `JobError::IllegalTransition`
    pub fn fail(&self, job_id: JobId, message: impl Into<String>) -> Result<CalculationJob, JobError> {
        let entry = self.entry(job_id).ok_or(JobError::NotFound(job_id))?;
        let snapshot = {
            let mut job = entry.job.write();
            job.fail(message)?;
            job.clone()
        };
        self.release(snapshot.product_id, job_id);
        Ok(snapshot)
    }

    /// Cancel a job; no-op when terminal
    ///
    /// # Errors
    /// - `JobError::NotFound` for unknown ids
    pub fn cancel(&self, job_id: JobId) -> Result<CancelAck, JobError> {
        let entry = self.entry(job_id).ok_or(JobError::NotFound(job_id))?;
        let ack = entry.cancel();
        if !ack.already_terminal {
            let product_id = entry.job.read().product_id;
            self.release(product_id, job_id);
        }
        Ok(ack)
    }

    /// Ids of all non-terminal jobs
    #[must_use]
    pub fn active_jobs(&self) -> Vec<JobId> {
        self.active.iter().map(|e| *e.value()).collect()
    }

    /// Active job of a product
    #[must_use]
    pub fn active_job(&self, product_id: ProductId) -> Option<JobId> {
        self.active.get(&product_id).map(|e| *e.value())
    }

    /// Snapshots of a product's jobs, most recent first
    #[must_use]
    pub fn jobs_for_product(&self, product_id: ProductId) -> Vec<CalculationJob> {
        let ids = self
            .history
            .get(&product_id)
            .map(|h| h.value().clone())
            .unwrap_or_default();
        ids.iter()
            .rev()
            .filter_map(|id| self.entry(*id))
            .map(|e| e.snapshot())
            .collect()
    }

    /// Store the sync outcome of a completed job
    pub fn record_sync(&self, job_id: JobId, result: SyncResult) {
        self.sync_results.insert(job_id, result);
    }

    /// Sync outcome of a completed job
    #[must_use]
    pub fn sync_result(&self, job_id: JobId) -> Option<SyncResult> {
        self.sync_results.get(&job_id).map(|r| r.value().clone())
    }

    /// Number of jobs ever created
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Check if no job was ever created
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop the product's active slot if it still points at `job_id`
    fn release(&self, product_id: ProductId, job_id: JobId) {
        self.active.remove_if(&product_id, |_, active| *active == job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lca_test_utils::results_with;

    const PRODUCT: ProductId = ProductId(12);

    fn create(store: &JobStore, policy: ConflictPolicy) -> Result<JobId, JobError> {
        store
            .create(PRODUCT, CalculationOptions::default(), 30, policy)
            .map(|(entry, _)| entry.snapshot().id)
    }

    #[test]
    fn second_active_job_conflicts() {
        let store = JobStore::new();
        let first = create(&store, ConflictPolicy::Reject).unwrap();
        store.start_processing(first).unwrap();

        let err = create(&store, ConflictPolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            JobError::Conflict {
                product_id: PRODUCT,
                active_job: first
            }
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.jobs_for_product(PRODUCT).len(), 1);
    }

    #[test]
    fn finished_job_frees_the_product() {
        let store = JobStore::new();
        let first = create(&store, ConflictPolicy::Reject).unwrap();
        store.start_processing(first).unwrap();
        store
            .complete(first, Arc::new(results_with(1.0, 1.0, 1.0)))
            .unwrap();
        assert_eq!(store.active_job(PRODUCT), None);

        let second = create(&store, ConflictPolicy::Reject).unwrap();
        let history: Vec<_> = store.jobs_for_product(PRODUCT).iter().map(|j| j.id).collect();
        assert_eq!(history, vec![second, first]);
    }

    #[test]
    fn cancel_and_replace_cancels_the_active_job() {
        let store = JobStore::new();
        let first = create(&store, ConflictPolicy::Reject).unwrap();

        let (entry, replaced) = store
            .create(PRODUCT, CalculationOptions::default(), 30, ConflictPolicy::CancelAndReplace)
            .unwrap();
        let second = entry.snapshot().id;

        assert_eq!(replaced, Some(first));
        assert_eq!(store.get(first).unwrap().status, JobStatus::Cancelled);
        assert!(store.entry(first).unwrap().stop_requested());
        assert_eq!(store.active_job(PRODUCT), Some(second));
    }

    #[test]
    fn cancel_is_idempotent() {
        let store = JobStore::new();
        let id = create(&store, ConflictPolicy::Reject).unwrap();

        let first = store.cancel(id).unwrap();
        assert_eq!(first.status, JobStatus::Cancelled);
        assert!(!first.already_terminal);

        let second = store.cancel(id).unwrap();
        assert_eq!(second.status, JobStatus::Cancelled);
        assert!(second.already_terminal);
        assert_eq!(store.active_job(PRODUCT), None);
    }

    #[test]
    fn completing_a_cancelled_job_is_rejected() {
        let store = JobStore::new();
        let id = create(&store, ConflictPolicy::Reject).unwrap();
        store.start_processing(id).unwrap();
        store.cancel(id).unwrap();

        let err = store
            .complete(id, Arc::new(results_with(1.0, 1.0, 1.0)))
            .unwrap_err();
        assert!(matches!(err, JobError::IllegalTransition { .. }));
        assert!(store.get(id).unwrap().results.is_none());
    }

    #[test]
    fn late_release_keeps_replacement_active() {
        let store = JobStore::new();
        let first = create(&store, ConflictPolicy::Reject).unwrap();
        let (entry, _) = store
            .create(PRODUCT, CalculationOptions::default(), 30, ConflictPolicy::CancelAndReplace)
            .unwrap();

        // Old job's release must not free the replacement's slot
        store.release(PRODUCT, first);
        assert_eq!(store.active_job(PRODUCT), Some(entry.snapshot().id));
    }

    #[test]
    fn unknown_job() {
        let store = JobStore::new();
        let id = JobId::new();
        assert_eq!(store.get(id), Err(JobError::NotFound(id)));
        assert_eq!(store.cancel(id), Err(JobError::NotFound(id)));
    }
}
