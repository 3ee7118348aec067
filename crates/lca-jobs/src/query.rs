//! Read-only polling interface over the job store

use crate::error::JobError;
use crate::job::{CalculationJob, JobStatus};
use crate::store::JobStore;
use lca_model::{JobId, ProductId};
use lca_sync::SyncResult;
use std::sync::Arc;
use std::time::Duration;

/// Read-only view of job history; cheap to clone
#[derive(Debug, Clone)]
pub struct JobQuery {
    store: Arc<JobStore>,
}

impl JobQuery {
    #[must_use]
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    /// Latest snapshot of a job
    ///
    /// # Errors
    /// - `JobError::NotFound` for unknown ids
    pub fn get_job_status(&self, job_id: JobId) -> Result<CalculationJob, JobError> {
        self.store.get(job_id)
    }

    /// All jobs of a product, most recent first
    #[must_use]
    pub fn list_jobs_for_product(&self, product_id: ProductId) -> Vec<CalculationJob> {
        self.store.jobs_for_product(product_id)
    }

    /// Most recent completed job of a product
    #[must_use]
    pub fn get_latest_completed(&self, product_id: ProductId) -> Option<CalculationJob> {
        self.store
            .jobs_for_product(product_id)
            .into_iter()
            .find(|j| j.status == JobStatus::Completed)
    }

    /// Sync outcome of a completed job, once sync has run
    #[must_use]
    pub fn get_sync_result(&self, job_id: JobId) -> Option<SyncResult> {
        self.store.sync_result(job_id)
    }

    /// Poll every `interval` until the job is terminal
    ///
    /// # Errors
    /// - `JobError::NotFound` for unknown ids
    /// - `JobError::Deadline` if still running after `deadline`
    pub async fn wait_for_terminal(
        &self,
        job_id: JobId,
        interval: Duration,
        deadline: Duration,
    ) -> Result<CalculationJob, JobError> {
        let give_up = tokio::time::Instant::now() + deadline;
        loop {
            let job = self.get_job_status(job_id)?;
            if job.is_terminal() {
                return Ok(job);
            }
            if tokio::time::Instant::now() >= give_up {
                return Err(JobError::Deadline {
                    job_id,
                    status: job.status,
                });
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Poll every `interval` until the job's sync outcome is recorded
    ///
    /// Returns `None` if the job ends without completing or nothing is
    /// recorded before `deadline`.
    ///
    /// # Errors
    /// - `JobError::NotFound` for unknown ids
    pub async fn wait_for_sync_result(
        &self,
        job_id: JobId,
        interval: Duration,
        deadline: Duration,
    ) -> Result<Option<SyncResult>, JobError> {
        let give_up = tokio::time::Instant::now() + deadline;
        loop {
            if let Some(result) = self.get_sync_result(job_id) {
                return Ok(Some(result));
            }
            let job = self.get_job_status(job_id)?;
            let never = job.is_terminal() && job.status != JobStatus::Completed;
            if never || tokio::time::Instant::now() >= give_up {
                return Ok(None);
            }
            tokio::time::sleep(interval).await;
        }
    }
}
