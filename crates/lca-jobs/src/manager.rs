//! Calculation service
//!
//! Owns the job lifecycle end to end:
//! - `start_calculation` registers a pending job and spawns its worker
//! - the worker loads the BOM, runs the calculator on a blocking thread under
//!   the processing time limit, and publishes results atomically
//! - a completed job is synced to the product store exactly once
//! - `cancel_calculation` and `shutdown` stop work cooperatively

use crate::config::{JobConfig, LcaConfig};
use crate::error::{ConfigError, JobError};
use crate::job::{CalculationJob, MAX_RUNNING_PROGRESS};
use crate::query::JobQuery;
use crate::store::{CancelAck, JobEntry, JobStore};
use crate::worker::{PoolStats, WorkerPool};
use dashmap::DashMap;
use futures::future::join_all;
use lca_engine::{percent, CalculationEngine, CalculationError, Calculator, Checkpoint};
use lca_model::{
    CalculationOptions, JobId, LcaResults, ProductId, ProductRepository, ReferenceTables,
};
use lca_sync::{SyncResult, SyncService};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Progress sink handed to the calculator for one job
struct JobCheckpoint {
    entry: Arc<JobEntry>,
}

impl Checkpoint for JobCheckpoint {
    fn reached(&self, completed: usize, total: usize) -> Result<(), CalculationError> {
        if self.entry.stop_requested() {
            return Err(CalculationError::Cancelled);
        }
        if self.entry.advance(percent(completed, total, MAX_RUNNING_PROGRESS)) {
            tracing::debug!(completed, total, "Calculation progress");
        }
        Ok(())
    }
}

struct ServiceInner {
    config: JobConfig,
    store: Arc<JobStore>,
    pool: WorkerPool,
    repository: Arc<dyn ProductRepository>,
    calculator: Arc<dyn Calculator>,
    sync: SyncService,
    workers: DashMap<JobId, JoinHandle<()>>,
}

/// LCA calculation job service
///
/// Cheap to clone; clones share the same jobs. Must be used from within a
/// tokio runtime.
#[derive(Clone)]
pub struct CalculationService {
    inner: Arc<ServiceInner>,
}

impl std::fmt::Debug for CalculationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculationService")
            .field("config", &self.inner.config)
            .field("jobs", &self.inner.store.len())
            .field("pool", &self.inner.pool.stats())
            .finish_non_exhaustive()
    }
}

impl CalculationService {
    /// Create service backed by the calculation engine
    ///
    /// # Errors
    /// - `ConfigError::Invalid` if the configuration is out of range
    pub fn new(
        repository: Arc<dyn ProductRepository>,
        tables: Arc<ReferenceTables>,
        config: LcaConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_calculator(repository, Arc::new(CalculationEngine::new(tables)), config)
    }

    /// Create service with a custom calculator
    ///
    /// # Errors
    /// - `ConfigError::Invalid` if the configuration is out of range
    pub fn with_calculator(
        repository: Arc<dyn ProductRepository>,
        calculator: Arc<dyn Calculator>,
        config: LcaConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let sync = SyncService::new(Arc::clone(&repository), config.sync);
        Ok(Self {
            inner: Arc::new(ServiceInner {
                config: config.jobs,
                store: Arc::new(JobStore::new()),
                pool: WorkerPool::new(config.jobs.max_concurrent_jobs),
                repository,
                calculator,
                sync,
                workers: DashMap::new(),
            }),
        })
    }

    /// Start a calculation for a product; returns without waiting for it
    ///
    /// # Errors
    /// - `JobError::Conflict` if the product already has an active job
    ///   (with the default conflict policy)
    /// - `JobError::ShuttingDown` after `shutdown`
    pub fn start_calculation(
        &self,
        product_id: ProductId,
        options: CalculationOptions,
    ) -> Result<JobId, JobError> {
        if self.inner.pool.is_closed() {
            return Err(JobError::ShuttingDown);
        }

        let (entry, replaced) = self.inner.store.create(
            product_id,
            options,
            self.inner.config.initial_estimate_secs,
            self.inner.config.conflict_policy,
        )?;
        let job_id = entry.snapshot().id;

        if let Some(old) = replaced {
            tracing::warn!(job_id = %old, product_id = %product_id, replaced_by = %job_id, "Active job cancelled and replaced");
        }
        tracing::info!(job_id = %job_id, product_id = %product_id, iso = options.iso_compliant, "Calculation job created");

        self.inner.pool.record_started();
        let handle = tokio::spawn(Arc::clone(&self.inner).run(entry));
        self.inner.workers.retain(|_, h| !h.is_finished());
        self.inner.workers.insert(job_id, handle);
        Ok(job_id)
    }

    /// Latest snapshot of a job; never blocks on the calculation
    ///
    /// # Errors
    /// - `JobError::NotFound` for unknown ids
    pub fn get_job_status(&self, job_id: JobId) -> Result<CalculationJob, JobError> {
        self.inner.store.get(job_id)
    }

    /// Cancel a job; a no-op on terminal jobs
    ///
    /// # Errors
    /// - `JobError::NotFound` for unknown ids
    pub fn cancel_calculation(&self, job_id: JobId) -> Result<CancelAck, JobError> {
        let ack = self.inner.store.cancel(job_id)?;
        if ack.already_terminal {
            tracing::debug!(job_id = %job_id, status = %ack.status, "Cancel ignored, job already finished");
        } else {
            tracing::warn!(job_id = %job_id, "Calculation cancelled");
        }
        Ok(ack)
    }

    /// Read-only query interface over this service's jobs
    #[must_use]
    pub fn query(&self) -> JobQuery {
        JobQuery::new(Arc::clone(&self.inner.store))
    }

    /// Get pool statistics
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.inner.pool.stats()
    }

    /// Get job configuration
    #[must_use]
    pub fn config(&self) -> &JobConfig {
        &self.inner.config
    }

    /// Cancel every non-terminal job, refuse new ones and wait for workers
    pub async fn shutdown(&self) {
        self.inner.pool.close();
        let active = self.inner.store.active_jobs();
        tracing::info!(active = active.len(), "Shutting down calculation service");
        for job_id in active {
            if let Err(e) = self.cancel_calculation(job_id) {
                tracing::debug!(job_id = %job_id, "Cancel during shutdown failed: {e}");
            }
        }

        let ids: Vec<JobId> = self.inner.workers.iter().map(|w| *w.key()).collect();
        let handles: Vec<_> = ids
            .into_iter()
            .filter_map(|id| self.inner.workers.remove(&id).map(|(_, h)| h))
            .collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::error!("Calculation worker ended abnormally: {e}");
            }
        }
    }
}

impl ServiceInner {
    /// Worker task for one job
    async fn run(self: Arc<Self>, entry: Arc<JobEntry>) {
        let job = entry.snapshot();
        let (job_id, product_id) = (job.id, job.product_id);

        match self.pool.acquire().await {
            Ok(_slot) => {
                if !entry.status().is_terminal() {
                    self.process(&entry, job_id, product_id, job.options).await;
                }
            }
            Err(e) => {
                // Pool closed before the job got a slot
                tracing::debug!(job_id = %job_id, "Job never started: {e}");
                let _ = self.store.cancel(job_id);
            }
        }

        self.pool.record_outcome(entry.status());
    }

    async fn process(
        &self,
        entry: &Arc<JobEntry>,
        job_id: JobId,
        product_id: ProductId,
        options: CalculationOptions,
    ) {
        match self.calculate(entry, job_id, product_id, options).await {
            Ok(results) => self.publish(job_id, product_id, results).await,
            Err(e) if e.is_cancellation() => {
                tracing::debug!(job_id = %job_id, "Calculation stopped after cancellation");
            }
            Err(e) => match self.store.fail(job_id, e.to_string()) {
                Ok(_) => tracing::error!(job_id = %job_id, product_id = %product_id, "Calculation failed: {e}"),
                Err(_) => tracing::debug!(job_id = %job_id, "Failure after job ended: {e}"),
            },
        }
    }

    /// Load the BOM and run the calculator under the time limit
    async fn calculate(
        &self,
        entry: &Arc<JobEntry>,
        job_id: JobId,
        product_id: ProductId,
        options: CalculationOptions,
    ) -> Result<LcaResults, JobError> {
        let bom = self.repository.load_bom(product_id).await?;

        self.store
            .start_processing(job_id)
            .map_err(|_| JobError::from(CalculationError::Cancelled))?;
        tracing::debug!(job_id = %job_id, items = bom.len(), "Calculation processing");

        let calculator = Arc::clone(&self.calculator);
        let checkpoint = JobCheckpoint {
            entry: Arc::clone(entry),
        };
        let work = tokio::task::spawn_blocking(move || {
            calculator.calculate(product_id, &bom, options, &checkpoint)
        });

        let limit_secs = self.config.max_processing_secs;
        match tokio::time::timeout(Duration::from_secs(limit_secs), work).await {
            Ok(Ok(outcome)) => outcome.map_err(JobError::from),
            Ok(Err(e)) => Err(JobError::Worker(e.to_string())),
            Err(_) => {
                entry.request_stop();
                tracing::warn!(job_id = %job_id, limit_secs, "Calculation timed out");
                Err(CalculationError::Timeout { limit_secs }.into())
            }
        }
    }

    /// Complete the job and run its one sync
    async fn publish(&self, job_id: JobId, product_id: ProductId, results: LcaResults) {
        let results = Arc::new(results);
        if let Err(e) = self.store.complete(job_id, Arc::clone(&results)) {
            tracing::debug!(job_id = %job_id, "Results discarded: {e}");
            return;
        }
        tracing::info!(
            job_id = %job_id,
            product_id = %product_id,
            total_co2e = results.total_co2e,
            "Calculation completed"
        );

        let outcome = match self.sync.sync_results(product_id, &results).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(job_id = %job_id, product_id = %product_id, "Sync failed: {e}");
                SyncResult::failed(product_id, &e)
            }
        };
        self.store.record_sync(job_id, outcome);
    }
}
