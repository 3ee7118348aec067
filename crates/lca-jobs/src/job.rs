//! Calculation job record
//!
//! A `CalculationJob` is owned by the [`JobStore`](crate::store::JobStore);
//! callers only ever see cloned snapshots. Every mutation goes through a
//! method here that checks the lifecycle first.

use crate::error::JobError;
use crate::state_machine::validate_transition;
use chrono::{DateTime, Utc};
use lca_model::{CalculationOptions, JobId, LcaResults, ProductId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Highest progress a job reports before its results are attached
pub const MAX_RUNNING_PROGRESS: u8 = 99;

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// All statuses
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One LCA calculation for one product
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationJob {
    pub id: JobId,
    pub product_id: ProductId,
    pub status: JobStatus,
    /// 0..=100, never decreases
    pub progress: u8,
    pub options: CalculationOptions,
    pub results: Option<Arc<LcaResults>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds
    pub estimated_time_remaining: Option<u64>,
}

impl CalculationJob {
    /// Create pending job
    #[must_use]
    pub fn new(product_id: ProductId, options: CalculationOptions, initial_estimate_secs: u64) -> Self {
        Self {
            id: JobId::new(),
            product_id,
            status: JobStatus::Pending,
            progress: 0,
            options,
            results: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            estimated_time_remaining: Some(initial_estimate_secs),
        }
    }

    /// Check if job is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `to`, stamping start/finish times
    ///
    /// # Errors
    /// - `JobError::IllegalTransition` if the lifecycle forbids it
    pub fn transition(&mut self, to: JobStatus) -> Result<(), JobError> {
        validate_transition(self.status, to)?;
        let now = Utc::now();
        if to == JobStatus::Processing {
            self.started_at = Some(now);
        }
        if to.is_terminal() {
            self.completed_at = Some(now);
            self.estimated_time_remaining = None;
        }
        self.status = to;
        Ok(())
    }

    /// Record calculation progress
    ///
    /// Ignored unless processing; values below the current progress are
    /// ignored and values above [`MAX_RUNNING_PROGRESS`] are capped.
    /// Returns whether progress moved.
    pub fn advance(&mut self, progress: u8) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        let progress = progress.min(MAX_RUNNING_PROGRESS);
        if progress <= self.progress {
            return false;
        }
        self.progress = progress;
        self.estimated_time_remaining = self.extrapolate_remaining(Utc::now());
        true
    }

    /// Attach results and complete, in one step
    ///
    /// # Errors
    /// - `JobError::IllegalTransition` unless processing
    pub fn complete(&mut self, results: Arc<LcaResults>) -> Result<(), JobError> {
        self.transition(JobStatus::Completed)?;
        self.progress = 100;
        self.results = Some(results);
        Ok(())
    }

    /// Fail with a message
    ///
    /// # Errors
    /// - `JobError::IllegalTransition` if already terminal
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// `elapsed * (100 - p) / p`, in whole seconds
    fn extrapolate_remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        let started = self.started_at?;
        if self.progress == 0 {
            return self.estimated_time_remaining;
        }
        let elapsed_ms = u64::try_from((now - started).num_milliseconds()).unwrap_or(0);
        let remaining_ms =
            elapsed_ms * u64::from(100 - self.progress) / u64::from(self.progress);
        Some(remaining_ms.div_ceil(1_000))
    }
}
