//! Error types for the job lifecycle

use crate::job::JobStatus;
use lca_engine::CalculationError;
use lca_model::{JobId, ProductId, RepositoryError};

/// Job lifecycle errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    /// Product already has a non-terminal job
    #[error("product {product_id} already has an active calculation job {active_job}")]
    Conflict {
        product_id: ProductId,
        active_job: JobId,
    },

    /// Unknown job id
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// Transition not permitted by the lifecycle
    #[error("illegal job transition: {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    /// Calculation failed
    #[error(transparent)]
    Calculation(#[from] CalculationError),

    /// Product store failed while loading the BOM
    #[error("failed to load bill of materials: {0}")]
    Repository(RepositoryError),

    /// Blocking worker panicked or was aborted
    #[error("calculation worker failed: {0}")]
    Worker(String),

    /// Job still not terminal when a wait deadline passed
    #[error("job {job_id} still {status} after waiting")]
    Deadline { job_id: JobId, status: JobStatus },

    /// Service no longer accepts work
    #[error("calculation service is shutting down")]
    ShuttingDown,
}

impl JobError {
    /// Check if error is a duplicate-active-job conflict
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if error is an unknown job id
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if the calculation stopped because of cancellation
    #[inline]
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Calculation(CalculationError::Cancelled))
    }
}

impl From<RepositoryError> for JobError {
    /// A product without a BOM is missing input data, not a store failure
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::MissingBom(_) => {
                Self::Calculation(CalculationError::input(err.to_string()))
            }
            other => Self::Repository(other),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for `LcaConfig`
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parse but cannot be used
    #[error("invalid config value: {0}")]
    Invalid(String),
}
