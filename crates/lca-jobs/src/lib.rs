//! LCA Jobs - asynchronous calculation job lifecycle
//!
//! Wires the engine and the sync service into long-running jobs:
//! - Job records and their state machine
//! - One active job per product
//! - Bounded worker pool with a processing time limit
//! - Cooperative cancellation
//! - Read-only polling interface
//!
//! # Example
//!
//! ```rust,ignore
//! use lca_jobs::{CalculationService, LcaConfig};
//! use lca_model::{CalculationOptions, ProductId, ReferenceTables};
//! use std::time::Duration;
//!
//! let service = CalculationService::new(repository, ReferenceTables::shared_defaults(), LcaConfig::default())?;
//! let job_id = service.start_calculation(ProductId(12), CalculationOptions::iso())?;
//!
//! let job = service
//!     .query()
//!     .wait_for_terminal(job_id, Duration::from_millis(200), Duration::from_secs(60))
//!     .await?;
//! println!("{} -> {}", job.id, job.status);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod job;
pub mod manager;
pub mod query;
pub mod state_machine;
pub mod store;
pub mod worker;

pub use config::{ConflictPolicy, JobConfig, LcaConfig};
pub use error::{ConfigError, JobError};
pub use job::{CalculationJob, JobStatus, MAX_RUNNING_PROGRESS};
pub use manager::CalculationService;
pub use query::JobQuery;
pub use state_machine::{allowed_transitions, validate_transition};
pub use store::{CancelAck, JobEntry, JobStore};
pub use worker::{PoolStats, WorkerPool, WorkerSlot};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
