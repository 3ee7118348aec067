//! LCA Sync - validated write-back of calculation results
//!
//! After a calculation completes, [`SyncService`] compares the new carbon,
//! water and waste totals against the product's stored footprint and writes
//! the accepted metrics back in one atomic update.
//!
//! # Example
//!
//! ```rust,ignore
//! use lca_sync::{SyncConfig, SyncService};
//!
//! let sync = SyncService::new(repository, SyncConfig::default());
//! let outcome = sync.sync_results(product_id, &results).await?;
//! for warning in &outcome.validation_errors {
//!     eprintln!("{warning}");
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod rules;
pub mod service;

pub use config::SyncConfig;
pub use error::SyncError;
pub use rules::{ValidationRule, ValidationRules, ValidationWarning};
pub use service::{SyncResult, SyncService};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
