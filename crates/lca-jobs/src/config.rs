//! Workspace configuration
//!
//! Loaded from TOML; every key is optional.
//!
//! ```toml
//! [jobs]
//! max_concurrent_jobs = 4
//! max_processing_secs = 300
//! initial_estimate_secs = 30
//! conflict_policy = "reject"   # or "cancel_and_replace"
//!
//! [sync]
//! enabled = true
//! reject_change_percentage = 1000.0
//! ```

use crate::error::ConfigError;
use lca_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What `start_calculation` does when the product already has an active job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Refuse with `JobError::Conflict`
    #[default]
    Reject,
    /// Cancel the active job and start a new one
    CancelAndReplace,
}

/// Job lifecycle settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Jobs processing at the same time
    pub max_concurrent_jobs: usize,
    /// Processing time limit in seconds
    pub max_processing_secs: u64,
    /// Remaining-time estimate reported while pending
    pub initial_estimate_secs: u64,
    pub conflict_policy: ConflictPolicy,
}

impl JobConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With max concurrent jobs
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// With processing time limit
    #[inline]
    #[must_use]
    pub fn with_max_processing_secs(mut self, secs: u64) -> Self {
        self.max_processing_secs = secs;
        self
    }

    /// With conflict policy
    #[inline]
    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            max_processing_secs: 300,
            initial_estimate_secs: 30,
            conflict_policy: ConflictPolicy::Reject,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LcaConfig {
    pub jobs: JobConfig,
    pub sync: SyncConfig,
}

impl LcaConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With job settings
    #[inline]
    #[must_use]
    pub fn with_jobs(mut self, jobs: JobConfig) -> Self {
        self.jobs = jobs;
        self
    }

    /// With sync settings
    #[inline]
    #[must_use]
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` on malformed TOML
    /// - `ConfigError::Invalid` on unusable values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - see [`LcaConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// - `ConfigError::Invalid` naming the first bad value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "jobs.max_concurrent_jobs must be at least 1".into(),
            ));
        }
        if self.jobs.max_processing_secs == 0 {
            return Err(ConfigError::Invalid(
                "jobs.max_processing_secs must be at least 1".into(),
            ));
        }
        if let Some(threshold) = self.sync.reject_change_percentage {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "sync.reject_change_percentage must be positive, got {threshold}"
                )));
            }
        }
        Ok(())
    }
}
