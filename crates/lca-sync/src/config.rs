//! Sync configuration, injected into `SyncService` at construction

use serde::{Deserialize, Serialize};

/// Validation & sync settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// When false, results are never written (dry run)
    pub enabled: bool,
    /// Change percentage above which a metric is not written at all.
    /// `None` keeps the warn-and-commit behavior for every change.
    pub reject_change_percentage: Option<f64>,
}

impl SyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dry-run configuration
    #[inline]
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// With rejection threshold
    #[inline]
    #[must_use]
    pub fn with_reject_threshold(mut self, percentage: f64) -> Self {
        self.reject_change_percentage = Some(percentage);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reject_change_percentage: None,
        }
    }
}
