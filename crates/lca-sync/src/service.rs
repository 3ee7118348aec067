//! Validation & sync service
//!
//! Gates freshly computed results before they overwrite a product's stored
//! footprint:
//! - Metrics that are zero, absent or non-finite are never written
//! - Bound and change-rate violations are recorded as warnings; the value is
//!   still written unless it crosses the optional rejection threshold
//! - All accepted metrics are written in one `update_footprint` call

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::rules::{ValidationRule, ValidationRules, ValidationWarning};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use lca_model::{FootprintMetric, FootprintUpdate, LcaResults, ProductId, ProductRepository};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

/// Outcome of one sync, returned to the caller and never persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub product_id: ProductId,
    pub success: bool,
    /// Sync disabled by configuration; nothing was considered
    pub skipped: bool,
    pub synced_fields: Vec<FootprintMetric>,
    pub validation_errors: Vec<String>,
    pub previous_values: BTreeMap<FootprintMetric, Option<f64>>,
    pub new_values: BTreeMap<FootprintMetric, Option<f64>>,
    pub timestamp: DateTime<Utc>,
}

impl SyncResult {
    fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            success: false,
            skipped: false,
            synced_fields: Vec::new(),
            validation_errors: Vec::new(),
            previous_values: BTreeMap::new(),
            new_values: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Result for a sync skipped by configuration
    #[must_use]
    pub fn skipped(product_id: ProductId) -> Self {
        Self {
            skipped: true,
            ..Self::empty(product_id)
        }
    }

    /// Result for a sync that hit a hard error
    #[must_use]
    pub fn failed(product_id: ProductId, error: &SyncError) -> Self {
        Self {
            validation_errors: vec![error.to_string()],
            ..Self::empty(product_id)
        }
    }

    /// Whether a metric was written
    #[inline]
    #[must_use]
    pub fn synced(&self, metric: FootprintMetric) -> bool {
        self.synced_fields.contains(&metric)
    }

    /// Whether any warning or error was recorded
    #[inline]
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.validation_errors.is_empty()
    }
}

/// Validation & sync service
pub struct SyncService {
    repository: Arc<dyn ProductRepository>,
    rules: ValidationRules,
    config: SyncConfig,
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("rules", &self.rules)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SyncService {
    /// Create service with the standard rules
    #[must_use]
    pub fn new(repository: Arc<dyn ProductRepository>, config: SyncConfig) -> Self {
        Self {
            repository,
            rules: ValidationRules::standard(),
            config,
        }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Get rules
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Validate `results` and write the accepted metrics to the product
    ///
    /// # Errors
    /// - `SyncError::ProductNotFound` if the product does not exist
    /// - `SyncError::Persistence` if reading or writing the footprint fails
    /// - `SyncError::InvalidValue` if a value cannot become a decimal
    pub async fn sync_results(
        &self,
        product_id: ProductId,
        results: &LcaResults,
    ) -> Result<SyncResult, SyncError> {
        if !self.config.enabled {
            tracing::info!(product_id = %product_id, "Sync disabled, skipping write-back");
            return Ok(SyncResult::skipped(product_id));
        }

        let current = self
            .repository
            .footprint(product_id)
            .await
            .map_err(|e| SyncError::from_repository(product_id, e))?;

        let mut outcome = SyncResult::empty(product_id);
        let mut update = FootprintUpdate::new();

        for rule in self.rules.iter() {
            let metric = rule.field;
            let previous = current.get(metric).and_then(ToPrimitive::to_f64);
            let incoming = metric.value_in(results);

            outcome.previous_values.insert(metric, previous);
            outcome
                .new_values
                .insert(metric, incoming.is_finite().then_some(incoming));

            if !is_provided(incoming) {
                tracing::debug!(product_id = %product_id, %metric, "Metric not provided, keeping stored value");
                continue;
            }

            let warnings = self.validate(rule, previous, incoming);
            let rejected = warnings
                .iter()
                .any(|w| matches!(w, ValidationWarning::Rejected { .. }));
            for warning in warnings {
                tracing::warn!(product_id = %product_id, %metric, "{warning}");
                outcome.validation_errors.push(warning.to_string());
            }
            if rejected {
                continue;
            }

            update.set(metric, to_decimal(metric, incoming)?);
        }

        if !update.is_empty() {
            let written = update.metrics();
            self.repository
                .update_footprint(product_id, update)
                .await
                .map_err(|e| SyncError::from_repository(product_id, e))?;
            tracing::info!(product_id = %product_id, fields = ?written, "Footprint synced");
            outcome.synced_fields = written;
        }

        outcome.success = true;
        Ok(outcome)
    }

    /// Sync several products; one item's failure never affects the others
    ///
    /// Returns one `SyncResult` per input item, in input order. Items that
    /// hit a hard error come back with `success == false` and the error in
    /// `validation_errors`.
    pub async fn sync_batch(&self, items: &[(ProductId, LcaResults)]) -> Vec<SyncResult> {
        let syncs = items.iter().map(|(product_id, results)| async move {
            match self.sync_results(*product_id, results).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(product_id = %product_id, "Batch sync item failed: {e}");
                    SyncResult::failed(*product_id, &e)
                }
            }
        });
        join_all(syncs).await
    }

    fn validate(
        &self,
        rule: &ValidationRule,
        previous: Option<f64>,
        incoming: f64,
    ) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        warnings.extend(rule.check_bounds(incoming));
        warnings.extend(rule.check_change(previous, incoming));

        if let (Some(threshold), Some(change)) = (
            self.config.reject_change_percentage,
            ValidationRule::change_percentage(previous, incoming),
        ) {
            if change > threshold {
                warnings.push(ValidationWarning::Rejected {
                    metric: rule.field,
                    change_percentage: change,
                    threshold,
                });
            }
        }
        warnings
    }
}

/// Zero, negative and non-finite values count as "not provided"
#[inline]
fn is_provided(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Shortest round-trip decimal form of `value`
fn to_decimal(metric: FootprintMetric, value: f64) -> Result<BigDecimal, SyncError> {
    BigDecimal::from_str(&value.to_string()).map_err(|_| SyncError::InvalidValue { metric, value })
}
