//! Error types for validation and sync
//!
//! Validation findings are warnings (see `rules`), not errors. Only hard
//! failures of the write-back path end up here.

use lca_model::{FootprintMetric, ProductId, RepositoryError};

/// Sync errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Product is not in the store
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Store failed to read or write
    #[error("persistence failure for product {product_id}: {source}")]
    Persistence {
        product_id: ProductId,
        source: RepositoryError,
    },

    /// Value cannot be represented as a decimal
    #[error("cannot store {metric} value {value} as a decimal")]
    InvalidValue { metric: FootprintMetric, value: f64 },
}

impl SyncError {
    /// Classify a repository error for a product
    #[must_use]
    pub fn from_repository(product_id: ProductId, error: RepositoryError) -> Self {
        if error.is_not_found() {
            Self::ProductNotFound(product_id)
        } else {
            Self::Persistence {
                product_id,
                source: error,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_are_classified() {
        let not_found = SyncError::from_repository(
            ProductId(3),
            RepositoryError::ProductNotFound(ProductId(3)),
        );
        assert_eq!(not_found, SyncError::ProductNotFound(ProductId(3)));

        let storage =
            SyncError::from_repository(ProductId(3), RepositoryError::Storage("timeout".into()));
        assert!(matches!(storage, SyncError::Persistence { .. }));
        assert!(storage.to_string().contains("timeout"));
    }
}
