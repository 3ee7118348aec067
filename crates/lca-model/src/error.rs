//! Error types for the LCA model
//!
//! - Reference table loading and consistency failures
//! - Product store failures

use crate::types::ProductId;

/// Reference data errors
#[derive(Debug, thiserror::Error)]
pub enum ReferenceDataError {
    /// Table file could not be read
    #[error("failed to read reference tables: {0}")]
    Io(#[from] std::io::Error),

    /// Table file is not valid JSON for the expected shape
    #[error("failed to parse reference tables: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two factors share a key
    #[error("duplicate reference factor: {0}")]
    DuplicateFactor(String),

    /// A factor carries a negative or non-finite number
    #[error("invalid value for {field} in factor {key}")]
    InvalidValue { key: String, field: &'static str },
}

/// Product store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// No product with this id
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Product exists but has no bill of materials
    #[error("product {0} has no bill of materials")]
    MissingBom(ProductId),

    /// Backend failure (connection, constraint, ...)
    #[error("storage failure: {0}")]
    Storage(String),
}

impl RepositoryError {
    /// Check if the error means the product simply does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProductNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_error_display() {
        let err = RepositoryError::ProductNotFound(ProductId(7));
        assert_eq!(err.to_string(), "product not found: 7");
        assert!(err.is_not_found());
        assert!(!RepositoryError::Storage("down".into()).is_not_found());
    }

    #[test]
    fn reference_error_names_the_factor() {
        let err = ReferenceDataError::InvalidValue {
            key: "steel".into(),
            field: "wasteKgPerUnit",
        };
        assert!(err.to_string().contains("steel"));
    }
}
