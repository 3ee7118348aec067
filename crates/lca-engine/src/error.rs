//! Error types for the calculation engine

/// Kind of reference factor that could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactorKind {
    /// GWP factor for a gas
    Gwp,
    /// Emission / water / waste intensity for a material or activity
    Intensity,
}

impl std::fmt::Display for FactorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactorKind::Gwp => f.write_str("GWP"),
            FactorKind::Intensity => f.write_str("intensity"),
        }
    }
}

/// Calculation errors
///
/// Every variant is terminal for the job that hit it; none is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalculationError {
    /// BOM cannot drive a calculation
    #[error("input data error: {0}")]
    InputData(String),

    /// No reference factor for a required gas or material
    #[error("missing {kind} factor: {key}")]
    MissingFactor { kind: FactorKind, key: String },

    /// Cancellation observed at a checkpoint
    #[error("calculation cancelled")]
    Cancelled,

    /// Processing time limit exceeded
    #[error("calculation exceeded the {limit_secs}s processing limit")]
    Timeout { limit_secs: u64 },
}

impl CalculationError {
    /// Create input data error
    #[inline]
    pub fn input(message: impl Into<String>) -> Self {
        Self::InputData(message.into())
    }

    /// Create missing factor error
    #[inline]
    pub fn missing(kind: FactorKind, key: impl Into<String>) -> Self {
        Self::MissingFactor {
            kind,
            key: key.into(),
        }
    }

    /// Check if the error stems from the BOM itself
    #[inline]
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InputData(_))
    }

    /// Check if the error stems from incomplete reference data
    #[inline]
    #[must_use]
    pub fn is_missing_factor(&self) -> bool {
        matches!(self, Self::MissingFactor { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_factor_names_the_key() {
        let err = CalculationError::missing(FactorKind::Gwp, "HFC-134a");
        assert_eq!(err.to_string(), "missing GWP factor: HFC-134a");
        assert!(err.is_missing_factor());
        assert!(!err.is_input_error());
    }

    #[test]
    fn timeout_display() {
        let err = CalculationError::Timeout { limit_secs: 300 };
        assert!(err.to_string().contains("300s"));
    }
}
