//! Plausibility rules for synced footprint metrics
//!
//! One fixed rule per metric. Rules are compiled in and cannot be edited at
//! runtime; a rule violation produces a [`ValidationWarning`], never an error.

use lca_model::FootprintMetric;
use serde::Serialize;

/// Bounds and change-rate limit for one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub field: FootprintMetric,
    pub min_value: f64,
    pub max_value: f64,
    pub max_change_percentage: f64,
    pub description: &'static str,
}

impl ValidationRule {
    /// Relative change `|new - prev| / prev * 100`, defined only for prev > 0
    #[inline]
    #[must_use]
    pub fn change_percentage(previous: Option<f64>, new: f64) -> Option<f64> {
        previous
            .filter(|p| p.is_finite() && *p > 0.0)
            .map(|p| (new - p).abs() / p * 100.0)
    }

    /// Absolute bounds check
    #[must_use]
    pub fn check_bounds(&self, value: f64) -> Option<ValidationWarning> {
        if value < self.min_value || value > self.max_value {
            Some(ValidationWarning::OutOfBounds {
                metric: self.field,
                value,
                min: self.min_value,
                max: self.max_value,
            })
        } else {
            None
        }
    }

    /// Relative change check against the previous stored value
    #[must_use]
    pub fn check_change(&self, previous: Option<f64>, new: f64) -> Option<ValidationWarning> {
        let change = Self::change_percentage(previous, new)?;
        if change > self.max_change_percentage {
            Some(ValidationWarning::ExcessiveChange {
                metric: self.field,
                previous: previous.unwrap_or_default(),
                new,
                change_percentage: change,
                limit: self.max_change_percentage,
            })
        } else {
            None
        }
    }
}

/// The fixed rule set
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRules {
    rules: Vec<ValidationRule>,
}

impl ValidationRules {
    /// Standard rules for carbon, water and waste footprints
    #[must_use]
    pub fn standard() -> Self {
        Self {
            rules: vec![
                ValidationRule {
                    field: FootprintMetric::Carbon,
                    min_value: 0.0,
                    max_value: 1_000.0,
                    max_change_percentage: 300.0,
                    description: "Carbon footprint in kg CO2e per product unit",
                },
                ValidationRule {
                    field: FootprintMetric::Water,
                    min_value: 0.0,
                    max_value: 100_000.0,
                    max_change_percentage: 300.0,
                    description: "Water footprint in liters per product unit",
                },
                ValidationRule {
                    field: FootprintMetric::Waste,
                    min_value: 0.0,
                    max_value: 1_000.0,
                    max_change_percentage: 300.0,
                    description: "Waste footprint in kg per product unit",
                },
            ],
        }
    }

    /// Rule for a metric
    #[must_use]
    pub fn get(&self, metric: FootprintMetric) -> Option<&ValidationRule> {
        self.rules.iter().find(|r| r.field == metric)
    }

    /// Iterate rules in metric order
    pub fn iter(&self) -> impl Iterator<Item = &ValidationRule> {
        self.rules.iter()
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::standard()
    }
}

/// Non-fatal validation finding
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    /// Value outside [min, max]
    OutOfBounds {
        metric: FootprintMetric,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Change against the stored value exceeds the rule's limit
    ExcessiveChange {
        metric: FootprintMetric,
        previous: f64,
        new: f64,
        change_percentage: f64,
        limit: f64,
    },
    /// Change exceeds the configured rejection threshold; value not written
    Rejected {
        metric: FootprintMetric,
        change_percentage: f64,
        threshold: f64,
    },
}

impl ValidationWarning {
    /// Metric the warning is about
    #[inline]
    #[must_use]
    pub fn metric(&self) -> FootprintMetric {
        match self {
            Self::OutOfBounds { metric, .. }
            | Self::ExcessiveChange { metric, .. }
            | Self::Rejected { metric, .. } => *metric,
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfBounds {
                metric,
                value,
                min,
                max,
            } => write!(f, "{metric} value {value} is outside the plausible range [{min}, {max}]"),
            Self::ExcessiveChange {
                metric,
                previous,
                new,
                change_percentage,
                limit,
            } => write!(
                f,
                "{metric} changed from {previous} to {new} ({change_percentage:.1}%), exceeding the {limit}% limit"
            ),
            Self::Rejected {
                metric,
                change_percentage,
                threshold,
            } => write!(
                f,
                "{metric} not updated: change of {change_percentage:.1}% exceeds the {threshold}% rejection threshold"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn carbon() -> ValidationRule {
        ValidationRules::standard()
            .get(FootprintMetric::Carbon)
            .cloned()
            .unwrap()
    }

    #[test]
    fn change_of_350_percent_warns() {
        let warning = carbon().check_change(Some(10.0), 45.0).unwrap();
        match &warning {
            ValidationWarning::ExcessiveChange {
                change_percentage, ..
            } => assert!((change_percentage - 350.0).abs() < 1e-9),
            other => panic!("unexpected warning {other:?}"),
        }
        let message = warning.to_string();
        assert!(message.contains("10"));
        assert!(message.contains("45"));
        assert!(message.contains("350.0%"));
    }

    #[test]
    fn change_of_250_percent_is_fine() {
        assert_eq!(carbon().check_change(Some(10.0), 35.0), None);
    }

    #[test]
    fn no_previous_value_means_no_change_check() {
        assert_eq!(ValidationRule::change_percentage(None, 5.0), None);
        assert_eq!(ValidationRule::change_percentage(Some(0.0), 5.0), None);
        assert_eq!(carbon().check_change(Some(0.0), 5000.0), None);
    }

    #[test]
    fn small_change_percentage() {
        let pct = ValidationRule::change_percentage(Some(0.80), 0.9558).unwrap();
        assert!((pct - 19.475).abs() < 1e-9);
    }

    #[test]
    fn bounds() {
        let rule = carbon();
        assert!(rule.check_bounds(0.5).is_none());
        assert!(rule.check_bounds(1_000.0).is_none());
        let warning = rule.check_bounds(1_500.0).unwrap();
        assert_eq!(warning.metric(), FootprintMetric::Carbon);
        assert!(warning.to_string().contains("carbonFootprint"));
    }

    #[test]
    fn standard_rules_cover_every_metric() {
        let rules = ValidationRules::standard();
        for metric in FootprintMetric::ALL {
            assert!(rules.get(metric).is_some());
        }
        assert_eq!(rules.iter().count(), 3);
    }
}
