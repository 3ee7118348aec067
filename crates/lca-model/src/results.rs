//! Calculation results
//!
//! `LcaResults` is built once per completed job and never mutated after it
//! has been attached to the job record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Methodology label recorded in results metadata
pub const METHODOLOGY: &str = "IPCC AR5 GWP100";

/// One greenhouse gas line: `co2e = mass_kg * gwp_factor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhgEntry {
    pub gas_name: String,
    pub gas_formula: String,
    pub mass_kg: f64,
    pub gwp_factor: f64,
    pub co2e: f64,
}

impl GhgEntry {
    /// Create entry, deriving `co2e` from mass and factor
    #[inline]
    #[must_use]
    pub fn new(
        gas_name: impl Into<String>,
        gas_formula: impl Into<String>,
        mass_kg: f64,
        gwp_factor: f64,
    ) -> Self {
        Self {
            gas_name: gas_name.into(),
            gas_formula: gas_formula.into(),
            mass_kg,
            gwp_factor,
            co2e: mass_kg * gwp_factor,
        }
    }
}

/// Water use, split into agricultural and processing water
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterFootprint {
    pub total_liters: f64,
    pub agricultural_water: f64,
    pub processing_water: f64,
}

/// Waste generated, with recyclable and hazardous shares
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasteOutput {
    pub total_kg: f64,
    pub recyclable_kg: f64,
    pub hazardous_kg: f64,
}

/// Impact in one reporting category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryImpact {
    pub category: String,
    pub impact: f64,
    pub unit: String,
}

impl CategoryImpact {
    #[inline]
    #[must_use]
    pub fn new(category: impl Into<String>, impact: f64, unit: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            impact,
            unit: unit.into(),
        }
    }
}

/// Calculation metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsMetadata {
    pub iso_compliant: bool,
    pub lci_flows_count: usize,
    pub gwp_factors_used: usize,
    /// Set when water or waste subtotals were clamped to their aggregate
    pub mass_balance_adjusted: bool,
    pub methodology: String,
    pub calculated_at: DateTime<Utc>,
}

/// Full output of one LCA calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LcaResults {
    #[serde(rename = "totalCO2e")]
    pub total_co2e: f64,
    /// Same value as `total_co2e`, kept for older readers
    pub total_carbon_footprint: f64,
    pub ghg_breakdown: Vec<GhgEntry>,
    pub water_footprint: WaterFootprint,
    pub waste_output: WasteOutput,
    pub impacts_by_category: Vec<CategoryImpact>,
    pub metadata: ResultsMetadata,
}

impl LcaResults {
    /// Sum of `co2e` over the breakdown, in breakdown order
    #[must_use]
    pub fn breakdown_total(&self) -> f64 {
        self.ghg_breakdown.iter().map(|e| e.co2e).sum()
    }

    /// Breakdown entry for a gas formula
    #[must_use]
    pub fn gas(&self, gas_formula: &str) -> Option<&GhgEntry> {
        self.ghg_breakdown
            .iter()
            .find(|e| e.gas_formula == gas_formula)
    }

    /// Impact for a category label
    #[must_use]
    pub fn impact(&self, category: &str) -> Option<&CategoryImpact> {
        self.impacts_by_category
            .iter()
            .find(|c| c.category == category)
    }
}

/// Round to four decimals for presentation. Never feed the output back into
/// validation or persistence.
#[inline]
#[must_use]
pub fn round_for_display(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
