//! GWP and intensity reference tables
//!
//! Read-only lookup data, loaded once per process and shared between
//! concurrently running calculations behind an `Arc`. No locking is needed
//! because nothing mutates a table after construction.

use crate::error::ReferenceDataError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Global warming potential of one gas (IPCC AR5, 100-year horizon)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GwpFactor {
    /// Chemical formula used as lookup key (e.g. "CH4")
    pub gas_formula: String,
    #[serde(rename = "gwp100yrAr5")]
    pub gwp_100yr_ar5: f64,
    pub gas_name: String,
}

impl GwpFactor {
    /// Create new GWP factor
    #[inline]
    #[must_use]
    pub fn new(gas_formula: impl Into<String>, gwp: f64, gas_name: impl Into<String>) -> Self {
        Self {
            gas_formula: gas_formula.into(),
            gwp_100yr_ar5: gwp,
            gas_name: gas_name.into(),
        }
    }
}

/// Mass of one gas emitted per unit of activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEmission {
    pub gas_formula: String,
    pub kg_per_unit: f64,
}

impl GasEmission {
    #[inline]
    #[must_use]
    pub fn new(gas_formula: impl Into<String>, kg_per_unit: f64) -> Self {
        Self {
            gas_formula: gas_formula.into(),
            kg_per_unit,
        }
    }
}

/// Per-unit emission, water and waste intensity of a material or activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntensityFactor {
    pub key: String,
    /// Unit the BOM quantity must be expressed in
    pub unit: String,
    #[serde(default)]
    pub emissions: Vec<GasEmission>,
    #[serde(default)]
    pub water_liters_per_unit: f64,
    /// Share of the water that is agricultural (rest is processing water)
    #[serde(default)]
    pub agricultural_water_fraction: f64,
    #[serde(default)]
    pub waste_kg_per_unit: f64,
    #[serde(default)]
    pub recyclable_fraction: f64,
    #[serde(default)]
    pub hazardous_fraction: f64,
}

impl IntensityFactor {
    /// Create a factor with no flows
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            unit: unit.into(),
            emissions: Vec::new(),
            water_liters_per_unit: 0.0,
            agricultural_water_fraction: 0.0,
            waste_kg_per_unit: 0.0,
            recyclable_fraction: 0.0,
            hazardous_fraction: 0.0,
        }
    }

    /// Add a gas emission
    #[inline]
    #[must_use]
    pub fn with_emission(mut self, gas_formula: impl Into<String>, kg_per_unit: f64) -> Self {
        self.emissions.push(GasEmission::new(gas_formula, kg_per_unit));
        self
    }

    /// Set water intensity
    #[inline]
    #[must_use]
    pub fn with_water(mut self, liters_per_unit: f64, agricultural_fraction: f64) -> Self {
        self.water_liters_per_unit = liters_per_unit;
        self.agricultural_water_fraction = agricultural_fraction;
        self
    }

    /// Set waste intensity
    #[inline]
    #[must_use]
    pub fn with_waste(mut self, kg_per_unit: f64, recyclable: f64, hazardous: f64) -> Self {
        self.waste_kg_per_unit = kg_per_unit;
        self.recyclable_fraction = recyclable;
        self.hazardous_fraction = hazardous;
        self
    }

    fn check(&self) -> Result<(), ReferenceDataError> {
        let invalid = |field: &'static str| ReferenceDataError::InvalidValue {
            key: self.key.clone(),
            field,
        };
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;
        let fraction = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);

        if self.emissions.iter().any(|e| !non_negative(e.kg_per_unit)) {
            return Err(invalid("kgPerUnit"));
        }
        if !non_negative(self.water_liters_per_unit) {
            return Err(invalid("waterLitersPerUnit"));
        }
        if !fraction(self.agricultural_water_fraction) {
            return Err(invalid("agriculturalWaterFraction"));
        }
        if !non_negative(self.waste_kg_per_unit) {
            return Err(invalid("wasteKgPerUnit"));
        }
        if !fraction(self.recyclable_fraction) {
            return Err(invalid("recyclableFraction"));
        }
        if !fraction(self.hazardous_fraction) {
            return Err(invalid("hazardousFraction"));
        }
        Ok(())
    }
}

/// On-disk layout of a reference table file
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableFile {
    #[serde(default)]
    gwp_factors: Vec<GwpFactor>,
    #[serde(default)]
    intensity_factors: Vec<IntensityFactor>,
}

static DEFAULT_TABLES: Lazy<Arc<ReferenceTables>> =
    Lazy::new(|| Arc::new(ReferenceTables::builtin()));

/// GWP and intensity lookup tables
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    gwp: HashMap<String, GwpFactor>,
    intensity: HashMap<String, IntensityFactor>,
}

impl ReferenceTables {
    /// Create empty tables
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build tables from factor lists, rejecting duplicates and bad values
    ///
    /// # Errors
    /// - `ReferenceDataError::DuplicateFactor` if two factors share a key
    /// - `ReferenceDataError::InvalidValue` for negative / non-finite values
    ///   or fractions outside [0, 1]
    pub fn from_factors(
        gwp_factors: Vec<GwpFactor>,
        intensity_factors: Vec<IntensityFactor>,
    ) -> Result<Self, ReferenceDataError> {
        let mut tables = Self::new();

        for factor in gwp_factors {
            if !factor.gwp_100yr_ar5.is_finite() || factor.gwp_100yr_ar5 < 0.0 {
                return Err(ReferenceDataError::InvalidValue {
                    key: factor.gas_formula,
                    field: "gwp100yrAr5",
                });
            }
            let key = factor.gas_formula.clone();
            if tables.gwp.insert(key.clone(), factor).is_some() {
                return Err(ReferenceDataError::DuplicateFactor(key));
            }
        }

        for factor in intensity_factors {
            factor.check()?;
            let key = factor.key.clone();
            if tables.intensity.insert(key.clone(), factor).is_some() {
                return Err(ReferenceDataError::DuplicateFactor(key));
            }
        }

        Ok(tables)
    }

    /// Parse tables from JSON (`{"gwpFactors": [...], "intensityFactors": [...]}`)
    ///
    /// # Errors
    /// Parse errors plus everything [`ReferenceTables::from_factors`] rejects
    pub fn from_json_str(json: &str) -> Result<Self, ReferenceDataError> {
        let file: TableFile = serde_json::from_str(json)?;
        Self::from_factors(file.gwp_factors, file.intensity_factors)
    }

    /// Load tables from a JSON file
    ///
    /// # Errors
    /// I/O errors plus everything [`ReferenceTables::from_json_str`] rejects
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReferenceDataError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to the JSON file layout, sorted by key
    ///
    /// # Errors
    /// Serialization errors from `serde_json`
    pub fn to_json_string(&self) -> Result<String, ReferenceDataError> {
        let file = TableFile {
            gwp_factors: self.gwp_factors().into_iter().cloned().collect(),
            intensity_factors: self.intensity_factors().into_iter().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Process-wide built-in tables, constructed on first use
    #[inline]
    #[must_use]
    pub fn shared_defaults() -> Arc<ReferenceTables> {
        Arc::clone(&DEFAULT_TABLES)
    }

    /// Look up a gas by formula
    #[inline]
    #[must_use]
    pub fn gwp(&self, gas_formula: &str) -> Option<&GwpFactor> {
        self.gwp.get(gas_formula)
    }

    /// Look up a material / activity intensity
    #[inline]
    #[must_use]
    pub fn intensity(&self, key: &str) -> Option<&IntensityFactor> {
        self.intensity.get(key)
    }

    /// GWP factors sorted by formula
    #[must_use]
    pub fn gwp_factors(&self) -> Vec<&GwpFactor> {
        let mut factors: Vec<_> = self.gwp.values().collect();
        factors.sort_by(|a, b| a.gas_formula.cmp(&b.gas_formula));
        factors
    }

    /// Intensity factors sorted by key
    #[must_use]
    pub fn intensity_factors(&self) -> Vec<&IntensityFactor> {
        let mut factors: Vec<_> = self.intensity.values().collect();
        factors.sort_by(|a, b| a.key.cmp(&b.key));
        factors
    }

    // Illustrative factors for demos and tests; production deployments load
    // their maintained dataset through `load`.
    fn builtin() -> Self {
        let gwp = vec![
            GwpFactor::new("CO2", 1.0, "Carbon dioxide"),
            GwpFactor::new("CH4", 27.9, "Methane"),
            GwpFactor::new("N2O", 273.0, "Nitrous oxide"),
            GwpFactor::new("SF6", 25_200.0, "Sulfur hexafluoride"),
        ];

        let intensity = vec![
            IntensityFactor::new("wheat_flour", "kg")
                .with_emission("CO2", 0.45)
                .with_emission("CH4", 0.001)
                .with_emission("N2O", 0.0003)
                .with_water(800.0, 0.95)
                .with_waste(0.02, 0.5, 0.0),
            IntensityFactor::new("sugar", "kg")
                .with_emission("CO2", 0.6)
                .with_emission("CH4", 0.002)
                .with_water(1500.0, 0.9)
                .with_waste(0.05, 0.3, 0.0),
            IntensityFactor::new("pet_bottle", "kg")
                .with_emission("CO2", 2.2)
                .with_emission("CH4", 0.004)
                .with_water(20.0, 0.0)
                .with_waste(0.05, 0.8, 0.0),
            IntensityFactor::new("glass_bottle", "kg")
                .with_emission("CO2", 0.85)
                .with_water(5.0, 0.0)
                .with_waste(0.03, 0.9, 0.0),
            IntensityFactor::new("cardboard", "kg")
                .with_emission("CO2", 0.9)
                .with_emission("CH4", 0.01)
                .with_water(30.0, 0.1)
                .with_waste(0.1, 0.85, 0.0),
            IntensityFactor::new("road_freight", "tkm")
                .with_emission("CO2", 0.1)
                .with_emission("CH4", 0.000_005)
                .with_emission("N2O", 0.000_003),
            IntensityFactor::new("electricity_grid", "kWh")
                .with_emission("CO2", 0.4)
                .with_emission("CH4", 0.000_01)
                .with_emission("N2O", 0.000_005)
                .with_water(2.0, 0.0),
            IntensityFactor::new("landfill", "kg")
                .with_emission("CO2", 0.02)
                .with_emission("CH4", 0.02)
                .with_waste(1.0, 0.0, 0.0),
            IntensityFactor::new("incineration", "kg")
                .with_emission("CO2", 1.1)
                .with_emission("N2O", 0.0001)
                .with_waste(0.2, 0.0, 0.25),
        ];

        // The literal tables above satisfy every `from_factors` check.
        match Self::from_factors(gwp, intensity) {
            Ok(tables) => tables,
            Err(_) => Self::new(),
        }
    }
}
