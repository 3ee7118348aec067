//! Calculation engine
//!
//! Turns a bill of materials into `LcaResults`:
//!
//! 1. Check the BOM (non-empty, matching product, finite non-negative quantities)
//! 2. Resolve every intensity and GWP factor up front
//! 3. Accumulate gas masses, water and waste per BOM item, hitting a
//!    checkpoint after each item
//! 4. Convert gas masses to CO2e (`co2e = mass_kg * gwp_100yr_ar5`)
//!
//! Steps 1 and 2 complete before any accumulation, so a failing BOM never
//! yields a partial result. All sums use `f64`; nothing is rounded here.

use crate::checkpoint::Checkpoint;
use crate::error::{CalculationError, FactorKind};
use chrono::Utc;
use indexmap::IndexMap;
use lca_model::results::METHODOLOGY;
use lca_model::{
    ActivityKind, BillOfMaterials, BomItem, CalculationOptions, CategoryImpact, GhgEntry,
    IntensityFactor, LcaResults, ProductId, ReferenceTables, ResultsMetadata, WasteOutput,
    WaterFootprint,
};
use std::sync::Arc;

/// Category label for total GHG impact
pub const CLIMATE_CHANGE: &str = "Climate change";
/// Category label for water use
pub const WATER_USE: &str = "Water use";
/// Category label for waste
pub const WASTE_GENERATION: &str = "Waste generation";

/// Something that can turn a BOM into results
///
/// [`CalculationEngine`] is the production implementation; the job worker
/// only depends on this trait.
pub trait Calculator: Send + Sync {
    /// Run a full calculation, reporting through `checkpoint`
    fn calculate(
        &self,
        product_id: ProductId,
        bom: &BillOfMaterials,
        options: CalculationOptions,
        checkpoint: &dyn Checkpoint,
    ) -> Result<LcaResults, CalculationError>;
}

/// LCA calculation engine
///
/// Holds the shared reference tables; cheap to clone.
#[derive(Debug, Clone)]
pub struct CalculationEngine {
    tables: Arc<ReferenceTables>,
}

/// BOM line paired with its resolved intensity factor
struct Resolved<'a> {
    item: &'a BomItem,
    factor: &'a IntensityFactor,
}

#[derive(Debug, Default)]
struct Accumulator {
    gas_mass_kg: IndexMap<String, f64>,
    co2e_by_activity: IndexMap<ActivityKind, f64>,
    water_total: f64,
    water_agricultural: f64,
    water_processing: f64,
    waste_total: f64,
    waste_recyclable: f64,
    waste_hazardous: f64,
    flows: usize,
}

impl CalculationEngine {
    /// Create engine over the given tables
    #[inline]
    #[must_use]
    pub fn new(tables: Arc<ReferenceTables>) -> Self {
        Self { tables }
    }

    /// Engine over the process-wide built-in tables
    #[inline]
    #[must_use]
    pub fn with_default_tables() -> Self {
        Self::new(ReferenceTables::shared_defaults())
    }

    /// Reference tables in use
    #[inline]
    #[must_use]
    pub fn tables(&self) -> &Arc<ReferenceTables> {
        &self.tables
    }

    /// Run a full calculation
    ///
    /// # Errors
    /// - `CalculationError::InputData` if the BOM is empty, belongs to another
    ///   product, carries a negative / non-finite quantity or a unit that does
    ///   not match its intensity factor
    /// - `CalculationError::MissingFactor` if a material or gas has no factor
    /// - Whatever the checkpoint returns (`Cancelled`, `Timeout`)
    pub fn calculate(
        &self,
        product_id: ProductId,
        bom: &BillOfMaterials,
        options: CalculationOptions,
        checkpoint: &dyn Checkpoint,
    ) -> Result<LcaResults, CalculationError> {
        check_bom(product_id, bom)?;
        let resolved = self.resolve(bom)?;
        let total = resolved.len();

        checkpoint.reached(0, total)?;

        let mut acc = Accumulator::default();
        for (idx, line) in resolved.iter().enumerate() {
            self.accumulate(&mut acc, line);
            checkpoint.reached(idx + 1, total)?;
        }

        let results = self.finish(acc, bom, options);
        tracing::debug!(
            product_id = %product_id,
            total_co2e = results.total_co2e,
            gases = results.ghg_breakdown.len(),
            "LCA calculation finished"
        );
        Ok(results)
    }

    fn resolve<'a>(&'a self, bom: &'a BillOfMaterials) -> Result<Vec<Resolved<'a>>, CalculationError> {
        bom.items
            .iter()
            .map(|item| {
                let factor = self
                    .tables
                    .intensity(&item.material)
                    .ok_or_else(|| CalculationError::missing(FactorKind::Intensity, &item.material))?;

                if !factor.unit.eq_ignore_ascii_case(&item.unit) {
                    return Err(CalculationError::input(format!(
                        "{} is given in {} but its intensity factor expects {}",
                        item.material, item.unit, factor.unit
                    )));
                }

                if let Some(gas) = factor
                    .emissions
                    .iter()
                    .find(|e| self.tables.gwp(&e.gas_formula).is_none())
                {
                    return Err(CalculationError::missing(FactorKind::Gwp, &gas.gas_formula));
                }

                Ok(Resolved { item, factor })
            })
            .collect()
    }

    fn accumulate(&self, acc: &mut Accumulator, line: &Resolved<'_>) {
        let quantity = line.item.quantity;
        let factor = line.factor;
        let mut item_co2e = 0.0;

        for emission in &factor.emissions {
            let mass = quantity * emission.kg_per_unit;
            *acc.gas_mass_kg
                .entry(emission.gas_formula.clone())
                .or_insert(0.0) += mass;
            if let Some(gwp) = self.tables.gwp(&emission.gas_formula) {
                item_co2e += mass * gwp.gwp_100yr_ar5;
            }
            acc.flows += 1;
        }
        *acc.co2e_by_activity.entry(line.item.activity).or_insert(0.0) += item_co2e;

        let water = quantity * factor.water_liters_per_unit;
        acc.water_total += water;
        acc.water_agricultural += water * factor.agricultural_water_fraction;
        acc.water_processing += water * (1.0 - factor.agricultural_water_fraction);

        let waste = quantity * factor.waste_kg_per_unit;
        acc.waste_total += waste;
        acc.waste_recyclable += waste * factor.recyclable_fraction;
        acc.waste_hazardous += waste * factor.hazardous_fraction;

        acc.flows += 2;
    }

    fn finish(&self, acc: Accumulator, bom: &BillOfMaterials, options: CalculationOptions) -> LcaResults {
        let ghg_breakdown: Vec<GhgEntry> = acc
            .gas_mass_kg
            .iter()
            .filter_map(|(formula, mass)| {
                self.tables
                    .gwp(formula)
                    .map(|gwp| GhgEntry::new(&gwp.gas_name, formula, *mass, gwp.gwp_100yr_ar5))
            })
            .collect();
        let total_co2e: f64 = ghg_breakdown.iter().map(|e| e.co2e).sum();

        let (water_footprint, water_clamped) = balance_water(
            acc.water_total,
            acc.water_agricultural,
            acc.water_processing,
        );
        let (waste_output, waste_clamped) =
            balance_waste(acc.waste_total, acc.waste_recyclable, acc.waste_hazardous);

        let mut impacts_by_category = vec![
            CategoryImpact::new(CLIMATE_CHANGE, total_co2e, "kg CO2e"),
            CategoryImpact::new(WATER_USE, water_footprint.total_liters, "L"),
            CategoryImpact::new(WASTE_GENERATION, waste_output.total_kg, "kg"),
        ];
        if options.iso_compliant {
            for activity in bom.activities() {
                let impact = acc.co2e_by_activity.get(&activity).copied().unwrap_or(0.0);
                impacts_by_category.push(CategoryImpact::new(
                    format!("{CLIMATE_CHANGE} - {activity}"),
                    impact,
                    "kg CO2e",
                ));
            }
        }

        LcaResults {
            total_co2e,
            total_carbon_footprint: total_co2e,
            metadata: ResultsMetadata {
                iso_compliant: options.iso_compliant,
                lci_flows_count: acc.flows,
                gwp_factors_used: ghg_breakdown.len(),
                mass_balance_adjusted: water_clamped || waste_clamped,
                methodology: METHODOLOGY.to_string(),
                calculated_at: Utc::now(),
            },
            ghg_breakdown,
            water_footprint,
            waste_output,
            impacts_by_category,
        }
    }
}

impl Calculator for CalculationEngine {
    fn calculate(
        &self,
        product_id: ProductId,
        bom: &BillOfMaterials,
        options: CalculationOptions,
        checkpoint: &dyn Checkpoint,
    ) -> Result<LcaResults, CalculationError> {
        CalculationEngine::calculate(self, product_id, bom, options, checkpoint)
    }
}

fn check_bom(product_id: ProductId, bom: &BillOfMaterials) -> Result<(), CalculationError> {
    if bom.product_id != product_id {
        return Err(CalculationError::input(format!(
            "bill of materials belongs to product {}, not {product_id}",
            bom.product_id
        )));
    }
    if bom.is_empty() {
        return Err(CalculationError::input(format!(
            "product {product_id} has an empty bill of materials"
        )));
    }
    if let Some(item) = bom
        .items
        .iter()
        .find(|i| !i.quantity.is_finite() || i.quantity < 0.0)
    {
        return Err(CalculationError::input(format!(
            "invalid quantity {} for {}",
            item.quantity, item.material
        )));
    }
    Ok(())
}

/// Clamp water subtotals so they never exceed the total
fn balance_water(total: f64, agricultural: f64, processing: f64) -> (WaterFootprint, bool) {
    let mut fp = WaterFootprint {
        total_liters: total,
        agricultural_water: agricultural,
        processing_water: processing,
    };
    if agricultural + processing <= total {
        return (fp, false);
    }
    fp.agricultural_water = agricultural.min(total);
    fp.processing_water = (total - fp.agricultural_water).max(0.0);
    (fp, true)
}

/// Clamp waste subtotals so they never exceed the total. The hazardous
/// share is kept as computed; recyclable absorbs the excess.
fn balance_waste(total: f64, recyclable: f64, hazardous: f64) -> (WasteOutput, bool) {
    let mut out = WasteOutput {
        total_kg: total,
        recyclable_kg: recyclable,
        hazardous_kg: hazardous,
    };
    if recyclable + hazardous <= total {
        return (out, false);
    }
    out.hazardous_kg = hazardous.min(total);
    out.recyclable_kg = (total - out.hazardous_kg).max(0.0);
    (out, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::NoCheckpoint;
    use lca_model::{GwpFactor, IntensityFactor};
    use pretty_assertions::assert_eq;

    fn tables() -> Arc<ReferenceTables> {
        Arc::new(
            ReferenceTables::from_factors(
                vec![
                    GwpFactor::new("CO2", 1.0, "Carbon dioxide"),
                    GwpFactor::new("CH4", 27.9, "Methane"),
                ],
                vec![
                    IntensityFactor::new("flour", "kg")
                        .with_emission("CO2", 1.0)
                        .with_emission("CH4", 0.004)
                        .with_water(100.0, 0.9)
                        .with_waste(0.1, 0.5, 0.0),
                    IntensityFactor::new("truck", "tkm").with_emission("CO2", 0.1),
                    IntensityFactor::new("mystery", "kg").with_emission("HFC-23", 1.0),
                    IntensityFactor::new("overlap", "kg").with_waste(1.0, 0.8, 0.5),
                ],
            )
            .unwrap(),
        )
    }

    fn bom(items: Vec<BomItem>) -> BillOfMaterials {
        BillOfMaterials {
            product_id: ProductId(1),
            items,
        }
    }

    #[test]
    fn accumulates_gases_in_first_seen_order() {
        let engine = CalculationEngine::new(tables());
        let bom = bom(vec![
            BomItem::new(ActivityKind::IngredientSourcing, "flour", 0.5, "kg"),
            BomItem::new(ActivityKind::Transport, "truck", 4.0, "tkm"),
        ]);

        let results = engine
            .calculate(ProductId(1), &bom, CalculationOptions::default(), &NoCheckpoint)
            .unwrap();

        let gases: Vec<_> = results.ghg_breakdown.iter().map(|e| e.gas_formula.as_str()).collect();
        assert_eq!(gases, vec!["CO2", "CH4"]);
        assert!((results.gas("CO2").unwrap().mass_kg - 0.9).abs() < 1e-12);
        assert!((results.gas("CH4").unwrap().mass_kg - 0.002).abs() < 1e-12);
        assert!((results.total_co2e - 0.9558).abs() < 1e-9);
        assert_eq!(results.total_co2e, results.total_carbon_footprint);
        assert_eq!(results.metadata.gwp_factors_used, 2);
        // 3 gas lines + 2 water/waste flows per item
        assert_eq!(results.metadata.lci_flows_count, 3 + 4);
    }

    #[test]
    fn water_and_waste_subtotals() {
        let engine = CalculationEngine::new(tables());
        let bom = bom(vec![BomItem::new(ActivityKind::IngredientSourcing, "flour", 2.0, "kg")]);

        let results = engine
            .calculate(ProductId(1), &bom, CalculationOptions::default(), &NoCheckpoint)
            .unwrap();

        let water = results.water_footprint;
        assert!((water.total_liters - 200.0).abs() < 1e-9);
        assert!((water.agricultural_water - 180.0).abs() < 1e-9);
        assert!(water.agricultural_water + water.processing_water <= water.total_liters + 1e-9);

        let waste = results.waste_output;
        assert!((waste.total_kg - 0.2).abs() < 1e-12);
        assert!((waste.recyclable_kg - 0.1).abs() < 1e-12);
        assert_eq!(waste.hazardous_kg, 0.0);
    }

    #[test]
    fn overlapping_waste_shares_are_clamped_and_flagged() {
        let engine = CalculationEngine::new(tables());
        let bom = bom(vec![BomItem::new(ActivityKind::Disposal, "overlap", 10.0, "kg")]);

        let results = engine
            .calculate(ProductId(1), &bom, CalculationOptions::default(), &NoCheckpoint)
            .unwrap();

        let waste = results.waste_output;
        assert_eq!(waste.total_kg, 10.0);
        assert_eq!(waste.hazardous_kg, 5.0);
        assert_eq!(waste.recyclable_kg, 5.0);
        assert!(results.metadata.mass_balance_adjusted);
    }

    #[test]
    fn iso_mode_adds_per_activity_impacts() {
        let engine = CalculationEngine::new(tables());
        let bom = bom(vec![
            BomItem::new(ActivityKind::Transport, "truck", 10.0, "tkm"),
            BomItem::new(ActivityKind::IngredientSourcing, "flour", 1.0, "kg"),
        ]);

        let plain = engine
            .calculate(ProductId(1), &bom, CalculationOptions::default(), &NoCheckpoint)
            .unwrap();
        assert_eq!(plain.impacts_by_category.len(), 3);
        assert!(!plain.metadata.iso_compliant);

        let iso = engine
            .calculate(ProductId(1), &bom, CalculationOptions::iso(), &NoCheckpoint)
            .unwrap();
        assert!(iso.metadata.iso_compliant);
        let labels: Vec<_> = iso.impacts_by_category.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                CLIMATE_CHANGE,
                WATER_USE,
                WASTE_GENERATION,
                "Climate change - ingredient sourcing",
                "Climate change - transport",
            ]
        );
        let transport = iso.impact("Climate change - transport").unwrap();
        assert!((transport.impact - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_bom_is_input_error() {
        let engine = CalculationEngine::new(tables());
        let err = engine
            .calculate(ProductId(1), &bom(vec![]), CalculationOptions::default(), &NoCheckpoint)
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn negative_quantity_is_input_error() {
        let engine = CalculationEngine::new(tables());
        let bom = bom(vec![BomItem::new(ActivityKind::Transport, "truck", -1.0, "tkm")]);
        let err = engine
            .calculate(ProductId(1), &bom, CalculationOptions::default(), &NoCheckpoint)
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn unit_mismatch_is_input_error() {
        let engine = CalculationEngine::new(tables());
        let bom = bom(vec![BomItem::new(ActivityKind::Transport, "truck", 1.0, "km")]);
        let err = engine
            .calculate(ProductId(1), &bom, CalculationOptions::default(), &NoCheckpoint)
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn foreign_bom_is_input_error() {
        let engine = CalculationEngine::new(tables());
        let bom = bom(vec![BomItem::new(ActivityKind::Transport, "truck", 1.0, "tkm")]);
        let err = engine
            .calculate(ProductId(2), &bom, CalculationOptions::default(), &NoCheckpoint)
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn missing_material_names_it() {
        let engine = CalculationEngine::new(tables());
        let bom = bom(vec![BomItem::new(ActivityKind::IngredientSourcing, "cocoa", 1.0, "kg")]);
        let err = engine
            .calculate(ProductId(1), &bom, CalculationOptions::default(), &NoCheckpoint)
            .unwrap_err();
        assert_eq!(err, CalculationError::missing(FactorKind::Intensity, "cocoa"));
    }

    #[test]
    fn missing_gas_fails_before_any_checkpoint() {
        let engine = CalculationEngine::new(tables());
        let bom = bom(vec![
            BomItem::new(ActivityKind::IngredientSourcing, "flour", 1.0, "kg"),
            BomItem::new(ActivityKind::PackagingProduction, "mystery", 1.0, "kg"),
        ]);

        let calls = std::sync::atomic::AtomicUsize::new(0);
        let counting = |_: usize, _: usize| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok::<(), CalculationError>(())
        };

        let err = engine
            .calculate(ProductId(1), &bom, CalculationOptions::default(), &counting)
            .unwrap_err();
        assert_eq!(err, CalculationError::missing(FactorKind::Gwp, "HFC-23"));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn checkpoint_can_cancel_mid_calculation() {
        let engine = CalculationEngine::new(tables());
        let bom = bom(vec![
            BomItem::new(ActivityKind::IngredientSourcing, "flour", 1.0, "kg"),
            BomItem::new(ActivityKind::Transport, "truck", 1.0, "tkm"),
        ]);
        let cancel_after_first = |done: usize, _: usize| {
            if done >= 1 {
                Err(CalculationError::Cancelled)
            } else {
                Ok(())
            }
        };

        let err = engine
            .calculate(ProductId(1), &bom, CalculationOptions::default(), &cancel_after_first)
            .unwrap_err();
        assert_eq!(err, CalculationError::Cancelled);
    }
}
