//! Engine arithmetic invariants over generated bills of materials

use lca_engine::{CalculationEngine, CalculationError, NoCheckpoint};
use lca_model::{ActivityKind, BillOfMaterials, BomItem, CalculationOptions, ProductId};
use lca_test_utils::{reference_bom, test_tables, unknown_material_bom};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-9;

fn any_item() -> impl Strategy<Value = BomItem> {
    let material = prop_oneof![
        Just((ActivityKind::IngredientSourcing, "flour", "kg")),
        Just((ActivityKind::Transport, "truck", "tkm")),
        Just((ActivityKind::PackagingProduction, "bottle", "kg")),
    ];
    (material, 0.0f64..1_000.0)
        .prop_map(|((activity, key, unit), qty)| BomItem::new(activity, key, qty, unit))
}

fn any_bom() -> impl Strategy<Value = BillOfMaterials> {
    proptest::collection::vec(any_item(), 1..12).prop_map(|items| {
        items
            .into_iter()
            .fold(BillOfMaterials::new(ProductId(1)), BillOfMaterials::with_item)
    })
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

proptest! {
    #[test]
    fn prop_co2e_is_mass_times_gwp(bom in any_bom(), iso in any::<bool>()) {
        let engine = CalculationEngine::new(test_tables());
        let results = engine
            .calculate(ProductId(1), &bom, CalculationOptions { iso_compliant: iso }, &NoCheckpoint)
            .unwrap();

        for entry in &results.ghg_breakdown {
            prop_assert!(close(entry.co2e, entry.mass_kg * entry.gwp_factor));
        }
        let sum: f64 = results.ghg_breakdown.iter().map(|e| e.co2e).sum();
        prop_assert!(close(results.total_co2e, sum));
        prop_assert_eq!(results.total_co2e, results.total_carbon_footprint);
        prop_assert_eq!(results.metadata.gwp_factors_used, results.ghg_breakdown.len());
    }

    #[test]
    fn prop_subtotals_never_exceed_totals(bom in any_bom()) {
        let engine = CalculationEngine::new(test_tables());
        let results = engine
            .calculate(ProductId(1), &bom, CalculationOptions::default(), &NoCheckpoint)
            .unwrap();

        // Clamped subtotals may differ from the total by float rounding only
        let water = results.water_footprint;
        let water_parts = water.agricultural_water + water.processing_water;
        prop_assert!(water_parts <= water.total_liters || close(water_parts, water.total_liters));
        let waste = results.waste_output;
        let waste_parts = waste.recyclable_kg + waste.hazardous_kg;
        prop_assert!(waste_parts <= waste.total_kg || close(waste_parts, waste.total_kg));
        prop_assert!(water.total_liters >= 0.0);
        prop_assert!(waste.total_kg >= 0.0);
    }

    #[test]
    fn prop_checkpoints_are_monotonic(bom in any_bom()) {
        let engine = CalculationEngine::new(test_tables());
        let seen = std::sync::Mutex::new(Vec::new());
        let record = |done: usize, total: usize| {
            seen.lock().unwrap().push((done, total));
            Ok::<(), CalculationError>(())
        };
        engine
            .calculate(ProductId(1), &bom, CalculationOptions::default(), &record)
            .unwrap();

        let seen = seen.into_inner().unwrap();
        prop_assert_eq!(seen.len(), bom.len() + 1);
        prop_assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
        prop_assert_eq!(seen.last().copied(), Some((bom.len(), bom.len())));
    }
}

#[test]
fn test_reference_breakdown() {
    let engine = CalculationEngine::new(test_tables());
    let results = engine
        .calculate(
            ProductId(12),
            &reference_bom(ProductId(12)),
            CalculationOptions::default(),
            &NoCheckpoint,
        )
        .unwrap();

    let gases: Vec<_> = results
        .ghg_breakdown
        .iter()
        .map(|e| e.gas_formula.as_str())
        .collect();
    assert_eq!(gases, vec!["CO2", "CH4"]);

    let co2 = results.gas("CO2").unwrap();
    assert!(close(co2.mass_kg, 0.9));
    assert!(close(co2.co2e, 0.9));

    let ch4 = results.gas("CH4").unwrap();
    assert!(close(ch4.mass_kg, 0.002));
    assert!(close(ch4.gwp_factor, 27.9));
    assert!(close(ch4.co2e, 0.0558));

    assert!(close(results.total_co2e, 0.9558));
}

#[test]
fn test_unknown_material_fails_before_any_checkpoint() {
    let engine = CalculationEngine::new(test_tables());
    let calls = std::sync::atomic::AtomicUsize::new(0);
    let count = |_: usize, _: usize| {
        calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok::<(), CalculationError>(())
    };

    let err = engine
        .calculate(
            ProductId(4),
            &unknown_material_bom(ProductId(4)),
            CalculationOptions::default(),
            &count,
        )
        .unwrap_err();
    assert!(err.is_missing_factor());
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}
