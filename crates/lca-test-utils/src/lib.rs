//! Testing utilities for the LCA workspace
//!
//! Shared fixtures: reference tables, BOMs, seeded product stores, and
//! test doubles for the repository and calculator seams.

#![allow(missing_docs)]

use bigdecimal::BigDecimal;
use dashmap::DashSet;
use lca_engine::{CalculationEngine, CalculationError, Calculator, Checkpoint};
use lca_model::{
    ActivityKind, BillOfMaterials, BomItem, CalculationOptions, FootprintUpdate, GwpFactor,
    InMemoryProductRepository, IntensityFactor, LcaResults, ProductFootprint, ProductId,
    ProductRepository, ReferenceTables, RepositoryError,
};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Small table set: CO2 (1), CH4 (27.9), and three materials
///
/// - `flour` (kg): 1.0 kg CO2 + 0.004 kg CH4, 100 L water (90 % agricultural),
///   0.1 kg waste (50 % recyclable)
/// - `truck` (tkm): 0.1 kg CO2
/// - `bottle` (kg): 2.0 kg CO2, 10 L processing water, 1.0 kg waste
pub fn test_tables() -> Arc<ReferenceTables> {
    let tables = ReferenceTables::from_factors(
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
            IntensityFactor::new("bottle", "kg")
                .with_emission("CO2", 2.0)
                .with_water(10.0, 0.0)
                .with_waste(1.0, 0.9, 0.0),
        ],
    );
    match tables {
        Ok(tables) => Arc::new(tables),
        Err(e) => panic!("test tables are invalid: {e}"),
    }
}

/// BOM implying 0.9 kg CO2 and 0.002 kg CH4 (0.9558 kg CO2e), 50 L water,
/// 0.05 kg waste
pub fn reference_bom(product_id: ProductId) -> BillOfMaterials {
    BillOfMaterials::new(product_id)
        .with_item(BomItem::new(ActivityKind::IngredientSourcing, "flour", 0.5, "kg"))
        .with_item(BomItem::new(ActivityKind::Transport, "truck", 4.0, "tkm"))
}

/// BOM that needs a material absent from [`test_tables`]
pub fn unknown_material_bom(product_id: ProductId) -> BillOfMaterials {
    BillOfMaterials::new(product_id)
        .with_item(BomItem::new(ActivityKind::IngredientSourcing, "cocoa", 1.0, "kg"))
}

/// Decimal from its string form
pub fn decimal(value: &str) -> BigDecimal {
    match BigDecimal::from_str(value) {
        Ok(d) => d,
        Err(e) => panic!("bad decimal literal {value}: {e}"),
    }
}

/// Footprint from optional string values
pub fn footprint(carbon: Option<&str>, water: Option<&str>, waste: Option<&str>) -> ProductFootprint {
    ProductFootprint {
        carbon_footprint: carbon.map(decimal),
        water_footprint: water.map(decimal),
        waste_footprint: waste.map(decimal),
    }
}

/// Store holding `product_id` with the reference BOM and the given footprint
pub fn seeded_repository(product_id: ProductId, fp: ProductFootprint) -> Arc<InMemoryProductRepository> {
    Arc::new(InMemoryProductRepository::new().with_product(reference_bom(product_id), fp))
}

/// Results with the given metric totals and nothing else
pub fn results_with(carbon: f64, water: f64, waste: f64) -> LcaResults {
    let engine = CalculationEngine::new(test_tables());
    let product = ProductId(0);
    let mut results = match engine.calculate(
        product,
        &reference_bom(product),
        CalculationOptions::default(),
        &lca_engine::NoCheckpoint,
    ) {
        Ok(r) => r,
        Err(e) => panic!("reference calculation failed: {e}"),
    };
    results.total_co2e = carbon;
    results.total_carbon_footprint = carbon;
    results.water_footprint.total_liters = water;
    results.water_footprint.agricultural_water = 0.0;
    results.water_footprint.processing_water = water;
    results.waste_output.total_kg = waste;
    results.waste_output.recyclable_kg = 0.0;
    results.waste_output.hazardous_kg = 0.0;
    results
}

/// Product store that fails writes (or reads) for selected products
#[derive(Debug, Default)]
pub struct FlakyRepository {
    inner: InMemoryProductRepository,
    failing_writes: DashSet<ProductId>,
    failing_reads: DashSet<ProductId>,
}

impl FlakyRepository {
    pub fn new(inner: InMemoryProductRepository) -> Self {
        Self {
            inner,
            failing_writes: DashSet::new(),
            failing_reads: DashSet::new(),
        }
    }

    pub fn fail_writes_for(&self, product_id: ProductId) {
        self.failing_writes.insert(product_id);
    }

    pub fn fail_reads_for(&self, product_id: ProductId) {
        self.failing_reads.insert(product_id);
    }

    pub fn inner(&self) -> &InMemoryProductRepository {
        &self.inner
    }
}

#[async_trait::async_trait]
impl ProductRepository for FlakyRepository {
    async fn load_bom(&self, product_id: ProductId) -> Result<BillOfMaterials, RepositoryError> {
        if self.failing_reads.contains(&product_id) {
            return Err(RepositoryError::Storage("injected read failure".into()));
        }
        self.inner.load_bom(product_id).await
    }

    async fn footprint(&self, product_id: ProductId) -> Result<ProductFootprint, RepositoryError> {
        if self.failing_reads.contains(&product_id) {
            return Err(RepositoryError::Storage("injected read failure".into()));
        }
        self.inner.footprint(product_id).await
    }

    async fn update_footprint(
        &self,
        product_id: ProductId,
        update: FootprintUpdate,
    ) -> Result<(), RepositoryError> {
        if self.failing_writes.contains(&product_id) {
            return Err(RepositoryError::Storage("injected write failure".into()));
        }
        self.inner.update_footprint(product_id, update).await
    }
}

/// Calculator that holds every calculation at its first checkpoint until
/// [`GatedCalculator::open`] is called
///
/// While held it keeps hitting the checkpoint, so cancellation and
/// deadlines are still observed.
#[derive(Debug)]
pub struct GatedCalculator {
    inner: CalculationEngine,
    open: AtomicBool,
    entered: AtomicUsize,
    poll: Duration,
}

impl GatedCalculator {
    pub fn new(inner: CalculationEngine) -> Self {
        Self {
            inner,
            open: AtomicBool::new(false),
            entered: AtomicUsize::new(0),
            poll: Duration::from_millis(5),
        }
    }

    /// Let held and future calculations proceed
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    /// Number of calculations that have started
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

impl Calculator for GatedCalculator {
    fn calculate(
        &self,
        product_id: ProductId,
        bom: &BillOfMaterials,
        options: CalculationOptions,
        checkpoint: &dyn Checkpoint,
    ) -> Result<LcaResults, CalculationError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let total = bom.len().max(1);
        let mut step = 0;
        while !self.open.load(Ordering::SeqCst) {
            // Creep forward without ever reaching the end
            step = (step + 1).min(total - 1);
            checkpoint.reached(step, total)?;
            std::thread::sleep(self.poll);
        }
        self.inner.calculate(product_id, bom, options, checkpoint)
    }
}
