//! Product persistence seam
//!
//! The calculation core reads a product's BOM and prior footprint values and
//! writes validated footprints back. Everything else about products lives
//! outside this workspace.

use crate::bom::BillOfMaterials;
use crate::error::RepositoryError;
use crate::results::LcaResults;
use crate::types::ProductId;
use bigdecimal::BigDecimal;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Footprint field synchronized from calculation results
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FootprintMetric {
    #[serde(rename = "carbonFootprint")]
    Carbon,
    #[serde(rename = "waterFootprint")]
    Water,
    #[serde(rename = "wasteFootprint")]
    Waste,
}

impl FootprintMetric {
    /// All synced metrics
    pub const ALL: [FootprintMetric; 3] = [
        FootprintMetric::Carbon,
        FootprintMetric::Water,
        FootprintMetric::Waste,
    ];

    /// Product field name
    #[inline]
    #[must_use]
    pub fn field_name(&self) -> &'static str {
        match self {
            FootprintMetric::Carbon => "carbonFootprint",
            FootprintMetric::Water => "waterFootprint",
            FootprintMetric::Waste => "wasteFootprint",
        }
    }

    /// Value of this metric in a set of results
    #[inline]
    #[must_use]
    pub fn value_in(&self, results: &LcaResults) -> f64 {
        match self {
            FootprintMetric::Carbon => results.total_co2e,
            FootprintMetric::Water => results.water_footprint.total_liters,
            FootprintMetric::Waste => results.waste_output.total_kg,
        }
    }
}

impl std::fmt::Display for FootprintMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Stored footprint values of a product
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFootprint {
    pub carbon_footprint: Option<BigDecimal>,
    pub water_footprint: Option<BigDecimal>,
    pub waste_footprint: Option<BigDecimal>,
}

impl ProductFootprint {
    /// Value of one metric
    #[inline]
    #[must_use]
    pub fn get(&self, metric: FootprintMetric) -> Option<&BigDecimal> {
        match metric {
            FootprintMetric::Carbon => self.carbon_footprint.as_ref(),
            FootprintMetric::Water => self.water_footprint.as_ref(),
            FootprintMetric::Waste => self.waste_footprint.as_ref(),
        }
    }

    fn slot(&mut self, metric: FootprintMetric) -> &mut Option<BigDecimal> {
        match metric {
            FootprintMetric::Carbon => &mut self.carbon_footprint,
            FootprintMetric::Water => &mut self.water_footprint,
            FootprintMetric::Waste => &mut self.waste_footprint,
        }
    }

    /// Overwrite the fields present in `update`, leave the rest untouched
    pub fn apply(&mut self, update: &FootprintUpdate) {
        for (metric, value) in update.iter() {
            *self.slot(metric) = Some(value.clone());
        }
    }
}

/// Set of footprint fields to write in one atomic update
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FootprintUpdate {
    values: Vec<(FootprintMetric, BigDecimal)>,
}

impl FootprintUpdate {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing an earlier value for the same metric
    pub fn set(&mut self, metric: FootprintMetric, value: BigDecimal) {
        self.values.retain(|(m, _)| *m != metric);
        self.values.push((metric, value));
    }

    /// Builder form of [`FootprintUpdate::set`]
    #[inline]
    #[must_use]
    pub fn with(mut self, metric: FootprintMetric, value: BigDecimal) -> Self {
        self.set(metric, value);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Metrics carried by this update
    #[must_use]
    pub fn metrics(&self) -> Vec<FootprintMetric> {
        self.values.iter().map(|(m, _)| *m).collect()
    }

    /// Iterate metric / value pairs
    pub fn iter(&self) -> impl Iterator<Item = (FootprintMetric, &BigDecimal)> {
        self.values.iter().map(|(m, v)| (*m, v))
    }
}

/// Product store used by the calculation core
#[async_trait::async_trait]
pub trait ProductRepository: Send + Sync {
    /// Bill of materials of a product
    async fn load_bom(&self, product_id: ProductId) -> Result<BillOfMaterials, RepositoryError>;

    /// Current footprint values of a product
    async fn footprint(&self, product_id: ProductId) -> Result<ProductFootprint, RepositoryError>;

    /// Write all fields of `update` in a single atomic operation
    async fn update_footprint(
        &self,
        product_id: ProductId,
        update: FootprintUpdate,
    ) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, Default)]
struct ProductRecord {
    bom: Option<BillOfMaterials>,
    footprint: ProductFootprint,
    writes: usize,
}

/// In-memory product store
///
/// Each product record sits in one DashMap shard; `update_footprint` applies
/// every field while holding that shard's write guard, so readers never see
/// a partially updated footprint.
#[derive(Debug, Default)]
pub struct InMemoryProductRepository {
    products: DashMap<ProductId, ProductRecord>,
}

impl InMemoryProductRepository {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product
    pub fn insert_product(
        &self,
        product_id: ProductId,
        bom: Option<BillOfMaterials>,
        footprint: ProductFootprint,
    ) {
        self.products.insert(
            product_id,
            ProductRecord {
                bom,
                footprint,
                writes: 0,
            },
        );
    }

    /// Builder form of [`InMemoryProductRepository::insert_product`]
    #[must_use]
    pub fn with_product(self, bom: BillOfMaterials, footprint: ProductFootprint) -> Self {
        self.insert_product(bom.product_id, Some(bom), footprint);
        self
    }

    /// Snapshot of a product's footprint
    #[must_use]
    pub fn footprint_snapshot(&self, product_id: ProductId) -> Option<ProductFootprint> {
        self.products.get(&product_id).map(|r| r.footprint.clone())
    }

    /// Number of footprint writes applied to a product
    #[must_use]
    pub fn write_count(&self, product_id: ProductId) -> usize {
        self.products.get(&product_id).map_or(0, |r| r.writes)
    }
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn load_bom(&self, product_id: ProductId) -> Result<BillOfMaterials, RepositoryError> {
        let record = self
            .products
            .get(&product_id)
            .ok_or(RepositoryError::ProductNotFound(product_id))?;
        record
            .bom
            .clone()
            .ok_or(RepositoryError::MissingBom(product_id))
    }

    async fn footprint(&self, product_id: ProductId) -> Result<ProductFootprint, RepositoryError> {
        self.footprint_snapshot(product_id)
            .ok_or(RepositoryError::ProductNotFound(product_id))
    }

    async fn update_footprint(
        &self,
        product_id: ProductId,
        update: FootprintUpdate,
    ) -> Result<(), RepositoryError> {
        let mut record = self
            .products
            .get_mut(&product_id)
            .ok_or(RepositoryError::ProductNotFound(product_id))?;
        record.footprint.apply(&update);
        record.writes += 1;
        Ok(())
    }
}
