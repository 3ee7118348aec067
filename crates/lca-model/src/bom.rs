//! Bill of materials
//!
//! A BOM is an ordered list of activities, each naming a material key in
//! the intensity table and the physical quantity consumed.

use crate::types::ProductId;
use serde::{Deserialize, Serialize};

/// Emission-relevant life cycle activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    /// Growing / extracting raw ingredients
    IngredientSourcing,
    /// Manufacturing of packaging
    PackagingProduction,
    /// Moving goods between sites
    Transport,
    /// End-of-life treatment
    Disposal,
}

impl ActivityKind {
    /// All activities in life cycle order
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::IngredientSourcing,
        ActivityKind::PackagingProduction,
        ActivityKind::Transport,
        ActivityKind::Disposal,
    ];

    /// Human-readable label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::IngredientSourcing => "ingredient sourcing",
            ActivityKind::PackagingProduction => "packaging production",
            ActivityKind::Transport => "transport",
            ActivityKind::Disposal => "disposal",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One BOM line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomItem {
    pub activity: ActivityKind,
    /// Key into the intensity table
    pub material: String,
    /// Physical quantity, expressed in `unit`
    pub quantity: f64,
    pub unit: String,
}

impl BomItem {
    /// Create new BOM item
    #[inline]
    #[must_use]
    pub fn new(
        activity: ActivityKind,
        material: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            activity,
            material: material.into(),
            quantity,
            unit: unit.into(),
        }
    }
}

/// Product bill of materials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillOfMaterials {
    pub product_id: ProductId,
    #[serde(default)]
    pub items: Vec<BomItem>,
}

impl BillOfMaterials {
    /// Create empty BOM for a product
    #[inline]
    #[must_use]
    pub fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            items: Vec::new(),
        }
    }

    /// Append an item
    #[inline]
    #[must_use]
    pub fn with_item(mut self, item: BomItem) -> Self {
        self.items.push(item);
        self
    }

    /// Number of lines
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the BOM has no lines
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Activities present, in life cycle order, without duplicates
    #[must_use]
    pub fn activities(&self) -> Vec<ActivityKind> {
        ActivityKind::ALL
            .into_iter()
            .filter(|a| self.items.iter().any(|i| i.activity == *a))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_builder() {
        let bom = BillOfMaterials::new(ProductId(1))
            .with_item(BomItem::new(ActivityKind::Transport, "road_freight", 10.0, "tkm"))
            .with_item(BomItem::new(
                ActivityKind::IngredientSourcing,
                "wheat_flour",
                0.5,
                "kg",
            ));

        assert_eq!(bom.len(), 2);
        assert_eq!(
            bom.activities(),
            vec![ActivityKind::IngredientSourcing, ActivityKind::Transport]
        );
    }

    #[test]
    fn bom_parses_camel_case_json() {
        let json = r#"{
            "productId": 12,
            "items": [
                {"activity": "packagingProduction", "material": "pet_bottle", "quantity": 0.03, "unit": "kg"}
            ]
        }"#;
        let bom: BillOfMaterials = serde_json::from_str(json).unwrap();
        assert_eq!(bom.product_id, ProductId(12));
        assert_eq!(bom.items[0].activity, ActivityKind::PackagingProduction);
    }
}
