//! LCA Model - shared data types for life cycle assessment
//!
//! Defines the vocabulary every other crate in the workspace speaks:
//! - Product and job identifiers
//! - Bills of materials (BOM)
//! - GWP and intensity reference tables
//! - Calculation results (`LcaResults`)
//! - The product persistence seam (`ProductRepository`)
//!
//! # Example
//!
//! ```rust,ignore
//! use lca_model::{ActivityKind, BillOfMaterials, BomItem, ProductId, ReferenceTables};
//!
//! let tables = ReferenceTables::shared_defaults();
//! let bom = BillOfMaterials::new(ProductId(12))
//!     .with_item(BomItem::new(ActivityKind::IngredientSourcing, "wheat_flour", 0.5, "kg"));
//! assert!(tables.intensity("wheat_flour").is_some());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod bom;
pub mod error;
pub mod reference;
pub mod repository;
pub mod results;
pub mod types;

pub use bom::{ActivityKind, BillOfMaterials, BomItem};
pub use error::{ReferenceDataError, RepositoryError};
pub use reference::{GasEmission, GwpFactor, IntensityFactor, ReferenceTables};
pub use repository::{
    FootprintMetric, FootprintUpdate, InMemoryProductRepository, ProductFootprint,
    ProductRepository,
};
pub use results::{
    round_for_display, CategoryImpact, GhgEntry, LcaResults, ResultsMetadata, WasteOutput,
    WaterFootprint, METHODOLOGY,
};
pub use types::{CalculationOptions, JobId, ProductId};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
