//! LCA Engine - bill of materials to environmental footprints
//!
//! The engine is synchronous and CPU-bound: callers fetch the BOM first,
//! then run [`CalculationEngine::calculate`] on a blocking worker. Progress
//! and cancellation flow through the [`Checkpoint`] trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use lca_engine::{CalculationEngine, NoCheckpoint};
//! use lca_model::CalculationOptions;
//!
//! let engine = CalculationEngine::with_default_tables();
//! let results = engine.calculate(bom.product_id, &bom, CalculationOptions::iso(), &NoCheckpoint)?;
//! println!("{} kg CO2e", results.total_co2e);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod checkpoint;
pub mod engine;
pub mod error;

pub use checkpoint::{percent, Checkpoint, NoCheckpoint};
pub use engine::{CalculationEngine, Calculator, CLIMATE_CHANGE, WASTE_GENERATION, WATER_USE};
pub use error::{CalculationError, FactorKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
