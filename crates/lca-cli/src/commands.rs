//! Subcommand implementations

use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use clap::ArgMatches;
use lca_jobs::{CalculationJob, CalculationService, JobStatus, LcaConfig};
use lca_model::{
    round_for_display, BillOfMaterials, CalculationOptions, InMemoryProductRepository,
    ProductFootprint, ReferenceTables,
};
use lca_sync::SyncResult;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const SYNC_GRACE: Duration = Duration::from_secs(5);

/// Inputs of `lca calculate`
#[derive(Debug, Clone, Default)]
pub(crate) struct CalculateArgs {
    pub(crate) bom: PathBuf,
    pub(crate) factors: Option<PathBuf>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) iso: bool,
    pub(crate) previous: ProductFootprint,
    pub(crate) no_sync: bool,
}

impl CalculateArgs {
    pub(crate) fn from_matches(args: &ArgMatches) -> Result<Self> {
        let bom = args
            .get_one::<PathBuf>("bom")
            .cloned()
            .context("--bom is required")?;
        Ok(Self {
            bom,
            factors: args.get_one::<PathBuf>("factors").cloned(),
            config: args.get_one::<PathBuf>("config").cloned(),
            iso: args.get_flag("iso"),
            previous: ProductFootprint {
                carbon_footprint: decimal_arg(args, "previous-carbon")?,
                water_footprint: decimal_arg(args, "previous-water")?,
                waste_footprint: decimal_arg(args, "previous-waste")?,
            },
            no_sync: args.get_flag("no-sync"),
        })
    }
}

fn decimal_arg(args: &ArgMatches, name: &str) -> Result<Option<BigDecimal>> {
    args.get_one::<String>(name)
        .map(|raw| {
            BigDecimal::from_str(raw).with_context(|| format!("--{name}: not a decimal: {raw}"))
        })
        .transpose()
}

/// What `lca calculate` prints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CalculateReport {
    pub(crate) job: CalculationJob,
    pub(crate) summary: Option<Summary>,
    pub(crate) sync: Option<SyncResult>,
    pub(crate) footprint: Option<ProductFootprint>,
}

/// Display-rounded headline figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Summary {
    #[serde(rename = "totalCO2e")]
    pub(crate) total_co2e: f64,
    pub(crate) water_liters: f64,
    pub(crate) waste_kg: f64,
}

impl CalculateReport {
    pub(crate) fn succeeded(&self) -> bool {
        self.job.status == JobStatus::Completed
    }
}

/// Run one calculation job against an in-memory product store
pub(crate) async fn calculate(args: CalculateArgs) -> Result<CalculateReport> {
    let tables = match &args.factors {
        Some(path) => Arc::new(
            ReferenceTables::load(path)
                .with_context(|| format!("loading reference tables from {}", path.display()))?,
        ),
        None => ReferenceTables::shared_defaults(),
    };

    let mut config = match &args.config {
        Some(path) => LcaConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => LcaConfig::default(),
    };
    if args.no_sync {
        config.sync.enabled = false;
    }

    let text = std::fs::read_to_string(&args.bom)
        .with_context(|| format!("reading {}", args.bom.display()))?;
    let bom: BillOfMaterials = serde_json::from_str(&text)
        .with_context(|| format!("parsing bill of materials {}", args.bom.display()))?;
    let product_id = bom.product_id;

    let repository = Arc::new(InMemoryProductRepository::new());
    repository.insert_product(product_id, Some(bom), args.previous.clone());

    let service = CalculationService::new(repository.clone(), tables, config)?;
    let options = if args.iso {
        CalculationOptions::iso()
    } else {
        CalculationOptions::default()
    };
    let job_id = service.start_calculation(product_id, options)?;
    tracing::info!(job_id = %job_id, product_id = %product_id, "Waiting for calculation");

    let query = service.query();
    let deadline = Duration::from_secs(config.jobs.max_processing_secs) + SYNC_GRACE;
    let job = query
        .wait_for_terminal(job_id, POLL_INTERVAL, deadline)
        .await
        .context("waiting for calculation")?;
    let sync = query
        .wait_for_sync_result(job_id, POLL_INTERVAL, SYNC_GRACE)
        .await?;
    service.shutdown().await;

    let summary = job.results.as_deref().map(|r| Summary {
        total_co2e: round_for_display(r.total_co2e),
        water_liters: round_for_display(r.water_footprint.total_liters),
        waste_kg: round_for_display(r.waste_output.total_kg),
    });

    Ok(CalculateReport {
        job,
        summary,
        sync,
        footprint: repository.footprint_snapshot(product_id),
    })
}

/// Render reference tables as JSON or as a plain listing
pub(crate) fn factors(tables: &ReferenceTables, json: bool) -> Result<String> {
    if json {
        return Ok(tables.to_json_string()?);
    }

    let mut out = String::new();
    writeln!(out, "GWP factors (IPCC AR5, 100-year)")?;
    for f in tables.gwp_factors() {
        writeln!(out, "  {:<6} {:>10}  {}", f.gas_formula, f.gwp_100yr_ar5, f.gas_name)?;
    }
    writeln!(out)?;
    writeln!(out, "Intensity factors (per unit)")?;
    for f in tables.intensity_factors() {
        let gases: Vec<String> = f
            .emissions
            .iter()
            .map(|e| format!("{} {}", e.gas_formula, e.kg_per_unit))
            .collect();
        writeln!(
            out,
            "  {:<18} {:<4} {:<36} water {} L, waste {} kg",
            f.key,
            f.unit,
            gases.join(", "),
            f.water_liters_per_unit,
            f.waste_kg_per_unit
        )?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lca_model::FootprintMetric;
    use pretty_assertions::assert_eq;

    fn write_bom(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("bom.json");
        std::fs::write(
            &path,
            r#"{
                "productId": 12,
                "items": [
                    {"activity": "ingredientSourcing", "material": "wheat_flour", "quantity": 0.5, "unit": "kg"},
                    {"activity": "transport", "material": "road_freight", "quantity": 0.2, "unit": "tkm"}
                ]
            }"#,
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn calculate_runs_job_and_syncs() {
        let dir = tempfile::tempdir().unwrap();
        let args = CalculateArgs {
            bom: write_bom(&dir),
            iso: true,
            ..CalculateArgs::default()
        };

        let report = calculate(args).await.unwrap();
        assert!(report.succeeded());
        assert!(report.summary.unwrap().total_co2e > 0.0);

        let sync = report.sync.unwrap();
        assert!(sync.success);
        assert!(sync.synced(FootprintMetric::Carbon));
        assert!(report.footprint.unwrap().carbon_footprint.is_some());
    }

    #[tokio::test]
    async fn no_sync_leaves_footprint_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let args = CalculateArgs {
            bom: write_bom(&dir),
            previous: ProductFootprint {
                carbon_footprint: Some(BigDecimal::from_str("0.8").unwrap()),
                ..ProductFootprint::default()
            },
            no_sync: true,
            ..CalculateArgs::default()
        };

        let report = calculate(args).await.unwrap();
        assert!(report.sync.unwrap().skipped);
        assert_eq!(
            report.footprint.unwrap().carbon_footprint,
            Some(BigDecimal::from_str("0.8").unwrap())
        );
    }

    #[tokio::test]
    async fn unreadable_bom_is_reported() {
        let args = CalculateArgs {
            bom: PathBuf::from("/nonexistent/bom.json"),
            ..CalculateArgs::default()
        };
        let err = calculate(args).await.unwrap_err();
        assert!(err.to_string().contains("reading /nonexistent/bom.json"));
    }

    #[test]
    fn factors_listing_names_every_gas() {
        let tables = ReferenceTables::shared_defaults();
        let text = factors(&tables, false).unwrap();
        for gas in ["CO2", "CH4", "N2O", "SF6"] {
            assert!(text.contains(gas));
        }
        assert!(text.contains("wheat_flour"));

        let json = factors(&tables, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.is_object());
    }
}
