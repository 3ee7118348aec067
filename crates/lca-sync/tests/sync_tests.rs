//! Sync Service Tests
//!
//! End-to-end write-back against the in-memory store and the fault-injecting
//! repository.

use bigdecimal::ToPrimitive;
use lca_engine::{CalculationEngine, NoCheckpoint};
use lca_model::{
    CalculationOptions, FootprintMetric, InMemoryProductRepository, ProductId, ProductRepository,
};
use lca_sync::{SyncConfig, SyncService};
use lca_test_utils::{
    decimal, footprint, reference_bom, results_with, seeded_repository, test_tables,
    FlakyRepository,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn test_reference_calculation_syncs_with_small_change() {
    let product = ProductId(12);
    let repo = seeded_repository(product, footprint(Some("0.80"), None, Some("2.5")));
    let engine = CalculationEngine::new(test_tables());
    let results = engine
        .calculate(
            product,
            &reference_bom(product),
            CalculationOptions::default(),
            &NoCheckpoint,
        )
        .unwrap();

    let sync = SyncService::new(repo.clone(), SyncConfig::default());
    let outcome = sync.sync_results(product, &results).await.unwrap();

    // 0.80 -> 0.9558 is a 19.5 % change, well inside the 300 % limit
    assert!(outcome.success);
    assert!(outcome.validation_errors.is_empty());
    assert!(outcome.synced(FootprintMetric::Carbon));
    assert_eq!(repo.write_count(product), 1);

    let stored = repo.footprint_snapshot(product).unwrap();
    let carbon = stored.carbon_footprint.and_then(|d| d.to_f64()).unwrap();
    let water = stored.water_footprint.and_then(|d| d.to_f64()).unwrap();
    let waste = stored.waste_footprint.and_then(|d| d.to_f64()).unwrap();
    assert!((carbon - 0.9558).abs() < 1e-9);
    assert!((water - 50.0).abs() < 1e-9);
    assert!((waste - 0.05).abs() < 1e-9);
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let inner = InMemoryProductRepository::new();
    for id in 1..=3 {
        inner.insert_product(
            ProductId(id),
            Some(reference_bom(ProductId(id))),
            footprint(Some("1.0"), None, None),
        );
    }
    let repo = Arc::new(FlakyRepository::new(inner));
    repo.fail_writes_for(ProductId(2));

    let sync = SyncService::new(repo.clone(), SyncConfig::default());
    let items: Vec<_> = (1..=3)
        .map(|id| (ProductId(id), results_with(1.2, 0.0, 0.0)))
        .collect();

    let outcomes = sync.sync_batch(&items).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].success);
    assert!(!outcomes[1].success);
    assert!(outcomes[1].validation_errors[0].contains("injected write failure"));
    assert!(outcomes[2].success);

    assert_eq!(repo.inner().write_count(ProductId(1)), 1);
    assert_eq!(repo.inner().write_count(ProductId(2)), 0);
    assert_eq!(repo.inner().write_count(ProductId(3)), 1);
}

#[tokio::test]
async fn test_batch_reports_missing_product() {
    let repo = seeded_repository(ProductId(1), footprint(None, None, None));
    let sync = SyncService::new(repo, SyncConfig::default());

    let outcomes = sync
        .sync_batch(&[
            (ProductId(1), results_with(1.0, 1.0, 1.0)),
            (ProductId(99), results_with(1.0, 1.0, 1.0)),
        ])
        .await;

    assert!(outcomes[0].success);
    assert!(!outcomes[1].success);
    assert_eq!(outcomes[1].product_id, ProductId(99));
    assert!(outcomes[1].validation_errors[0].contains("not found"));
}

#[tokio::test]
async fn test_read_failure_is_persistence_error() {
    let inner = InMemoryProductRepository::new();
    inner.insert_product(ProductId(5), None, footprint(None, None, None));
    let repo = Arc::new(FlakyRepository::new(inner));
    repo.fail_reads_for(ProductId(5));

    let sync = SyncService::new(repo.clone(), SyncConfig::default());
    let err = sync
        .sync_results(ProductId(5), &results_with(1.0, 0.0, 0.0))
        .await
        .unwrap_err();

    assert!(matches!(err, lca_sync::SyncError::Persistence { .. }));
    assert_eq!(repo.inner().write_count(ProductId(5)), 0);
}

#[tokio::test]
async fn test_write_is_all_or_nothing() {
    let repo = seeded_repository(ProductId(8), footprint(Some("1"), Some("10"), Some("1")));
    let sync = SyncService::new(repo.clone(), SyncConfig::default());

    sync.sync_results(ProductId(8), &results_with(2.0, 20.0, 2.0))
        .await
        .unwrap();

    let stored = repo.footprint(ProductId(8)).await.unwrap();
    assert_eq!(stored.carbon_footprint, Some(decimal("2")));
    assert_eq!(stored.water_footprint, Some(decimal("20")));
    assert_eq!(stored.waste_footprint, Some(decimal("2")));
    assert_eq!(repo.write_count(ProductId(8)), 1);
}
