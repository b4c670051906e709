/// Prometheus metrics for sync runs.
use prometheus::{
    Counter, Histogram, Registry, register_counter_with_registry,
    register_histogram_with_registry,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Metrics {
    pub sync_runs: Counter,
    pub sync_failures: Counter,
    pub books_staged: Counter,
    pub insert_failures: Counter,
    pub catalog_lookups: Counter,
    pub catalog_matches: Counter,

    pub sync_duration: Histogram,
}

impl Metrics {
    /// Registers every collector on `registry`.
    ///
    /// # Errors
    /// Fails when a collector with the same name is already registered.
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            sync_runs: register_counter_with_registry!(
                "bestseller_sync_runs_total",
                "Total number of sync runs started",
                registry
            )?,
            sync_failures: register_counter_with_registry!(
                "bestseller_sync_failures_total",
                "Total number of sync runs that failed",
                registry
            )?,
            books_staged: register_counter_with_registry!(
                "bestseller_books_staged_total",
                "Total number of books written to the staging table",
                registry
            )?,
            insert_failures: register_counter_with_registry!(
                "bestseller_insert_failures_total",
                "Total number of staging inserts that were skipped",
                registry
            )?,
            catalog_lookups: register_counter_with_registry!(
                "bestseller_catalog_lookups_total",
                "Total number of catalog lookup attempts",
                registry
            )?,
            catalog_matches: register_counter_with_registry!(
                "bestseller_catalog_matches_total",
                "Total number of books resolved to a catalog id",
                registry
            )?,
            sync_duration: register_histogram_with_registry!(
                "bestseller_sync_duration_seconds",
                "Duration of a full sync run",
                vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0],
                registry
            )?,
        })
    }
}
