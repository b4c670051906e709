//! Sync orchestrator: fetch -> (resolve, stage)* -> swap -> cleanup.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clients::bestsellers::{
    BestsellerClient, BestsellerConfig, BestsellerEntry, BestsellerError, BestsellerList,
    BestsellerSource,
};
use crate::clients::catalog::{CatalogClient, CatalogConfig};
use crate::config::Config;
use crate::observability::Metrics;
use crate::pipeline::resolve::IdentityResolver;
use crate::store::dao::ExploreStore;
use crate::store::models::NewExploreBook;

const UNKNOWN_TITLE: &str = "Unknown Title";
const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Fatal sync failures. Per-book lookup and insert failures are never raised.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("NYT_API_KEY is not configured")]
    MissingCredential,
    #[error("failed to fetch bestseller lists: {0}")]
    Fetch(#[source] BestsellerError),
    #[error("failed to prepare staging table: {0:#}")]
    Staging(#[source] anyhow::Error),
    #[error("swap failed: {0:#}")]
    Swap(#[source] anyhow::Error),
}

/// Aggregate counters of one successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub lists: usize,
    pub books_seen: u64,
    pub books_inserted: u64,
    pub insert_failures: u64,
    pub lookups_attempted: u64,
    pub lookups_succeeded: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            lists: 0,
            books_seen: 0,
            books_inserted: 0,
            insert_failures: 0,
            lookups_attempted: 0,
            lookups_succeeded: 0,
            started_at,
            finished_at: started_at,
        }
    }

    /// Whole percent of lookups that produced a catalog id.
    #[must_use]
    pub fn success_rate_pct(&self) -> u64 {
        if self.lookups_attempted == 0 {
            return 0;
        }
        (self.lookups_succeeded * 100 + self.lookups_attempted / 2) / self.lookups_attempted
    }
}

pub struct BestsellerSync {
    api_key: Option<String>,
    source: Arc<dyn BestsellerSource>,
    resolver: IdentityResolver,
    store: Arc<dyn ExploreStore>,
    metrics: Arc<Metrics>,
}

impl BestsellerSync {
    #[must_use]
    pub fn new(
        api_key: Option<String>,
        source: Arc<dyn BestsellerSource>,
        resolver: IdentityResolver,
        store: Arc<dyn ExploreStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            api_key,
            source,
            resolver,
            store,
            metrics,
        }
    }

    /// Wires the HTTP clients described by `config` around `store`.
    ///
    /// # Errors
    /// Returns an error when either upstream client cannot be built.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn ExploreStore>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let source = BestsellerClient::new(BestsellerConfig {
            base_url: config.nyt_base_url().to_string(),
            connect_timeout: config.http_connect_timeout(),
            total_timeout: config.http_total_timeout(),
        })?;
        let catalog = CatalogClient::new(CatalogConfig {
            base_url: config.google_books_base_url().to_string(),
            api_key: config.google_books_api_key().map(ToString::to_string),
            connect_timeout: config.http_connect_timeout(),
            total_timeout: config.http_total_timeout(),
        })?;
        let resolver = IdentityResolver::new(
            Arc::new(catalog),
            config.match_weights(),
            config.resolver_pacing(),
        );

        Ok(Self::new(
            config.nyt_api_key().map(ToString::to_string),
            Arc::new(source),
            resolver,
            store,
            metrics,
        ))
    }

    /// Runs one full sync to completion.
    ///
    /// # Errors
    /// Returns the first fatal [`SyncError`]; the live table is untouched in that case.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let run_id = Uuid::new_v4();
        self.metrics.sync_runs.inc();
        let timer = Instant::now();

        let result = self.execute(run_id).await;
        self.metrics
            .sync_duration
            .observe(timer.elapsed().as_secs_f64());

        match &result {
            Ok(report) => info!(
                run_id = %report.run_id,
                lists = report.lists,
                books_inserted = report.books_inserted,
                insert_failures = report.insert_failures,
                lookups_attempted = report.lookups_attempted,
                lookups_succeeded = report.lookups_succeeded,
                success_rate_pct = report.success_rate_pct(),
                "sync completed"
            ),
            Err(err) => {
                self.metrics.sync_failures.inc();
                error!(run_id = %run_id, error = %err, "sync failed");
            }
        }
        result
    }

    #[instrument(skip_all, fields(run_id = %run_id))]
    async fn execute(&self, run_id: Uuid) -> Result<SyncReport, SyncError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SyncError::MissingCredential)?;

        let started_at = Utc::now();
        let lists = self
            .source
            .fetch_overview(api_key)
            .await
            .map_err(SyncError::Fetch)?;
        info!(lists = lists.len(), "fetched bestseller lists");

        self.prepare_staging().await.map_err(SyncError::Staging)?;

        let mut report = SyncReport::new(run_id, started_at);
        report.lists = lists.len();
        for list in &lists {
            self.stage_list(list, &mut report).await;
        }

        self.store.promote_staging().await.map_err(SyncError::Swap)?;
        info!(live = self.store.tables().live(), "staging table promoted to live");

        if let Err(err) = self.store.drop_retired().await {
            warn!(
                table = self.store.tables().retired(),
                error = %err,
                "could not drop retired table; it will be dropped on the next run"
            );
        }

        report.finished_at = Utc::now();
        Ok(report)
    }

    async fn prepare_staging(&self) -> Result<()> {
        self.store.ensure_live_table().await?;
        self.store.drop_retired().await?;
        self.store.recreate_staging().await
    }

    async fn stage_list(&self, list: &BestsellerList, report: &mut SyncReport) {
        info!(list = %list.name, books = list.books.len(), "processing list");

        for entry in &list.books {
            report.books_seen += 1;
            let resolution = self.resolver.resolve(entry).await;

            report.lookups_attempted += u64::from(resolution.lookups);
            self.metrics
                .catalog_lookups
                .inc_by(f64::from(resolution.lookups));
            if resolution.is_resolved() {
                report.lookups_succeeded += 1;
                self.metrics.catalog_matches.inc();
            }

            let row = staged_row(
                list,
                entry,
                resolution.catalog_id,
                resolution.cover_image,
                report.started_at,
            );
            match self.store.insert_staged(&row).await {
                Ok(()) => {
                    report.books_inserted += 1;
                    self.metrics.books_staged.inc();
                    debug!(list = %list.name, rank = row.rank, title = %row.title, "book staged");
                }
                Err(err) => {
                    report.insert_failures += 1;
                    self.metrics.insert_failures.inc();
                    warn!(
                        list = %list.name,
                        title = %row.title,
                        error = %err,
                        "skipping book after insert failure"
                    );
                }
            }
        }
    }
}

fn staged_row(
    list: &BestsellerList,
    entry: &BestsellerEntry,
    catalog_id: Option<String>,
    cover_image: Option<String>,
    created_at: DateTime<Utc>,
) -> NewExploreBook {
    NewExploreBook {
        catalog_id,
        title: entry
            .title
            .clone()
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        author: entry
            .author
            .clone()
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        book_image: cover_image,
        isbn_13: entry.isbn_13.clone(),
        isbn_10: entry.isbn_10.clone(),
        list_name: list.name.clone(),
        list_name_encoded: list.name_encoded.clone(),
        rank: entry.rank.unwrap_or(0),
        created_at,
    }
}
