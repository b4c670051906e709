//! In-memory [`ExploreStore`] for pipeline tests.
//!
//! The catalog maps table names to rows. `promote_staging` works on a private
//! copy of the catalog (the "transaction") and publishes it in one write, so
//! readers only ever observe the before or after state.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::dao::ExploreStore;
use super::models::{ExploreBookRecord, ListSummary, NewExploreBook};
use super::tables::TableSet;

#[derive(Debug, Default)]
pub(crate) struct Faults {
    pub(crate) prepare: bool,
    pub(crate) promote: bool,
    pub(crate) cleanup: bool,
    pub(crate) insert_titles: HashSet<String>,
}

pub(crate) struct MemoryExploreStore {
    tables: TableSet,
    catalog: RwLock<HashMap<String, Vec<ExploreBookRecord>>>,
    next_id: AtomicI32,
    swap_delay: Duration,
    faults: Faults,
    promotions: AtomicUsize,
}

impl MemoryExploreStore {
    pub(crate) fn new() -> Self {
        Self {
            tables: TableSet::default(),
            catalog: RwLock::new(HashMap::new()),
            next_id: AtomicI32::new(1),
            swap_delay: Duration::ZERO,
            faults: Faults::default(),
            promotions: AtomicUsize::new(0),
        }
    }

    /// Seeds the live table with `rows`.
    pub(crate) fn with_live_rows(self, rows: Vec<ExploreBookRecord>) -> Self {
        let live = self.tables.live().to_string();
        self.catalog.try_write().expect("fresh store").insert(live, rows);
        self
    }

    pub(crate) fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    /// Holds the swap "transaction" open for `delay` before publishing.
    pub(crate) fn with_swap_delay(mut self, delay: Duration) -> Self {
        self.swap_delay = delay;
        self
    }

    pub(crate) async fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.catalog.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Rows under the live name, or `None` if the name resolves to nothing.
    pub(crate) async fn live_rows(&self) -> Option<Vec<ExploreBookRecord>> {
        self.catalog.read().await.get(self.tables.live()).cloned()
    }

    pub(crate) fn promotions(&self) -> usize {
        self.promotions.load(Ordering::SeqCst)
    }

    async fn live_snapshot(&self) -> Result<Vec<ExploreBookRecord>> {
        self.live_rows()
            .await
            .ok_or_else(|| anyhow!("relation \"{}\" does not exist", self.tables.live()))
    }
}

#[async_trait]
impl ExploreStore for MemoryExploreStore {
    fn tables(&self) -> &TableSet {
        &self.tables
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_live_table(&self) -> Result<()> {
        self.catalog
            .write()
            .await
            .entry(self.tables.live().to_string())
            .or_default();
        Ok(())
    }

    async fn drop_retired(&self) -> Result<()> {
        let mut catalog = self.catalog.write().await;
        if self.faults.cleanup && catalog.contains_key(self.tables.retired()) {
            bail!("injected cleanup failure");
        }
        catalog.remove(self.tables.retired());
        Ok(())
    }

    async fn recreate_staging(&self) -> Result<()> {
        if self.faults.prepare {
            bail!("injected staging failure");
        }
        self.catalog
            .write()
            .await
            .insert(self.tables.staging().to_string(), Vec::new());
        Ok(())
    }

    async fn insert_staged(&self, book: &NewExploreBook) -> Result<()> {
        if self.faults.insert_titles.contains(&book.title) {
            bail!("injected insert failure for {}", book.title);
        }
        let mut catalog = self.catalog.write().await;
        let staging = catalog
            .get_mut(self.tables.staging())
            .ok_or_else(|| anyhow!("staging table does not exist"))?;
        staging.push(ExploreBookRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            catalog_id: book.catalog_id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            book_image: book.book_image.clone(),
            isbn_13: book.isbn_13.clone(),
            isbn_10: book.isbn_10.clone(),
            list_name: book.list_name.clone(),
            list_name_encoded: book.list_name_encoded.clone(),
            rank: book.rank,
            created_at: book.created_at.naive_utc(),
        });
        Ok(())
    }

    async fn promote_staging(&self) -> Result<()> {
        let mut working = self.catalog.read().await.clone();
        if self.faults.promote {
            // Makes the second rename fail after the first one applied.
            working.remove(self.tables.staging());
        }

        tokio::time::sleep(self.swap_delay).await;
        self.tables.swap_plan().apply(&mut working)?;

        *self.catalog.write().await = working;
        self.promotions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_summaries(&self) -> Result<Vec<ListSummary>> {
        let mut lists: Vec<ListSummary> = self
            .live_snapshot()
            .await?
            .into_iter()
            .map(|row| ListSummary {
                list_name: row.list_name,
                list_name_encoded: row.list_name_encoded,
            })
            .collect();
        lists.sort_by(|a, b| a.list_name.cmp(&b.list_name));
        lists.dedup();
        Ok(lists)
    }

    async fn resolved_books(&self) -> Result<Vec<ExploreBookRecord>> {
        let mut rows: Vec<ExploreBookRecord> = self
            .live_snapshot()
            .await?
            .into_iter()
            .filter(|row| row.catalog_id.is_some())
            .collect();
        rows.sort_by(|a, b| (&a.list_name, a.rank).cmp(&(&b.list_name, b.rank)));
        Ok(rows)
    }

    async fn books_by_list(&self, list_name_encoded: &str) -> Result<Vec<ExploreBookRecord>> {
        let mut rows: Vec<ExploreBookRecord> = self
            .live_snapshot()
            .await?
            .into_iter()
            .filter(|row| row.list_name_encoded == list_name_encoded)
            .collect();
        rows.sort_by_key(|row| row.rank);
        Ok(rows)
    }

    async fn popular_books(&self, max_rank: i32, limit: i64) -> Result<Vec<ExploreBookRecord>> {
        let mut rows: Vec<ExploreBookRecord> = self
            .live_snapshot()
            .await?
            .into_iter()
            .filter(|row| {
                row.rank <= max_rank
                    && row.catalog_id.is_some()
                    && !row.list_name.to_lowercase().contains("picture")
            })
            .collect();
        rows.sort_by(|a, b| {
            (&a.title, &a.author, a.rank, &a.list_name).cmp(&(
                &b.title,
                &b.author,
                b.rank,
                &b.list_name,
            ))
        });
        rows.dedup_by(|later, earlier| {
            later.title == earlier.title && later.author == earlier.author
        });
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }
}
