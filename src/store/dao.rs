//! Storage capability consumed by the sync pipeline and the explore endpoints.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{ExploreBookRecord, ListSummary, NewExploreBook};
use super::tables::TableSet;

#[async_trait]
pub trait ExploreStore: Send + Sync {
    /// The table set this store versions.
    fn tables(&self) -> &TableSet;

    /// Liveness check used by the readiness probe.
    async fn ping(&self) -> Result<()>;

    /// Creates the live table when it has never existed.
    async fn ensure_live_table(&self) -> Result<()>;

    /// Drops the retired slot if a previous run left it behind.
    async fn drop_retired(&self) -> Result<()>;

    /// Drops any staging table from an aborted run and creates an empty one.
    async fn recreate_staging(&self) -> Result<()>;

    async fn insert_staged(&self, book: &NewExploreBook) -> Result<()>;

    /// Renames live to retired and staging to live inside one transaction.
    ///
    /// On error nothing is renamed: the live table keeps serving reads.
    async fn promote_staging(&self) -> Result<()>;

    // Read side (live table only)

    async fn list_summaries(&self) -> Result<Vec<ListSummary>>;

    /// Rows with a catalog id, ordered by list name then rank.
    async fn resolved_books(&self) -> Result<Vec<ExploreBookRecord>>;

    async fn books_by_list(&self, list_name_encoded: &str) -> Result<Vec<ExploreBookRecord>>;

    /// One row per (title, author) from the top of the non-picture-book lists.
    async fn popular_books(&self, max_rank: i32, limit: i64) -> Result<Vec<ExploreBookRecord>>;
}
