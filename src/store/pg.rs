use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Executor, PgPool};
use tracing::{debug, info, warn};

use super::dao::ExploreStore;
use super::models::{ExploreBookRecord, ListSummary, NewExploreBook};
use super::tables::TableSet;

/// Postgres-backed [`ExploreStore`].
#[derive(Debug, Clone)]
pub struct PgExploreStore {
    pool: PgPool,
    tables: TableSet,
}

impl PgExploreStore {
    #[must_use]
    pub fn new(pool: PgPool, tables: TableSet) -> Self {
        Self { pool, tables }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ExploreStore for PgExploreStore {
    fn tables(&self) -> &TableSet {
        &self.tables
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        Ok(())
    }

    async fn ensure_live_table(&self) -> Result<()> {
        let sql = TableSet::create_table_sql(self.tables.live(), true);
        self.pool
            .execute(sql.as_str())
            .await
            .with_context(|| format!("failed to ensure live table {}", self.tables.live()))?;
        Ok(())
    }

    async fn drop_retired(&self) -> Result<()> {
        let sql = format!("DROP TABLE IF EXISTS {} CASCADE", self.tables.retired());
        self.pool
            .execute(sql.as_str())
            .await
            .with_context(|| format!("failed to drop retired table {}", self.tables.retired()))?;
        debug!(table = self.tables.retired(), "retired table dropped");
        Ok(())
    }

    async fn recreate_staging(&self) -> Result<()> {
        let staging = self.tables.staging();
        let drop = format!("DROP TABLE IF EXISTS {staging} CASCADE");
        self.pool
            .execute(drop.as_str())
            .await
            .with_context(|| format!("failed to drop stale staging table {staging}"))?;

        let create = TableSet::create_table_sql(staging, false);
        self.pool
            .execute(create.as_str())
            .await
            .with_context(|| format!("failed to create staging table {staging}"))?;
        info!(table = staging, "staging table created");
        Ok(())
    }

    async fn insert_staged(&self, book: &NewExploreBook) -> Result<()> {
        let sql = format!(
            r"
            INSERT INTO {} (
                google_books_id, title, author, book_image, isbn_13, isbn_10,
                list_name, list_name_encoded, rank, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
            self.tables.staging()
        );

        sqlx::query(&sql)
            .bind(book.catalog_id.as_deref())
            .bind(&book.title)
            .bind(&book.author)
            .bind(book.book_image.as_deref())
            .bind(book.isbn_13.as_deref())
            .bind(book.isbn_10.as_deref())
            .bind(&book.list_name)
            .bind(&book.list_name_encoded)
            .bind(book.rank)
            .bind(book.created_at.naive_utc())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to insert staged book \"{}\"", book.title))?;
        Ok(())
    }

    async fn promote_staging(&self) -> Result<()> {
        let plan = self.tables.swap_plan();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin swap transaction")?;

        for (step, rename) in plan.steps() {
            let sql = rename.to_sql();
            if let Err(error) = sqlx::query(&sql).execute(&mut *tx).await {
                warn!(?step, %rename, error = %error, "swap step failed, rolling back");
                tx.rollback()
                    .await
                    .context("failed to roll back swap transaction")?;
                return Err(anyhow::Error::new(error)
                    .context(format!("swap step {step:?} ({rename}) failed")));
            }
        }

        tx.commit()
            .await
            .context("failed to commit swap transaction")?;
        Ok(())
    }

    async fn list_summaries(&self) -> Result<Vec<ListSummary>> {
        let sql = format!(
            "SELECT DISTINCT list_name, list_name_encoded FROM {} ORDER BY list_name",
            self.tables.live()
        );
        sqlx::query_as::<_, ListSummary>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch list summaries")
    }

    async fn resolved_books(&self) -> Result<Vec<ExploreBookRecord>> {
        let sql = format!(
            r"
            SELECT * FROM {}
            WHERE google_books_id IS NOT NULL
            ORDER BY list_name, rank ASC
            ",
            self.tables.live()
        );
        sqlx::query_as::<_, ExploreBookRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch resolved explore books")
    }

    async fn books_by_list(&self, list_name_encoded: &str) -> Result<Vec<ExploreBookRecord>> {
        let sql = format!(
            "SELECT * FROM {} WHERE list_name_encoded = $1 ORDER BY rank",
            self.tables.live()
        );
        sqlx::query_as::<_, ExploreBookRecord>(&sql)
            .bind(list_name_encoded)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to fetch books for list {list_name_encoded}"))
    }

    async fn popular_books(&self, max_rank: i32, limit: i64) -> Result<Vec<ExploreBookRecord>> {
        let sql = format!(
            r"
            SELECT DISTINCT ON (title, author) * FROM {}
            WHERE rank <= $1 AND google_books_id IS NOT NULL
            AND list_name NOT ILIKE '%picture%'
            ORDER BY title, author, rank ASC, list_name
            LIMIT $2
            ",
            self.tables.live()
        );
        sqlx::query_as::<_, ExploreBookRecord>(&sql)
            .bind(max_rank)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch popular explore books")
    }
}
