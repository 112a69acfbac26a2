use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};

use crate::db::models::MarketRecordRow;
use crate::error::Result;
use crate::now_ns;
use crate::types::MarketRecord;

/// Rows per multi-row INSERT. Six binds per row keeps each statement well
/// under SQLite's bind-parameter limit.
const INSERT_CHUNK_ROWS: usize = 500;

/// Durable storage of ingested market records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records in insertion order, or only those whose title contains
    /// `title` (case-insensitive, Unicode lowercase folding).
    async fn list(&self, title: Option<&str>) -> Result<Vec<MarketRecord>>;

    /// Insert `records` as one batch. Returns the number of rows written.
    async fn insert_many(&self, records: &[MarketRecord]) -> Result<u64>;
}

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if missing) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn list(&self, title: Option<&str>) -> Result<Vec<MarketRecord>> {
        let rows: Vec<MarketRecordRow> = match title {
            Some(t) => {
                sqlx::query_as(
                    r#"
                    SELECT id, event_name, event_id, market_id, title, created_at
                    FROM market_records
                    WHERE title_folded IS NOT NULL AND instr(title_folded, ?) > 0
                    ORDER BY id
                    "#,
                )
                .bind(t.to_lowercase())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id, event_name, event_id, market_id, title, created_at
                    FROM market_records
                    ORDER BY id
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(MarketRecord::from).collect())
    }

    async fn insert_many(&self, records: &[MarketRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let created_at = now_ns() as i64;
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for chunk in records.chunks(INSERT_CHUNK_ROWS) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO market_records (event_name, event_id, market_id, title, title_folded, created_at) ",
            );
            qb.push_values(chunk, |mut row, r| {
                row.push_bind(r.event_name.clone())
                    .push_bind(r.event_id.clone())
                    .push_bind(r.market_id.clone())
                    .push_bind(r.title.clone())
                    .push_bind(r.title.as_deref().map(str::to_lowercase))
                    .push_bind(created_at);
            });
            written += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> SqliteRecordStore {
    // One long-lived connection: every new `:memory:` connection is a fresh database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    SqliteRecordStore::from_pool(pool).await.expect("migrations")
}
