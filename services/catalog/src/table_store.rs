//! Generic access layer for the partitioned key-value table.
//!
//! Rows are addressed by `(partition_key, row_key)` and carry their
//! properties as a JSON document plus an etag that is re-minted on every
//! write. [`TableBackend`] is the seam to the backing store: it serves
//! bounded pages with an opaque continuation token. [`PartitionedTable`]
//! is the typed view on top; its `query` drives the continuation protocol
//! to exhaustion so callers always receive the complete result set and
//! never see a cursor.
//!
//! Transport failures are surfaced as [`StoreError::StorageUnavailable`]
//! without retries; retrying is the caller's decision.

use crate::config::DatabaseConfig;
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Optimistic concurrency token attached to every stored row.
pub type Etag = Uuid;

/// Errors from table operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("row {partition}/{id} already exists")]
    AlreadyExists { partition: String, id: String },

    #[error("row {partition}/{id} not found")]
    NotFound { partition: String, id: String },

    #[error("etag mismatch on {partition}/{id}")]
    Conflict { partition: String, id: String },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("stored row could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

/// A raw row as exchanged with the backing store.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub partition: String,
    pub id: String,
    pub etag: Etag,
    pub data: serde_json::Value,
}

/// Opaque continuation token for segmented reads.
///
/// Only backends create and interpret these; everything above the backend
/// treats the token as a black box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation(String);

impl Continuation {
    fn after(row_key: &str) -> Self {
        Self(row_key.to_string())
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

/// One bounded page of query results.
#[derive(Debug, Clone)]
pub struct RowPage {
    pub rows: Vec<TableRow>,
    pub continuation: Option<Continuation>,
}

/// Equality filter over a partition and its indexed fields.
///
/// Equality and logical AND are the only operators the catalog needs; the
/// backend compiles the field conditions to a JSONB containment check.
#[derive(Debug, Clone)]
pub struct RowFilter {
    partition: String,
    conditions: Vec<(String, serde_json::Value)>,
}

impl RowFilter {
    /// Filter matching every row of a partition.
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            conditions: Vec::new(),
        }
    }

    /// Add an equality condition on an indexed field (ANDed).
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn partition_key(&self) -> &str {
        &self.partition
    }

    pub fn conditions(&self) -> &[(String, serde_json::Value)] {
        &self.conditions
    }

    /// The conditions as a JSON object suitable for a containment match.
    fn containment(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> =
            self.conditions.iter().cloned().collect();
        serde_json::Value::Object(map)
    }
}

/// Backing key-value table reachable over the network.
///
/// Single-row operations are atomic at the store; `query_page` returns a
/// bounded page and, when more data remains, a continuation token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn insert(&self, row: TableRow) -> Result<(), StoreError>;

    async fn replace(&self, row: TableRow, expected: Option<Etag>) -> Result<(), StoreError>;

    async fn delete(&self, partition: &str, id: &str) -> Result<(), StoreError>;

    async fn get(&self, partition: &str, id: &str) -> Result<Option<TableRow>, StoreError>;

    async fn query_page(
        &self,
        filter: &RowFilter,
        continuation: Option<Continuation>,
    ) -> Result<RowPage, StoreError>;
}

/// A record type stored in the partitioned table.
pub trait TableRecord: Serialize + DeserializeOwned + Send + Sync {
    /// Logical collection the record belongs to.
    fn partition(&self) -> &str;

    /// Unique key within the partition.
    fn id(&self) -> &str;
}

/// Typed view over a [`TableBackend`].
pub struct PartitionedTable<T> {
    backend: Arc<dyn TableBackend>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for PartitionedTable<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            _record: PhantomData,
        }
    }
}

impl<T: TableRecord> PartitionedTable<T> {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self {
            backend,
            _record: PhantomData,
        }
    }

    fn encode(record: &T) -> Result<TableRow, StoreError> {
        Ok(TableRow {
            partition: record.partition().to_string(),
            id: record.id().to_string(),
            etag: Uuid::new_v4(),
            data: serde_json::to_value(record)?,
        })
    }

    fn decode(row: TableRow) -> Result<T, StoreError> {
        Ok(serde_json::from_value(row.data)?)
    }

    /// Persist a new record.
    ///
    /// Fails with [`StoreError::AlreadyExists`] when the key is taken.
    #[instrument(skip(self, record), fields(partition = %record.partition(), id = %record.id()))]
    pub async fn insert(&self, record: &T) -> Result<(), StoreError> {
        self.backend.insert(Self::encode(record)?).await?;
        metrics::counter!("catalog.table.rows_written").increment(1);
        Ok(())
    }

    /// Overwrite an existing record in full.
    ///
    /// With `expected` set, the write only succeeds while the stored etag
    /// still matches; a stale token fails with [`StoreError::Conflict`].
    /// A missing key fails with [`StoreError::NotFound`].
    #[instrument(skip(self, record, expected), fields(partition = %record.partition(), id = %record.id()))]
    pub async fn replace(&self, record: &T, expected: Option<Etag>) -> Result<(), StoreError> {
        self.backend.replace(Self::encode(record)?, expected).await?;
        metrics::counter!("catalog.table.rows_written").increment(1);
        Ok(())
    }

    /// Remove a record.
    ///
    /// Not idempotent: a second delete of the same key fails with
    /// [`StoreError::NotFound`].
    #[instrument(skip(self, record), fields(partition = %record.partition(), id = %record.id()))]
    pub async fn delete(&self, record: &T) -> Result<(), StoreError> {
        self.backend.delete(record.partition(), record.id()).await
    }

    /// Point lookup; a missing key is `Ok(None)`, never an error.
    pub async fn get(&self, partition: &str, id: &str) -> Result<Option<T>, StoreError> {
        match self.backend.get(partition, id).await? {
            Some(row) => Ok(Some(Self::decode(row)?)),
            None => Ok(None),
        }
    }

    /// Run a filter and return the complete result set.
    ///
    /// Internally issues segmented reads until the backend signals no more
    /// data; the ordering is whatever the backend provides.
    #[instrument(skip(self, filter), fields(partition = %filter.partition_key()))]
    pub async fn query(&self, filter: &RowFilter) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::new();
        let mut continuation = None;
        let mut pages = 0u32;

        loop {
            let page = self.backend.query_page(filter, continuation).await?;
            pages += 1;

            records.reserve(page.rows.len());
            for row in page.rows {
                records.push(Self::decode(row)?);
            }

            continuation = page.continuation;
            if continuation.is_none() {
                break;
            }
        }

        debug!(rows = records.len(), pages, "query drained");
        Ok(records)
    }
}

/// Row shape as read from Postgres.
#[derive(FromRow)]
struct PgTableRow {
    partition_key: String,
    row_key: String,
    etag: Uuid,
    data: serde_json::Value,
}

impl From<PgTableRow> for TableRow {
    fn from(row: PgTableRow) -> Self {
        TableRow {
            partition: row.partition_key,
            id: row.row_key,
            etag: row.etag,
            data: row.data,
        }
    }
}

fn unavailable(error: sqlx::Error) -> StoreError {
    StoreError::StorageUnavailable(error.to_string())
}

/// PostgreSQL-backed [`TableBackend`].
pub struct PgTableBackend {
    pool: PgPool,
    page_size: i64,
}

impl PgTableBackend {
    /// Connect a new backend using the pool settings from configuration.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
            .connect(&config.url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!("Connected to PostgreSQL database");

        Ok(Self {
            pool,
            page_size: i64::from(config.page_size),
        })
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        Ok(())
    }

    /// The connection pool (for health checks).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn key_exists(&self, partition: &str, id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT 1 FROM catalog_rows WHERE partition_key = $1 AND row_key = $2",
        )
        .bind(partition)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(row.is_some())
    }
}

#[async_trait]
impl TableBackend for PgTableBackend {
    async fn insert(&self, row: TableRow) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO catalog_rows (partition_key, row_key, etag, data) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (partition_key, row_key) DO NOTHING",
        )
        .bind(&row.partition)
        .bind(&row.id)
        .bind(row.etag)
        .bind(&row.data)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                partition: row.partition,
                id: row.id,
            });
        }

        Ok(())
    }

    async fn replace(&self, row: TableRow, expected: Option<Etag>) -> Result<(), StoreError> {
        let result = match expected {
            Some(etag) => {
                sqlx::query(
                    "UPDATE catalog_rows SET data = $3, etag = $4, updated_at = now() \
                     WHERE partition_key = $1 AND row_key = $2 AND etag = $5",
                )
                .bind(&row.partition)
                .bind(&row.id)
                .bind(&row.data)
                .bind(row.etag)
                .bind(etag)
                .execute(&self.pool)
                .await
                .map_err(unavailable)?
            }
            None => {
                sqlx::query(
                    "UPDATE catalog_rows SET data = $3, etag = $4, updated_at = now() \
                     WHERE partition_key = $1 AND row_key = $2",
                )
                .bind(&row.partition)
                .bind(&row.id)
                .bind(&row.data)
                .bind(row.etag)
                .execute(&self.pool)
                .await
                .map_err(unavailable)?
            }
        };

        if result.rows_affected() == 0 {
            // Zero rows means either the key is absent or the token went
            // stale; a second lookup tells the two apart.
            return if self.key_exists(&row.partition, &row.id).await? {
                Err(StoreError::Conflict {
                    partition: row.partition,
                    id: row.id,
                })
            } else {
                Err(StoreError::NotFound {
                    partition: row.partition,
                    id: row.id,
                })
            };
        }

        Ok(())
    }

    async fn delete(&self, partition: &str, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "DELETE FROM catalog_rows WHERE partition_key = $1 AND row_key = $2",
        )
        .bind(partition)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                partition: partition.to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn get(&self, partition: &str, id: &str) -> Result<Option<TableRow>, StoreError> {
        let row = sqlx::query_as::<_, PgTableRow>(
            "SELECT partition_key, row_key, etag, data FROM catalog_rows \
             WHERE partition_key = $1 AND row_key = $2",
        )
        .bind(partition)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(row.map(Into::into))
    }

    async fn query_page(
        &self,
        filter: &RowFilter,
        continuation: Option<Continuation>,
    ) -> Result<RowPage, StoreError> {
        let mut sql = String::from(
            "SELECT partition_key, row_key, etag, data FROM catalog_rows \
             WHERE partition_key = $1",
        );

        let mut param_count = 1;

        if !filter.conditions().is_empty() {
            param_count += 1;
            sql.push_str(&format!(" AND data @> ${param_count}"));
        }

        if continuation.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND row_key > ${param_count}"));
        }

        param_count += 1;
        sql.push_str(&format!(" ORDER BY row_key LIMIT ${param_count}"));

        let mut query = sqlx::query_as::<_, PgTableRow>(&sql).bind(filter.partition_key());

        if !filter.conditions().is_empty() {
            query = query.bind(filter.containment());
        }

        if let Some(ref token) = continuation {
            query = query.bind(token.as_str().to_string());
        }

        // One extra row decides whether another page remains.
        query = query.bind(self.page_size + 1);

        let mut rows = query.fetch_all(&self.pool).await.map_err(unavailable)?;

        let has_more = rows.len() as i64 > self.page_size;
        if has_more {
            rows.truncate(self.page_size as usize);
        }

        let continuation = if has_more {
            rows.last().map(|r| Continuation::after(&r.row_key))
        } else {
            None
        };

        Ok(RowPage {
            rows: rows.into_iter().map(Into::into).collect(),
            continuation,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::BTreeMap;
    use tokio::sync::Mutex;

    /// In-memory [`TableBackend`] with bounded pages, for exercising the
    /// continuation protocol without a database.
    pub struct MemoryBackend {
        rows: Mutex<BTreeMap<(String, String), TableRow>>,
        page_size: usize,
    }

    impl MemoryBackend {
        pub fn new(page_size: usize) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(BTreeMap::new()),
                page_size,
            })
        }

        pub async fn row_count(&self) -> usize {
            self.rows.lock().await.len()
        }

        pub async fn etag_of(&self, partition: &str, id: &str) -> Option<Etag> {
            self.rows
                .lock()
                .await
                .get(&(partition.to_string(), id.to_string()))
                .map(|row| row.etag)
        }
    }

    fn matches(filter: &RowFilter, data: &serde_json::Value) -> bool {
        filter
            .conditions()
            .iter()
            .all(|(field, value)| data.get(field) == Some(value))
    }

    #[async_trait]
    impl TableBackend for MemoryBackend {
        async fn insert(&self, row: TableRow) -> Result<(), StoreError> {
            let mut rows = self.rows.lock().await;
            let key = (row.partition.clone(), row.id.clone());
            if rows.contains_key(&key) {
                return Err(StoreError::AlreadyExists {
                    partition: row.partition,
                    id: row.id,
                });
            }
            rows.insert(key, row);
            Ok(())
        }

        async fn replace(&self, row: TableRow, expected: Option<Etag>) -> Result<(), StoreError> {
            let mut rows = self.rows.lock().await;
            let key = (row.partition.clone(), row.id.clone());
            match rows.get_mut(&key) {
                None => Err(StoreError::NotFound {
                    partition: row.partition,
                    id: row.id,
                }),
                Some(stored) => {
                    if let Some(etag) = expected {
                        if stored.etag != etag {
                            return Err(StoreError::Conflict {
                                partition: row.partition,
                                id: row.id,
                            });
                        }
                    }
                    *stored = row;
                    Ok(())
                }
            }
        }

        async fn delete(&self, partition: &str, id: &str) -> Result<(), StoreError> {
            let mut rows = self.rows.lock().await;
            match rows.remove(&(partition.to_string(), id.to_string())) {
                Some(_) => Ok(()),
                None => Err(StoreError::NotFound {
                    partition: partition.to_string(),
                    id: id.to_string(),
                }),
            }
        }

        async fn get(&self, partition: &str, id: &str) -> Result<Option<TableRow>, StoreError> {
            let rows = self.rows.lock().await;
            Ok(rows
                .get(&(partition.to_string(), id.to_string()))
                .cloned())
        }

        async fn query_page(
            &self,
            filter: &RowFilter,
            continuation: Option<Continuation>,
        ) -> Result<RowPage, StoreError> {
            let rows = self.rows.lock().await;
            let after = continuation.map(|c| c.as_str().to_string());

            let remaining: Vec<TableRow> = rows
                .values()
                .filter(|row| row.partition == filter.partition_key())
                .filter(|row| matches(filter, &row.data))
                .filter(|row| after.as_deref().map_or(true, |a| row.id.as_str() > a))
                .cloned()
                .collect();

            let has_more = remaining.len() > self.page_size;
            let page: Vec<TableRow> = remaining.into_iter().take(self.page_size).collect();

            let continuation = if has_more {
                page.last().map(|row| Continuation::after(&row.id))
            } else {
                None
            };

            Ok(RowPage {
                rows: page,
                continuation,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryBackend;
    use super::*;
    use mockall::Sequence;
    use serde::Deserialize;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        partition: String,
        id: String,
        label: String,
        active: bool,
    }

    impl TableRecord for Widget {
        fn partition(&self) -> &str {
            &self.partition
        }

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn widget(id: &str, label: &str) -> Widget {
        Widget {
            partition: "widgets".to_string(),
            id: id.to_string(),
            label: label.to_string(),
            active: true,
        }
    }

    fn raw_row(id: &str) -> TableRow {
        TableRow {
            partition: "widgets".to_string(),
            id: id.to_string(),
            etag: Uuid::new_v4(),
            data: serde_json::to_value(widget(id, id)).unwrap(),
        }
    }

    #[tokio::test]
    async fn insert_then_get_returns_equal_record() {
        let backend = MemoryBackend::new(10);
        let table = PartitionedTable::<Widget>::new(backend);

        let record = widget("a", "first");
        table.insert(&record).await.unwrap();

        let stored = table.get("widgets", "a").await.unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn duplicate_insert_is_already_exists() {
        let backend = MemoryBackend::new(10);
        let table = PartitionedTable::<Widget>::new(backend);

        let record = widget("a", "first");
        table.insert(&record).await.unwrap();

        assert!(matches!(
            table.insert(&record).await,
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn delete_then_get_is_none_and_second_delete_fails() {
        let backend = MemoryBackend::new(10);
        let table = PartitionedTable::<Widget>::new(backend);

        let record = widget("a", "first");
        table.insert(&record).await.unwrap();
        table.delete(&record).await.unwrap();

        assert!(table.get("widgets", "a").await.unwrap().is_none());
        assert!(matches!(
            table.delete(&record).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn replace_missing_key_is_not_found() {
        let backend = MemoryBackend::new(10);
        let table = PartitionedTable::<Widget>::new(backend);

        assert!(matches!(
            table.replace(&widget("ghost", "nope"), None).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn replace_overwrites_whole_record() {
        let backend = MemoryBackend::new(10);
        let table = PartitionedTable::<Widget>::new(backend.clone());

        table.insert(&widget("a", "first")).await.unwrap();

        let mut updated = widget("a", "renamed");
        updated.active = false;
        table.replace(&updated, None).await.unwrap();

        let stored = table.get("widgets", "a").await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn stale_etag_is_conflict() {
        let backend = MemoryBackend::new(10);
        let table = PartitionedTable::<Widget>::new(backend.clone());

        table.insert(&widget("a", "first")).await.unwrap();
        let current = backend.etag_of("widgets", "a").await.unwrap();

        let stale = Uuid::new_v4();
        assert_ne!(stale, current);
        assert!(matches!(
            table.replace(&widget("a", "second"), Some(stale)).await,
            Err(StoreError::Conflict { .. })
        ));

        // The live token still works.
        table
            .replace(&widget("a", "second"), Some(current))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn query_drains_scripted_pages_without_leaking_the_cursor() {
        let mut backend = MockTableBackend::new();
        let mut seq = Sequence::new();

        backend
            .expect_query_page()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, continuation| {
                assert!(continuation.is_none());
                Ok(RowPage {
                    rows: vec![raw_row("a"), raw_row("b")],
                    continuation: Some(Continuation::after("b")),
                })
            });
        backend
            .expect_query_page()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, continuation| {
                assert_eq!(continuation, Some(Continuation::after("b")));
                Ok(RowPage {
                    rows: vec![raw_row("c"), raw_row("d")],
                    continuation: Some(Continuation::after("d")),
                })
            });
        backend
            .expect_query_page()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, continuation| {
                assert_eq!(continuation, Some(Continuation::after("d")));
                Ok(RowPage {
                    rows: vec![raw_row("e")],
                    continuation: None,
                })
            });

        let table = PartitionedTable::<Widget>::new(Arc::new(backend));
        let records = table
            .query(&RowFilter::partition("widgets"))
            .await
            .unwrap();

        assert_eq!(records.len(), 5);
        let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 5, "pages must union without duplicates");
    }

    #[tokio::test]
    async fn query_drains_memory_backend_pages() {
        let backend = MemoryBackend::new(2);
        let table = PartitionedTable::<Widget>::new(backend);

        for id in ["a", "b", "c", "d", "e"] {
            table.insert(&widget(id, id)).await.unwrap();
        }

        let records = table
            .query(&RowFilter::partition("widgets"))
            .await
            .unwrap();

        assert_eq!(records.len(), 5);
        let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn query_filters_by_partition_and_fields() {
        let backend = MemoryBackend::new(10);
        let table = PartitionedTable::<Widget>::new(backend);

        table.insert(&widget("a", "keep")).await.unwrap();

        let mut inactive = widget("b", "drop");
        inactive.active = false;
        table.insert(&inactive).await.unwrap();

        let mut other = widget("c", "elsewhere");
        other.partition = "archive".to_string();
        table.insert(&other).await.unwrap();

        let records = table
            .query(&RowFilter::partition("widgets").eq("active", true))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "a");
    }

    #[tokio::test]
    async fn backend_failure_propagates_unchanged() {
        let mut backend = MockTableBackend::new();
        backend.expect_query_page().returning(|_, _| {
            Err(StoreError::StorageUnavailable("connection reset".into()))
        });

        let table = PartitionedTable::<Widget>::new(Arc::new(backend));
        assert!(matches!(
            table.query(&RowFilter::partition("widgets")).await,
            Err(StoreError::StorageUnavailable(_))
        ));
    }
}
