//! Catalog records and the domain-level store.
//!
//! Two logical collections share the one partitioned table: the primary
//! catalog (stable ids, `is_active` flag) and the featured schedule (one
//! denormalized row per assigned date). A featured row is a copy of the
//! chosen record under a fresh id, not a reference.

use crate::short_id::ShortId;
use crate::table_store::{
    Etag, PartitionedTable, RowFilter, StoreError, TableBackend, TableRecord,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Partition holding the primary catalog.
pub const CATALOG_PARTITION: &str = "catalog";

/// Partition holding the featured schedule.
pub const FEATURED_PARTITION: &str = "featured";

/// Calendar-date format used by featured rows.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A catalog entry.
///
/// `id` is the 22-character short id; the empty string is the unassigned
/// sentinel used only while a create request is being materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub partition: String,
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub image_address: String,
    pub reference_address: String,
    /// Set only on featured-schedule rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_date: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl TableRecord for CatalogRecord {
    fn partition(&self) -> &str {
        &self.partition
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Catalog operations over the partitioned table.
#[derive(Clone)]
pub struct CatalogStore {
    table: PartitionedTable<CatalogRecord>,
}

impl CatalogStore {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self {
            table: PartitionedTable::new(backend),
        }
    }

    /// Persist a new primary-catalog record, minting an id when the
    /// unassigned sentinel is passed.
    pub async fn create(&self, mut record: CatalogRecord) -> Result<CatalogRecord, StoreError> {
        if record.id.is_empty() {
            record.id = ShortId::generate().encode();
        }
        record.partition = CATALOG_PARTITION.to_string();
        self.table.insert(&record).await?;
        Ok(record)
    }

    pub async fn insert(&self, record: &CatalogRecord) -> Result<(), StoreError> {
        self.table.insert(record).await
    }

    /// Full overwrite; `expected` carries the optimistic concurrency
    /// token when the caller wants a conditional write.
    pub async fn replace(
        &self,
        record: &CatalogRecord,
        expected: Option<Etag>,
    ) -> Result<(), StoreError> {
        self.table.replace(record, expected).await
    }

    pub async fn delete(&self, record: &CatalogRecord) -> Result<(), StoreError> {
        self.table.delete(record).await
    }

    pub async fn get(&self, partition: &str, id: &str) -> Result<Option<CatalogRecord>, StoreError> {
        self.table.get(partition, id).await
    }

    /// Every row of a partition.
    pub async fn all_in(&self, partition: &str) -> Result<Vec<CatalogRecord>, StoreError> {
        self.table.query(&RowFilter::partition(partition)).await
    }

    /// Every active record in the primary catalog.
    pub async fn active_records(&self) -> Result<Vec<CatalogRecord>, StoreError> {
        self.table
            .query(&RowFilter::partition(CATALOG_PARTITION).eq("is_active", true))
            .await
    }

    /// The featured-schedule row for a date, if one was assigned.
    pub async fn featured_for(&self, date: NaiveDate) -> Result<Option<CatalogRecord>, StoreError> {
        let rows = self
            .table
            .query(
                &RowFilter::partition(FEATURED_PARTITION)
                    .eq("featured_date", date.format(DATE_FORMAT).to_string()),
            )
            .await?;

        Ok(rows.into_iter().next())
    }

    /// Materialize a featured-schedule row for `date`: a copy of `source`
    /// under a fresh id, carrying the assigned date.
    #[instrument(skip(self, source), fields(source_id = %source.id, date = %date))]
    pub async fn set_featured(
        &self,
        source: &CatalogRecord,
        date: NaiveDate,
    ) -> Result<CatalogRecord, StoreError> {
        let mut scheduled = source.clone();
        scheduled.partition = FEATURED_PARTITION.to_string();
        scheduled.id = ShortId::generate().encode();
        scheduled.featured_date = Some(date.format(DATE_FORMAT).to_string());

        self.table.insert(&scheduled).await?;

        info!(id = %scheduled.id, title = %scheduled.title, "featured row created");
        Ok(scheduled)
    }
}
