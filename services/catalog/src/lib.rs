//! Catalog Service
//!
//! A small content catalog: records live in a partitioned key-value
//! table, their images in a blob store, and a rotation scheduler promotes
//! one record per day to the featured slot.
//!
//! ## Architecture
//!
//! ```text
//! HTTP API (axum)                PostgreSQL               S3 Bucket
//! ┌──────────────┐            ┌───────────────┐        ┌──────────────┐
//! │ public:      │            │ catalog_rows  │        │ images/      │
//! │  featured    │───────────▶│  catalog/...  │        │  {id}.{ext}  │
//! │  random      │            │  featured/... │        └──────────────┘
//! │ admin:       │            └───────────────┘               ▲
//! │  crud        │                   ▲                        │
//! │  rotation    │                   │                        │
//! └──────────────┘            ┌───────────────┐        ┌──────────────┐
//!        │                    │ Partitioned   │        │ Image        │
//!        ▼                    │ Table         │        │ Store        │
//! ┌──────────────┐            └───────────────┘        └──────────────┘
//! │ Rotation     │                   ▲
//! │ Scheduler    │───────────────────┘
//! └──────────────┘
//! ```
//!
//! The table layer hides the backing store's segmented reads behind a
//! single complete `query`; the scheduler assigns non-repeating random
//! records to future dates idempotently; record ids are 22-character
//! reversible tokens over 128-bit values.

pub mod api;
pub mod blob_store;
pub mod catalog;
pub mod config;
pub mod rotation;
pub mod short_id;
pub mod table_store;

pub use blob_store::{BlobBackend, BlobError, ImageStore, S3BlobBackend};
pub use catalog::{CatalogRecord, CatalogStore, CATALOG_PARTITION, FEATURED_PARTITION};
pub use config::Config;
pub use rotation::{FeaturedPick, RotationScheduler};
pub use short_id::{ShortId, ShortIdError};
pub use table_store::{
    Etag, PartitionedTable, PgTableBackend, RowFilter, RowPage, StoreError, TableBackend,
    TableRecord, TableRow,
};
