//! Featured-slot rotation.
//!
//! `run` walks the requested horizon one date at a time, in ascending
//! order, and makes sure every date strictly after today carries exactly
//! one featured row. Already-filled dates are skipped, so repeated
//! sequential runs are no-ops. Two concurrent runs are NOT coordinated:
//! both can observe an empty date and insert for it. Single-writer
//! operation is assumed.

use crate::catalog::{CatalogRecord, CatalogStore};
use crate::table_store::StoreError;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

/// Offset past midnight UTC at which the daily slot is considered rolled
/// over; clients are told to re-check then.
const DAILY_ROLLOVER_SECS: i64 = 3600;

/// Re-check interval advised when no schedule row exists and a fallback
/// record is served instead.
const FALLBACK_RECHECK_SECS: i64 = 3600;

/// A record served for the featured slot.
#[derive(Debug, Clone)]
pub struct FeaturedPick {
    pub record: CatalogRecord,
    /// Unix timestamp after which the caller should re-check.
    pub next_update: i64,
    /// True when no schedule row existed and the pick is an unpersisted
    /// random fallback.
    pub fallback: bool,
}

/// Assigns non-repeating random records to future calendar dates.
pub struct RotationScheduler {
    store: Arc<CatalogStore>,
    rng: Mutex<StdRng>,
}

impl RotationScheduler {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Scheduler with a deterministic generator, for reproducible runs.
    pub fn with_seed(store: Arc<CatalogStore>, seed: u64) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Ensure each of the `days` dates after today has a featured record.
    ///
    /// Returns the number of dates filled by this call; dates that were
    /// already satisfied, or that found no active candidate, are skipped
    /// without failing the run.
    pub async fn run(&self, days: u32) -> Result<u32, StoreError> {
        self.run_from(Utc::now().date_naive(), days).await
    }

    #[instrument(skip(self))]
    pub(crate) async fn run_from(&self, today: NaiveDate, days: u32) -> Result<u32, StoreError> {
        let mut previous = String::new();
        let mut filled = 0;

        for offset in 1..=i64::from(days) {
            let date = today + Duration::days(offset);

            if let Some(existing) = self.store.featured_for(date).await? {
                previous = existing.id;
                continue;
            }

            let candidates = self.store.active_records().await?;
            if candidates.is_empty() {
                warn!(%date, "no active records to feature");
                continue;
            }

            let pick = self.pick(&candidates, &previous).clone();
            self.store.set_featured(&pick, date).await?;

            info!(%date, id = %pick.id, title = %pick.title, "featured record assigned");
            metrics::counter!("catalog.rotation.dates_filled").increment(1);

            previous = pick.id;
            filled += 1;
        }

        Ok(filled)
    }

    /// Uniform pick with a single redraw when the first draw lands on
    /// `previous`. The redraw excludes the repeated candidate, so with
    /// two or more candidates the result never repeats; with exactly one
    /// the rule is a no-op and the repeat stands.
    fn pick<'a>(&self, candidates: &'a [CatalogRecord], previous: &str) -> &'a CatalogRecord {
        let mut rng = self.rng.lock().unwrap();

        let mut index = rng.gen_range(0..candidates.len());
        if !previous.is_empty() && candidates[index].id == previous && candidates.len() > 1 {
            let redrawn = rng.gen_range(0..candidates.len() - 1);
            index = if redrawn >= index { redrawn + 1 } else { redrawn };
        }

        &candidates[index]
    }

    /// A random active record whose id differs from `exclude` (subject to
    /// the same single-redraw rule); `None` when the catalog has no
    /// active records.
    pub async fn random_active(&self, exclude: &str) -> Result<Option<CatalogRecord>, StoreError> {
        let candidates = self.store.active_records().await?;
        if candidates.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.pick(&candidates, exclude).clone()))
    }

    /// The record to serve for `date`'s featured slot.
    ///
    /// When no schedule row exists, an unpersisted random record is
    /// served instead with a short re-check hint; nothing is written.
    pub async fn featured_on(&self, date: NaiveDate) -> Result<Option<FeaturedPick>, StoreError> {
        if let Some(record) = self.store.featured_for(date).await? {
            return Ok(Some(FeaturedPick {
                record,
                next_update: next_daily_update(date),
                fallback: false,
            }));
        }

        match self.random_active("").await? {
            Some(record) => Ok(Some(FeaturedPick {
                record,
                next_update: Utc::now().timestamp() + FALLBACK_RECHECK_SECS,
                fallback: true,
            })),
            None => Ok(None),
        }
    }

    /// Today's featured record.
    pub async fn featured_today(&self) -> Result<Option<FeaturedPick>, StoreError> {
        self.featured_on(Utc::now().date_naive()).await
    }
}

/// Unix time of the next daily rollover after `date`: the following
/// midnight UTC plus the rollover offset.
fn next_daily_update(date: NaiveDate) -> i64 {
    let midnight_after = (date + Duration::days(1)).and_time(NaiveTime::MIN);
    midnight_after.and_utc().timestamp() + DAILY_ROLLOVER_SECS
}
