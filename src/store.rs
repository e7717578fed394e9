//! Registration storage
//!
//! [`RecordStore`] is the seam between the analytics service and whatever
//! persists records. Two implementations ship with the crate: the in-memory
//! [`MemoryStore`] and the SurrealDB-backed [`crate::db::SurrealStore`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::aggregate::{DateRange, RecordFilter};
use crate::error::OutsidePeriod;
use crate::models::RegistrationRecord;
use crate::period::PeriodKey;

/// Row counts and data coverage of a store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Rows without a manufacturer (category totals)
    pub category_rows: usize,
    /// Rows attributed to a manufacturer
    pub manufacturer_rows: usize,
    pub first_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}

impl StoreStats {
    pub fn total_rows(&self) -> usize {
        self.category_rows + self.manufacturer_rows
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a RegistrationRecord>,
    {
        let mut stats = StoreStats::default();
        for r in records {
            if r.is_category_total() {
                stats.category_rows += 1;
            } else {
                stats.manufacturer_rows += 1;
            }
            stats.first_date = Some(stats.first_date.map_or(r.date, |d| d.min(r.date)));
            stats.latest_date = Some(stats.latest_date.map_or(r.date, |d| d.max(r.date)));
        }
        stats
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records inside `range` that pass `filter`, ordered by date
    async fn fetch_records(&self, range: &DateRange, filter: &RecordFilter) -> Result<Vec<RegistrationRecord>>;

    /// Atomically swap every stored record of `period` for `records`.
    ///
    /// Fails without touching the store if any record lies outside the period.
    async fn replace_period(&self, period: PeriodKey, records: Vec<RegistrationRecord>) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Reject the batch if any record falls outside `period`
pub fn ensure_within(period: PeriodKey, records: &[RegistrationRecord]) -> Result<(), OutsidePeriod> {
    match records.iter().find(|r| !period.contains(r.date)) {
        Some(r) => Err(OutsidePeriod { date: r.date, period }),
        None => Ok(()),
    }
}

/// In-memory store holding an immutable snapshot.
///
/// Readers clone the snapshot pointer and release the lock before filtering,
/// so a concurrent `replace_period` is seen either entirely or not at all.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: RwLock<Arc<Vec<RegistrationRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut records: Vec<RegistrationRecord>) -> Self {
        records.sort_by_key(|r| r.date);
        Self {
            snapshot: RwLock::new(Arc::new(records)),
        }
    }

    async fn snapshot(&self) -> Arc<Vec<RegistrationRecord>> {
        self.snapshot.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_records(&self, range: &DateRange, filter: &RecordFilter) -> Result<Vec<RegistrationRecord>> {
        let snapshot = self.snapshot().await;
        Ok(snapshot
            .iter()
            .filter(|r| range.contains(r.date) && filter.matches(r))
            .cloned()
            .collect())
    }

    async fn replace_period(&self, period: PeriodKey, records: Vec<RegistrationRecord>) -> Result<()> {
        ensure_within(period, &records)?;

        let mut guard = self.snapshot.write().await;
        let mut next: Vec<RegistrationRecord> = guard
            .iter()
            .filter(|r| !period.contains(r.date))
            .cloned()
            .chain(records)
            .collect();
        next.sort_by_key(|r| r.date);
        *guard = Arc::new(next);
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let snapshot = self.snapshot().await;
        Ok(StoreStats::from_records(snapshot.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VehicleCategory;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(date: NaiveDate, manufacturer: Option<&str>, count: u64) -> RegistrationRecord {
        RegistrationRecord::new(date, VehicleCategory::TwoWheeler, manufacturer.map(str::to_string), None, count)
    }

    #[tokio::test]
    async fn test_replace_period_does_not_duplicate() {
        let store = MemoryStore::with_records(vec![
            rec(d(2024, 1, 1), Some("Hero"), 100),
            rec(d(2024, 2, 1), Some("Hero"), 110),
        ]);
        let jan = PeriodKey::month(2024, 1);

        store.replace_period(jan, vec![rec(d(2024, 1, 1), Some("Hero"), 120)]).await.unwrap();
        store.replace_period(jan, vec![rec(d(2024, 1, 1), Some("Hero"), 120)]).await.unwrap();

        let all = store.fetch_records(&DateRange::all(), &RecordFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].count, 120);
        assert_eq!(all[1].count, 110);
    }

    #[tokio::test]
    async fn test_replace_rejects_foreign_records() {
        let store = MemoryStore::with_records(vec![rec(d(2024, 1, 1), None, 5)]);
        let err = store
            .replace_period(PeriodKey::quarter(2024, 1), vec![rec(d(2024, 4, 1), None, 9)])
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<OutsidePeriod>(),
            Some(&OutsidePeriod {
                date: d(2024, 4, 1),
                period: PeriodKey::quarter(2024, 1)
            })
        );
        assert_eq!(store.stats().await.unwrap().total_rows(), 1);
    }

    #[tokio::test]
    async fn test_fetch_filters_and_stats() {
        let store = MemoryStore::with_records(vec![
            rec(d(2024, 3, 1), None, 500),
            rec(d(2023, 12, 1), Some("TVS"), 40),
            rec(d(2024, 3, 1), Some("TVS"), 60),
        ]);
        let range = DateRange::new(Some(d(2024, 1, 1)), None);
        let filter = RecordFilter::default().with_level(crate::models::RecordLevel::Manufacturer);
        let rows = store.fetch_records(&range, &filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 60);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.category_rows, 1);
        assert_eq!(stats.manufacturer_rows, 2);
        assert_eq!(stats.first_date, Some(d(2023, 12, 1)));
        assert_eq!(stats.latest_date, Some(d(2024, 3, 1)));
    }

    #[tokio::test]
    async fn test_empty_replacement_clears_period() {
        let store = MemoryStore::with_records(vec![rec(d(2024, 5, 1), None, 5), rec(d(2024, 8, 1), None, 6)]);
        store.replace_period(PeriodKey::quarter(2024, 2), Vec::new()).await.unwrap();
        let all = store.fetch_records(&DateRange::all(), &RecordFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].date, d(2024, 8, 1));
    }
}
