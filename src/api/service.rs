//! Shared business logic for the registrations API
//!
//! This service layer is used by the REST handlers and the console binaries.

use anyhow::Context;
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, totals_by_dimension, Aggregated, DateRange, RecordFilter};
use crate::config::Settings;
use crate::error::{QueryError, ServiceError};
use crate::growth::compute_growth;
use crate::insights::rank_insights;
use crate::models::{
    Dimension, GrowthKind, GrowthMetric, Insight, RawRow, RecordLevel, RegistrationRecord, VehicleCategory,
};
use crate::normalize::{normalize_batch, RowFailure};
use crate::period::{previous_quarter, Granularity, PeriodKey};
use crate::source::{CsvSource, RowSource};
use crate::store::{ensure_within, RecordStore, StoreStats};

pub type Result<T> = std::result::Result<T, ServiceError>;

const TOP_MANUFACTURERS: usize = 5;
const LOGGED_FAILURES: usize = 5;

// ============================================================================
// Data Structures
// ============================================================================

/// Structured filters for [`AnalyticsService::get_registrations`]
#[derive(Debug, Clone, Default)]
pub struct RegistrationQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub categories: Vec<VehicleCategory>,
    pub manufacturers: Vec<String>,
    pub regions: Vec<String>,
    /// Defaults to manufacturer when a manufacturer filter is given, category otherwise
    pub group_by: Option<Dimension>,
    pub granularity: Granularity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub dimension_value: String,
    pub period: PeriodKey,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManufacturerTotal {
    pub manufacturer: String,
    pub registrations: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_registrations: u64,
    pub category_breakdown: BTreeMap<String, u64>,
    pub top_manufacturers: Vec<ManufacturerTotal>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationsReport {
    pub group_by: Dimension,
    pub granularity: Granularity,
    pub series: Vec<SeriesPoint>,
    pub yoy: Vec<GrowthMetric>,
    /// Always computed over quarters
    pub qoq: Vec<GrowthMetric>,
    pub summary: Summary,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub source: Option<String>,
    pub rows_read: usize,
    pub records_ingested: usize,
    pub periods_replaced: Vec<PeriodKey>,
    pub failures: Vec<RowFailure>,
}

// ============================================================================
// Analytics Service
// ============================================================================

pub struct AnalyticsService {
    store: Arc<dyn RecordStore>,
    source: Option<Arc<dyn RowSource>>,
    top_n: usize,
    ingest_granularity: Granularity,
    cached_insights: Arc<RwLock<Option<Arc<Vec<Insight>>>>>,
    // Bumped on every invalidation so a fill computed from older data is dropped
    generation: AtomicU64,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            source: None,
            top_n: 3,
            ingest_granularity: Granularity::Month,
            cached_insights: Arc::new(RwLock::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_settings(store: Arc<dyn RecordStore>, settings: &Settings) -> Self {
        let service = Self::new(store)
            .with_top_n(settings.top_n)
            .with_ingest_granularity(settings.ingest_granularity);
        match &settings.data_source {
            Some(path) => service.with_source(Arc::new(CsvSource::new(path))),
            None => service,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_ingest_granularity(mut self, granularity: Granularity) -> Self {
        self.ingest_granularity = granularity;
        self
    }

    pub fn with_source(mut self, source: Arc<dyn RowSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn source_description(&self) -> Option<String> {
        self.source.as_ref().map(|s| s.describe())
    }

    /// Normalize `rows` and replace every period they touch.
    ///
    /// Rows that fail normalization are reported, not fatal.
    pub async fn ingest(&self, rows: Vec<RawRow>) -> Result<IngestReport> {
        let rows_read = rows.len();
        let batch = normalize_batch(rows);

        for failure in batch.failures.iter().take(LOGGED_FAILURES) {
            warn!("Row {} rejected: {}", failure.row, failure.error);
        }
        if batch.failures.len() > LOGGED_FAILURES {
            warn!("{} rows rejected in total", batch.failures.len());
        }

        let mut by_period: BTreeMap<PeriodKey, Vec<RegistrationRecord>> = BTreeMap::new();
        for record in batch.records {
            by_period
                .entry(PeriodKey::of(record.date, self.ingest_granularity))
                .or_default()
                .push(record);
        }
        let records_ingested = by_period.values().map(Vec::len).sum();

        let outcome = self.replace_all(by_period).await;
        self.invalidate_insights().await;
        let periods_replaced = outcome?;

        info!(
            "Ingested {} of {} rows across {} periods",
            records_ingested,
            rows_read,
            periods_replaced.len()
        );

        Ok(IngestReport {
            source: None,
            rows_read,
            records_ingested,
            periods_replaced,
            failures: batch.failures,
        })
    }

    async fn replace_all(&self, by_period: BTreeMap<PeriodKey, Vec<RegistrationRecord>>) -> Result<Vec<PeriodKey>> {
        let mut replaced = Vec::with_capacity(by_period.len());
        for (period, records) in by_period {
            debug!("Replacing {} ({} records)", period, records.len());
            self.store.replace_period(period, records).await?;
            replaced.push(period);
        }
        Ok(replaced)
    }

    /// Re-read the configured source and ingest it
    pub async fn refresh(&self) -> Result<IngestReport> {
        let source = self.source.clone().ok_or(ServiceError::NoDataSource)?;
        let description = source.describe();
        info!("Refreshing data from {}", description);

        let rows = tokio::task::spawn_blocking(move || source.rows())
            .await
            .context("row source task failed")??;

        let mut report = self.ingest(rows).await?;
        report.source = Some(description);
        Ok(report)
    }

    /// Replace one period's records. All records must fall inside `period`.
    pub async fn replace_period(&self, period: PeriodKey, records: Vec<RegistrationRecord>) -> Result<()> {
        ensure_within(period, &records)?;
        let count = records.len();
        let outcome = self.store.replace_period(period, records).await;
        self.invalidate_insights().await;
        outcome?;
        info!("Replaced period {} with {} records", period, count);
        Ok(())
    }

    async fn invalidate_insights(&self) {
        let mut cache = self.cached_insights.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        *cache = None;
    }

    /// Aggregated series with YoY and QoQ growth and a summary block
    pub async fn get_registrations(&self, query: &RegistrationQuery) -> Result<RegistrationsReport> {
        let range = DateRange::new(query.start_date, query.end_date);
        range.validate()?;
        self.check_known(Dimension::Manufacturer, &query.manufacturers).await?;
        self.check_known(Dimension::Region, &query.regions).await?;

        let group_by = query.group_by.unwrap_or(if query.manufacturers.is_empty() {
            Dimension::Category
        } else {
            Dimension::Manufacturer
        });

        let filter = RecordFilter {
            categories: query.categories.clone(),
            manufacturers: query.manufacturers.clone(),
            regions: query.regions.clone(),
            level: None,
        };

        // Growth compares whole periods, so a mid-period bound never pairs a
        // partial current period with a full baseline
        let growth_range = range.widen_to(query.granularity);
        let quarter_range = range.widen_to(Granularity::Quarter);

        // A year of history before the range feeds the earliest YoY baselines
        let history = DateRange::new(
            quarter_range.start.and_then(|s| s.checked_sub_months(Months::new(12))),
            quarter_range.end,
        );
        let records = self.store.fetch_records(&history, &filter).await?;

        let level = series_level(group_by, &filter, records.iter().filter(|r| range.contains(r.date)));
        let filter = filter.with_level(level);

        let series = aggregate(&records, group_by, query.granularity, &range, &filter)?;
        let growth_current = aggregate(&records, group_by, query.granularity, &growth_range, &filter)?;
        let series_history = aggregate(&records, group_by, query.granularity, &DateRange::all(), &filter)?;
        let yoy = compute_growth(&growth_current, &series_history, GrowthKind::YoY)?;

        let quarters = aggregate(&records, group_by, Granularity::Quarter, &quarter_range, &filter)?;
        let quarter_history = aggregate(&records, group_by, Granularity::Quarter, &DateRange::all(), &filter)?;
        let qoq = compute_growth(&quarters, &quarter_history, GrowthKind::QoQ)?;

        let summary = summarize(&records, &range, &filter)?;

        Ok(RegistrationsReport {
            group_by,
            granularity: query.granularity,
            series: series
                .into_iter()
                .map(|(key, count)| SeriesPoint {
                    dimension_value: key.dimension_value,
                    period: key.period,
                    count,
                })
                .collect(),
            yoy,
            qoq,
            summary,
        })
    }

    /// Ranked insights for the latest complete quarter, cached until the next replacement
    pub async fn get_insights(&self) -> Result<Arc<Vec<Insight>>> {
        // Check cache first
        {
            let cache = self.cached_insights.read().await;
            if let Some(insights) = cache.as_ref() {
                return Ok(insights.clone());
            }
        }

        let generation = self.generation.load(Ordering::Acquire);
        let records = self
            .store
            .fetch_records(&DateRange::all(), &RecordFilter::default())
            .await?;
        let insights = Arc::new(build_insights(&records, self.top_n)?);

        // Update cache
        {
            let mut cache = self.cached_insights.write().await;
            if self.generation.load(Ordering::Acquire) == generation {
                *cache = Some(insights.clone());
                debug!("Cached {} insights", insights.len());
            }
        }

        Ok(insights)
    }

    /// Distinct manufacturer names, sorted
    pub async fn get_manufacturers(&self) -> Result<Vec<String>> {
        Ok(self.distinct_values(Dimension::Manufacturer).await?.into_iter().collect())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        Ok(self.store.stats().await?)
    }

    async fn distinct_values(&self, dimension: Dimension) -> Result<BTreeSet<String>> {
        let records = self
            .store
            .fetch_records(&DateRange::all(), &RecordFilter::default())
            .await?;
        Ok(records
            .into_iter()
            .filter_map(|r| match dimension {
                Dimension::Category => Some(r.category.label().to_string()),
                Dimension::Manufacturer => r.manufacturer,
                Dimension::Region => r.region,
                Dimension::None => None,
            })
            .collect())
    }

    async fn check_known(&self, dimension: Dimension, values: &[String]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let known = self.distinct_values(dimension).await?;
        match values.iter().find(|v| !known.contains(v.as_str())) {
            Some(value) => Err(QueryError::UnknownDimensionValue {
                dimension,
                value: value.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }
}

/// Which rows feed a series so manufacturer rows and category totals are never summed together
fn series_level<'a, I>(group_by: Dimension, filter: &RecordFilter, mut in_range: I) -> RecordLevel
where
    I: Iterator<Item = &'a RegistrationRecord>,
{
    if group_by == Dimension::Manufacturer || !filter.manufacturers.is_empty() {
        return RecordLevel::Manufacturer;
    }
    // National totals carry no region and drop out of a region grouping
    let by_region = group_by == Dimension::Region;
    if in_range.any(|r| r.is_category_total() && (!by_region || r.region.is_some())) {
        RecordLevel::CategoryTotal
    } else {
        RecordLevel::Manufacturer
    }
}

fn summarize(
    records: &[RegistrationRecord],
    range: &DateRange,
    filter: &RecordFilter,
) -> std::result::Result<Summary, QueryError> {
    let by_category = totals_by_dimension(&aggregate(records, Dimension::Category, Granularity::Month, range, filter)?);
    let total_registrations = by_category.values().sum();

    let manufacturer_filter = filter.clone().with_level(RecordLevel::Manufacturer);
    let by_manufacturer = totals_by_dimension(&aggregate(
        records,
        Dimension::Manufacturer,
        Granularity::Month,
        range,
        &manufacturer_filter,
    )?);
    let mut top: Vec<(String, u64)> = by_manufacturer.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let dates = records
        .iter()
        .filter(|r| range.contains(r.date) && filter.matches(r))
        .map(|r| r.date);
    let (first_date, last_date) = dates.fold((None, None), |(lo, hi): (Option<NaiveDate>, Option<NaiveDate>), d| {
        (Some(lo.map_or(d, |l| l.min(d))), Some(hi.map_or(d, |h| h.max(d))))
    });

    Ok(Summary {
        total_registrations,
        category_breakdown: by_category,
        top_manufacturers: top
            .into_iter()
            .take(TOP_MANUFACTURERS)
            .map(|(manufacturer, registrations)| ManufacturerTotal {
                manufacturer,
                registrations,
            })
            .collect(),
        first_date,
        last_date,
    })
}

/// Latest quarter whose final month has data, or the latest quarter when no
/// earlier quarter has any records
fn latest_complete_quarter(records: &[RegistrationRecord]) -> Option<PeriodKey> {
    let latest = records.iter().map(|r| r.date).max()?;
    let quarter = PeriodKey::of(latest, Granularity::Quarter);
    if latest.month() % 3 == 0 {
        return Some(quarter);
    }
    let (year, q) = previous_quarter(latest.year(), (latest.month() + 2) / 3);
    let previous = PeriodKey::quarter(year, q);
    if records.iter().any(|r| previous.contains(r.date)) {
        Some(previous)
    } else {
        Some(quarter)
    }
}

/// YoY insights by category and by manufacturer for the latest complete quarter
pub fn build_insights(records: &[RegistrationRecord], top_n: usize) -> std::result::Result<Vec<Insight>, QueryError> {
    let Some(quarter) = latest_complete_quarter(records) else {
        return Ok(Vec::new());
    };

    let category_level = if records.iter().any(|r| r.is_category_total()) {
        RecordLevel::CategoryTotal
    } else {
        RecordLevel::Manufacturer
    };

    let mut insights = Vec::new();
    for (dimension, level) in [
        (Dimension::Category, category_level),
        (Dimension::Manufacturer, RecordLevel::Manufacturer),
    ] {
        let filter = RecordFilter::default().with_level(level);
        let totals = aggregate(records, dimension, Granularity::Quarter, &DateRange::all(), &filter)?;
        let (current, history): (Aggregated, Aggregated) = totals
            .into_iter()
            .filter(|(key, _)| key.period <= quarter)
            .partition(|(key, _)| key.period == quarter);

        let growth = compute_growth(&current, &history, GrowthKind::YoY)?;
        insights.extend(rank_insights(dimension, &growth, &current, top_n));
    }
    Ok(insights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InsightKind;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(date: NaiveDate, category: VehicleCategory, manufacturer: Option<&str>, count: u64) -> RegistrationRecord {
        RegistrationRecord::new(date, category, manufacturer.map(str::to_string), None, count)
    }

    #[test]
    fn test_latest_complete_quarter() {
        let records = vec![
            rec(d(2024, 6, 1), VehicleCategory::TwoWheeler, None, 1),
            rec(d(2024, 7, 1), VehicleCategory::TwoWheeler, None, 1),
        ];
        assert_eq!(latest_complete_quarter(&records), Some(PeriodKey::quarter(2024, 2)));

        let partial_only = vec![rec(d(2024, 7, 1), VehicleCategory::TwoWheeler, None, 1)];
        assert_eq!(latest_complete_quarter(&partial_only), Some(PeriodKey::quarter(2024, 3)));
        assert_eq!(latest_complete_quarter(&[]), None);
    }

    #[test]
    fn test_build_insights_uses_category_totals() {
        let records = vec![
            rec(d(2023, 3, 1), VehicleCategory::TwoWheeler, None, 1000),
            rec(d(2024, 3, 1), VehicleCategory::TwoWheeler, None, 1500),
            rec(d(2023, 3, 1), VehicleCategory::FourWheeler, None, 500),
            rec(d(2024, 3, 1), VehicleCategory::FourWheeler, None, 450),
            rec(d(2023, 3, 1), VehicleCategory::TwoWheeler, Some("Hero"), 400),
            rec(d(2024, 3, 1), VehicleCategory::TwoWheeler, Some("Hero"), 600),
        ];
        let insights = build_insights(&records, 3).unwrap();

        let category_growth: Vec<(&str, f64)> = insights
            .iter()
            .filter(|i| i.dimension == Dimension::Category && i.kind == InsightKind::TopGrowth)
            .map(|i| (i.subject.as_str(), i.metric_value))
            .collect();
        assert_eq!(category_growth, vec![("2W", 50.0), ("4W", -10.0)]);

        let shares: Vec<(&str, f64)> = insights
            .iter()
            .filter(|i| i.dimension == Dimension::Category && i.kind == InsightKind::MarketShareLeader)
            .map(|i| (i.subject.as_str(), i.metric_value))
            .collect();
        assert_eq!(shares, vec![("2W", 76.92), ("4W", 23.08)]);

        assert!(insights
            .iter()
            .any(|i| i.dimension == Dimension::Manufacturer && i.subject == "Hero" && i.metric_value == 50.0));
    }
}
