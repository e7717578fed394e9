//! Grouped sums of registration counts per period

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::QueryError;
use crate::models::{Dimension, RecordLevel, RegistrationRecord, VehicleCategory};
use crate::period::{Granularity, PeriodKey};

/// Dimension value used when grouping by [`Dimension::None`]
pub const TOTAL_LABEL: &str = "Total";

/// Inclusive date range; a missing bound is open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(Some(start), Some(end))
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_period(period: PeriodKey) -> Option<Self> {
        period.bounds().map(|(start, end)| Self::between(start, end))
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => Err(QueryError::InvalidDateRange { start, end }),
            _ => Ok(()),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    /// Stretch both bounds out to whole periods of `granularity`
    pub fn widen_to(&self, granularity: Granularity) -> Self {
        let bounds = |date: NaiveDate| PeriodKey::of(date, granularity).bounds();
        Self {
            start: self.start.map(|s| bounds(s).map_or(s, |(first, _)| first)),
            end: self.end.map(|e| bounds(e).map_or(e, |(_, last)| last)),
        }
    }
}

/// Subset filter applied before grouping. Empty lists match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordFilter {
    pub categories: Vec<VehicleCategory>,
    pub manufacturers: Vec<String>,
    pub regions: Vec<String>,
    pub level: Option<RecordLevel>,
}

impl RecordFilter {
    pub fn with_level(mut self, level: RecordLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn matches(&self, record: &RegistrationRecord) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&record.category) {
            return false;
        }
        if !self.manufacturers.is_empty()
            && !record
                .manufacturer
                .as_ref()
                .is_some_and(|m| self.manufacturers.contains(m))
        {
            return false;
        }
        if !self.regions.is_empty() && !record.region.as_ref().is_some_and(|r| self.regions.contains(r)) {
            return false;
        }
        match self.level {
            Some(RecordLevel::CategoryTotal) => record.manufacturer.is_none(),
            Some(RecordLevel::Manufacturer) => record.manufacturer.is_some(),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AggregateKey {
    pub dimension_value: String,
    pub period: PeriodKey,
}

impl AggregateKey {
    pub fn new(dimension_value: impl Into<String>, period: PeriodKey) -> Self {
        Self {
            dimension_value: dimension_value.into(),
            period,
        }
    }
}

/// Summed counts keyed by (dimension value, period)
pub type Aggregated = BTreeMap<AggregateKey, u64>;

/// Group and sum records.
///
/// Records outside `range` or rejected by `filter` are skipped, as are records
/// with no value on the grouping dimension (no manufacturer when grouping by
/// manufacturer, no region when grouping by region).
pub fn aggregate(
    records: &[RegistrationRecord],
    group_by: Dimension,
    granularity: Granularity,
    range: &DateRange,
    filter: &RecordFilter,
) -> Result<Aggregated, QueryError> {
    range.validate()?;

    let mut out = Aggregated::new();
    for record in records {
        if !range.contains(record.date) || !filter.matches(record) {
            continue;
        }
        let Some(value) = dimension_value(record, group_by) else {
            continue;
        };
        let key = AggregateKey::new(value, PeriodKey::of(record.date, granularity));
        let entry = out.entry(key).or_insert(0);
        *entry = entry.saturating_add(record.count);
    }
    Ok(out)
}

fn dimension_value(record: &RegistrationRecord, group_by: Dimension) -> Option<String> {
    match group_by {
        Dimension::Category => Some(record.category.label().to_string()),
        Dimension::Manufacturer => record.manufacturer.clone(),
        Dimension::Region => record.region.clone(),
        Dimension::None => Some(TOTAL_LABEL.to_string()),
    }
}

/// Sum across dimension values for each period
pub fn totals_by_period(aggregated: &Aggregated) -> BTreeMap<PeriodKey, u64> {
    let mut out = BTreeMap::new();
    for (key, count) in aggregated {
        let entry = out.entry(key.period).or_insert(0u64);
        *entry = entry.saturating_add(*count);
    }
    out
}

/// Sum across periods for each dimension value
pub fn totals_by_dimension(aggregated: &Aggregated) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    for (key, count) in aggregated {
        let entry = out.entry(key.dimension_value.clone()).or_insert(0u64);
        *entry = entry.saturating_add(*count);
    }
    out
}

pub fn latest_period(aggregated: &Aggregated) -> Option<PeriodKey> {
    aggregated.keys().map(|k| k.period).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(date: NaiveDate, category: VehicleCategory, manufacturer: Option<&str>, region: Option<&str>, count: u64) -> RegistrationRecord {
        RegistrationRecord::new(
            date,
            category,
            manufacturer.map(str::to_string),
            region.map(str::to_string),
            count,
        )
    }

    fn sample() -> Vec<RegistrationRecord> {
        vec![
            rec(d(2024, 1, 1), VehicleCategory::TwoWheeler, Some("Hero"), Some("Kerala"), 100),
            rec(d(2024, 2, 1), VehicleCategory::TwoWheeler, Some("Hero"), None, 50),
            rec(d(2024, 2, 1), VehicleCategory::TwoWheeler, Some("TVS"), Some("Kerala"), 70),
            rec(d(2024, 4, 1), VehicleCategory::FourWheeler, Some("Tata"), Some("Goa"), 30),
            rec(d(2024, 4, 1), VehicleCategory::FourWheeler, None, None, 400),
        ]
    }

    #[test]
    fn test_group_by_manufacturer_skips_totals() {
        let agg = aggregate(&sample(), Dimension::Manufacturer, Granularity::Quarter, &DateRange::all(), &RecordFilter::default()).unwrap();
        assert_eq!(agg.get(&AggregateKey::new("Hero", PeriodKey::quarter(2024, 1))), Some(&150));
        assert_eq!(agg.get(&AggregateKey::new("TVS", PeriodKey::quarter(2024, 1))), Some(&70));
        assert_eq!(agg.get(&AggregateKey::new("Tata", PeriodKey::quarter(2024, 2))), Some(&30));
        assert_eq!(agg.len(), 3);
    }

    #[test]
    fn test_group_by_region_skips_national_rows() {
        let agg = aggregate(&sample(), Dimension::Region, Granularity::Quarter, &DateRange::all(), &RecordFilter::default()).unwrap();
        assert_eq!(agg.get(&AggregateKey::new("Kerala", PeriodKey::quarter(2024, 1))), Some(&170));
        assert_eq!(agg.get(&AggregateKey::new("Goa", PeriodKey::quarter(2024, 2))), Some(&30));
        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn test_range_is_inclusive() {
        let range = DateRange::between(d(2024, 2, 1), d(2024, 4, 1));
        let agg = aggregate(&sample(), Dimension::None, Granularity::Month, &range, &RecordFilter::default()).unwrap();
        assert_eq!(agg.get(&AggregateKey::new(TOTAL_LABEL, PeriodKey::month(2024, 2))), Some(&120));
        assert_eq!(agg.get(&AggregateKey::new(TOTAL_LABEL, PeriodKey::month(2024, 4))), Some(&430));
        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn test_widen_to_whole_periods() {
        let range = DateRange::between(d(2024, 2, 10), d(2024, 4, 15));
        assert_eq!(range.widen_to(Granularity::Quarter), DateRange::between(d(2024, 1, 1), d(2024, 6, 30)));
        assert_eq!(range.widen_to(Granularity::Month), DateRange::between(d(2024, 2, 1), d(2024, 4, 30)));

        let open = DateRange::new(Some(d(2024, 11, 3)), None);
        assert_eq!(open.widen_to(Granularity::Quarter), DateRange::new(Some(d(2024, 10, 1)), None));
        assert_eq!(DateRange::all().widen_to(Granularity::Quarter), DateRange::all());
    }

    #[test]
    fn test_filters() {
        let filter = RecordFilter {
            categories: vec![VehicleCategory::FourWheeler],
            ..Default::default()
        }
        .with_level(RecordLevel::CategoryTotal);
        let agg = aggregate(&sample(), Dimension::Category, Granularity::Quarter, &DateRange::all(), &filter).unwrap();
        assert_eq!(agg.into_iter().collect::<Vec<_>>(), vec![(AggregateKey::new("4W", PeriodKey::quarter(2024, 2)), 400)]);

        let filter = RecordFilter {
            manufacturers: vec!["TVS".to_string()],
            ..Default::default()
        };
        let agg = aggregate(&sample(), Dimension::Category, Granularity::Quarter, &DateRange::all(), &filter).unwrap();
        assert_eq!(agg.values().sum::<u64>(), 70);
    }

    #[test]
    fn test_empty_input_is_empty_mapping() {
        let agg = aggregate(&[], Dimension::Category, Granularity::Month, &DateRange::all(), &RecordFilter::default()).unwrap();
        assert!(agg.is_empty());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let range = DateRange::between(d(2024, 5, 1), d(2024, 1, 1));
        let err = aggregate(&sample(), Dimension::Category, Granularity::Month, &range, &RecordFilter::default()).unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidDateRange {
                start: d(2024, 5, 1),
                end: d(2024, 1, 1)
            }
        );
    }

    #[test]
    fn test_totals_helpers() {
        let agg = aggregate(&sample(), Dimension::Category, Granularity::Quarter, &DateRange::all(), &RecordFilter::default()).unwrap();
        let by_period = totals_by_period(&agg);
        assert_eq!(by_period.get(&PeriodKey::quarter(2024, 1)), Some(&220));
        assert_eq!(by_period.get(&PeriodKey::quarter(2024, 2)), Some(&430));
        assert_eq!(totals_by_dimension(&agg).get("2W"), Some(&220));
        assert_eq!(latest_period(&agg), Some(PeriodKey::quarter(2024, 2)));
    }
}
