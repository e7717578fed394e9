//! Calendar period indexing
//!
//! Derives year/month/quarter from a record date and builds the period keys
//! used to line up current and baseline values. Quarters follow the calendar
//! year: Q1 = Jan-Mar, Q2 = Apr-Jun, Q3 = Jul-Sep, Q4 = Oct-Dec.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::models::{GrowthKind, RegistrationRecord};

/// Period unit used for grouping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Month,
    Quarter,
}

impl Granularity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "month" | "monthly" => Some(Granularity::Month),
            "quarter" | "quarterly" => Some(Granularity::Quarter),
            _ => None,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Month => f.write_str("month"),
            Granularity::Quarter => f.write_str("quarter"),
        }
    }
}

/// Key aligning records for period-to-period comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeriodKey {
    Quarter { year: i32, quarter: u32 },
    Month { year: i32, month: u32 },
}

impl PeriodKey {
    pub fn quarter(year: i32, quarter: u32) -> Self {
        PeriodKey::Quarter { year, quarter }
    }

    pub fn month(year: i32, month: u32) -> Self {
        PeriodKey::Month { year, month }
    }

    pub fn of(date: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Month => PeriodKey::month(date.year(), date.month()),
            Granularity::Quarter => PeriodKey::quarter(date.year(), quarter_of(date.month())),
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            PeriodKey::Quarter { .. } => Granularity::Quarter,
            PeriodKey::Month { .. } => Granularity::Month,
        }
    }

    pub fn year(&self) -> i32 {
        match *self {
            PeriodKey::Quarter { year, .. } | PeriodKey::Month { year, .. } => year,
        }
    }

    /// Baseline period for a comparison kind.
    ///
    /// Returns `None` for quarter-over-quarter on a monthly key.
    pub fn baseline(&self, kind: GrowthKind) -> Option<PeriodKey> {
        match (kind, *self) {
            (GrowthKind::YoY, PeriodKey::Quarter { year, quarter }) => {
                let (y, q) = previous_year(year, quarter);
                Some(PeriodKey::quarter(y, q))
            }
            (GrowthKind::YoY, PeriodKey::Month { year, month }) => Some(PeriodKey::month(year - 1, month)),
            (GrowthKind::QoQ, PeriodKey::Quarter { year, quarter }) => {
                let (y, q) = previous_quarter(year, quarter);
                Some(PeriodKey::quarter(y, q))
            }
            (GrowthKind::QoQ, PeriodKey::Month { .. }) => None,
        }
    }

    /// First and last calendar day covered by the period
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let (year, first_month, months) = match *self {
            PeriodKey::Quarter { year, quarter } => (year, quarter.checked_sub(1)? * 3 + 1, 3),
            PeriodKey::Month { year, month } => (year, month, 1),
        };
        let start = NaiveDate::from_ymd_opt(year, first_month, 1)?;
        let end = start
            .checked_add_months(chrono::Months::new(months))?
            .pred_opt()?;
        Some((start, end))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        PeriodKey::of(date, self.granularity()) == *self
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Quarter { year, quarter } => write!(f, "{}-Q{}", year, quarter),
            PeriodKey::Month { year, month } => write!(f, "{}-{:02}", year, month),
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn quarter_of(month: u32) -> u32 {
    (month + 2) / 3
}

/// Populate year, month and quarter from the record date
pub fn index(mut record: RegistrationRecord) -> RegistrationRecord {
    record.year = record.date.year();
    record.month = record.date.month();
    record.quarter = quarter_of(record.month);
    record
}

pub fn previous_quarter(year: i32, quarter: u32) -> (i32, u32) {
    if quarter <= 1 {
        (year - 1, 4)
    } else {
        (year, quarter - 1)
    }
}

pub fn previous_year(year: i32, quarter: u32) -> (i32, u32) {
    (year - 1, quarter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VehicleCategory;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_quarter_boundaries() {
        let quarters: Vec<u32> = (1..=12).map(quarter_of).collect();
        assert_eq!(quarters, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }

    #[test]
    fn test_quarter_rollover() {
        assert_eq!(previous_quarter(2024, 1), (2023, 4));
        assert_eq!(previous_quarter(2024, 3), (2024, 2));
        assert_eq!(previous_year(2024, 1), (2023, 1));
    }

    #[test]
    fn test_index_overwrites_stale_fields() {
        let mut r = RegistrationRecord::new(d(2024, 2, 1), VehicleCategory::FourWheeler, None, None, 5);
        r.date = d(2023, 12, 1);
        let r = index(r);
        assert_eq!((r.year, r.month, r.quarter), (2023, 12, 4));
    }

    #[test]
    fn test_baselines() {
        let q1 = PeriodKey::quarter(2024, 1);
        assert_eq!(q1.baseline(GrowthKind::QoQ), Some(PeriodKey::quarter(2023, 4)));
        assert_eq!(q1.baseline(GrowthKind::YoY), Some(PeriodKey::quarter(2023, 1)));
        let m = PeriodKey::month(2024, 3);
        assert_eq!(m.baseline(GrowthKind::YoY), Some(PeriodKey::month(2023, 3)));
        assert_eq!(m.baseline(GrowthKind::QoQ), None);
    }

    #[test]
    fn test_bounds_and_contains() {
        let q = PeriodKey::quarter(2024, 1);
        assert_eq!(q.bounds(), Some((d(2024, 1, 1), d(2024, 3, 31))));
        let feb = PeriodKey::month(2023, 2);
        assert_eq!(feb.bounds(), Some((d(2023, 2, 1), d(2023, 2, 28))));
        let dec = PeriodKey::month(2023, 12);
        assert_eq!(dec.bounds(), Some((d(2023, 12, 1), d(2023, 12, 31))));
        assert!(q.contains(d(2024, 3, 31)));
        assert!(!q.contains(d(2024, 4, 1)));
    }

    #[test]
    fn test_display_and_order() {
        assert_eq!(PeriodKey::quarter(2024, 2).to_string(), "2024-Q2");
        assert_eq!(PeriodKey::month(2024, 2).to_string(), "2024-02");
        assert!(PeriodKey::quarter(2023, 4) < PeriodKey::quarter(2024, 1));
        assert_eq!(serde_json::to_string(&PeriodKey::quarter(2024, 4)).unwrap(), "\"2024-Q4\"");
    }
}
