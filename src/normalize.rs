//! Record normalization
//!
//! Turns loosely formatted rows from an acquisition source into canonical
//! [`RegistrationRecord`]s. Every rejected row carries a typed reason so the
//! ingestion report can surface it for review instead of dropping it.

use chrono::NaiveDate;
use serde::Serialize;

use crate::category_names::lookup_category;
use crate::error::NormalizationError;
use crate::models::{RawRow, RegistrationRecord};

/// Region labels that denote the national total
const NATIONAL_LABELS: [&str; 3] = ["all india", "india", "national"];

/// Normalize one raw row
pub fn normalize(raw: &RawRow) -> Result<RegistrationRecord, NormalizationError> {
    let date = parse_date(&raw.date).ok_or_else(|| NormalizationError::InvalidDate(raw.date.clone()))?;
    let category =
        lookup_category(&raw.category).ok_or_else(|| NormalizationError::UnknownCategory(raw.category.clone()))?;
    let count = parse_count(&raw.count)?;

    Ok(RegistrationRecord::new(
        date,
        category,
        clean_text(raw.manufacturer.as_deref()),
        clean_region(raw.region.as_deref()),
        count,
    ))
}

/// Row rejected during a batch
#[derive(Debug, Clone, Serialize)]
pub struct RowFailure {
    /// Zero-based position of the row in the batch
    pub row: usize,
    pub raw: RawRow,
    #[serde(serialize_with = "serialize_display")]
    pub error: NormalizationError,
}

fn serialize_display<S: serde::Serializer>(e: &NormalizationError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(e)
}

#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub records: Vec<RegistrationRecord>,
    pub failures: Vec<RowFailure>,
}

/// Normalize a batch, keeping good rows and collecting failures
pub fn normalize_batch<I>(rows: I) -> NormalizedBatch
where
    I: IntoIterator<Item = RawRow>,
{
    let mut batch = NormalizedBatch::default();
    for (row, raw) in rows.into_iter().enumerate() {
        match normalize(&raw) {
            Ok(record) => batch.records.push(record),
            Err(error) => batch.failures.push(RowFailure { row, raw, error }),
        }
    }
    batch
}

/// Parse the date representations seen in registration exports.
///
/// ISO dates, day-first dates with 4- or 2-digit years, month names
/// (`Mar 2024`), `YYYY-MM` and bare years are accepted. Month and year
/// forms resolve to the first day of the period.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let head = s.split(['/', '-']).next().unwrap_or_default();
    if head.len() == 4 && head.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(d);
        }
        if let Ok(d) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
            return Some(d);
        }
        if s.len() == 4 {
            let year: i32 = s.parse().ok()?;
            return NaiveDate::from_ymd_opt(year, 1, 1);
        }
        return None;
    }

    let short_year = s.rsplit(['/', '-']).next().is_some_and(|tail| tail.len() == 2);
    let day_first: [&str; 2] = if short_year {
        ["%d/%m/%y", "%d-%m-%y"]
    } else {
        ["%d/%m/%Y", "%d-%m-%Y"]
    };
    for fmt in day_first {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    let with_day = format!("1 {}", s);
    for fmt in ["%d %b %Y", "%d %B %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(&with_day, fmt) {
            return Some(d);
        }
    }
    None
}

/// Parse a non-negative integer count, tolerating thousands separators
pub fn parse_count(s: &str) -> Result<u64, NormalizationError> {
    let invalid = || NormalizationError::InvalidCount(s.to_string());
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() || cleaned.starts_with('-') {
        return Err(invalid());
    }
    if let Ok(n) = cleaned.parse::<u64>() {
        return Ok(n);
    }
    // Integer-valued decimals such as "1500.0"
    match cleaned.split_once('.') {
        Some((int, frac)) if !int.is_empty() && frac.chars().all(|c| c == '0') => {
            int.parse::<u64>().map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

fn clean_text(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn clean_region(s: Option<&str>) -> Option<String> {
    clean_text(s).filter(|r| !NATIONAL_LABELS.contains(&r.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VehicleCategory;

    fn raw(date: &str, category: &str, count: &str) -> RawRow {
        RawRow {
            date: date.to_string(),
            category: category.to_string(),
            manufacturer: Some("  Hero MotoCorp ".to_string()),
            region: Some("All India".to_string()),
            count: count.to_string(),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_normalize_valid_row() {
        let r = normalize(&raw("2024-04-01", "Two Wheeler", "1,23,456")).unwrap();
        assert_eq!(r.date, d(2024, 4, 1));
        assert_eq!(r.quarter, 2);
        assert_eq!(r.category, VehicleCategory::TwoWheeler);
        assert_eq!(r.manufacturer.as_deref(), Some("Hero MotoCorp"));
        assert_eq!(r.region, None);
        assert_eq!(r.count, 123_456);
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_date("15/08/2023"), Some(d(2023, 8, 15)));
        assert_eq!(parse_date("15-08-2023"), Some(d(2023, 8, 15)));
        assert_eq!(parse_date("01/02/24"), Some(d(2024, 2, 1)));
        assert_eq!(parse_date("Mar 2024"), Some(d(2024, 3, 1)));
        assert_eq!(parse_date("March 2024"), Some(d(2024, 3, 1)));
        assert_eq!(parse_date("2024-07"), Some(d(2024, 7, 1)));
        assert_eq!(parse_date("2022"), Some(d(2022, 1, 1)));
    }

    #[test]
    fn test_invalid_date() {
        let err = normalize(&raw("31/02/2024", "2W", "10")).unwrap_err();
        assert_eq!(err, NormalizationError::InvalidDate("31/02/2024".to_string()));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_unknown_category_is_surfaced() {
        let err = normalize(&raw("2024-01-01", "Tractor", "10")).unwrap_err();
        assert_eq!(err, NormalizationError::UnknownCategory("Tractor".to_string()));
    }

    #[test]
    fn test_counts() {
        assert_eq!(parse_count("1500"), Ok(1500));
        assert_eq!(parse_count(" 1,500.00 "), Ok(1500));
        assert_eq!(parse_count("0"), Ok(0));
        assert!(parse_count("-3").is_err());
        assert!(parse_count("12.5").is_err());
        assert!(parse_count("n/a").is_err());
        assert!(parse_count("").is_err());
    }

    #[test]
    fn test_region_labels() {
        let mut row = raw("2024-01-01", "4W", "5");
        row.region = Some("Maharashtra ".to_string());
        assert_eq!(normalize(&row).unwrap().region.as_deref(), Some("Maharashtra"));
        row.region = Some("".to_string());
        assert_eq!(normalize(&row).unwrap().region, None);
    }

    #[test]
    fn test_batch_keeps_good_rows() {
        let rows = vec![
            raw("2024-01-01", "2W", "100"),
            raw("garbage", "2W", "100"),
            raw("2024-02-01", "3W", "-1"),
            raw("2024-03-01", "4W", "300"),
        ];
        let batch = normalize_batch(rows);
        assert_eq!(batch.records.len(), 2);
        let failed: Vec<usize> = batch.failures.iter().map(|f| f.row).collect();
        assert_eq!(failed, vec![1, 2]);
        assert!(matches!(batch.failures[1].error, NormalizationError::InvalidCount(_)));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let row = raw("Jan 2023", "scooter", "42");
        assert_eq!(normalize(&row), normalize(&row));
        let bad = raw("2023-13-01", "scooter", "42");
        assert_eq!(normalize(&bad), normalize(&bad));
    }
}
