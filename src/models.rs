use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::category_names::{display_name, lookup_category};
use crate::period::{self, PeriodKey};

/// Raw row as yielded by an acquisition source (CSV export, sample generator)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawRow {
    pub date: String,
    pub category: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default, alias = "state")]
    pub region: Option<String>,
    #[serde(alias = "registrations")]
    pub count: String,
}

/// Vehicle category enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VehicleCategory {
    #[serde(rename = "2W")]
    TwoWheeler,
    #[serde(rename = "3W")]
    ThreeWheeler,
    #[serde(rename = "4W")]
    FourWheeler,
}

impl VehicleCategory {
    pub const ALL: [VehicleCategory; 3] = [
        VehicleCategory::TwoWheeler,
        VehicleCategory::ThreeWheeler,
        VehicleCategory::FourWheeler,
    ];

    /// Short label used in exports and as the aggregation dimension value
    pub fn label(&self) -> &'static str {
        match self {
            VehicleCategory::TwoWheeler => "2W",
            VehicleCategory::ThreeWheeler => "3W",
            VehicleCategory::FourWheeler => "4W",
        }
    }

    pub fn display_name(&self) -> &'static str {
        display_name(*self)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        lookup_category(label)
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical registration record
///
/// `year`, `month` and `quarter` are always derived from `date`; build records
/// through [`RegistrationRecord::new`] or re-derive with [`period::index`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    pub category: VehicleCategory,
    pub manufacturer: Option<String>,
    pub region: Option<String>,
    pub count: u64,
}

impl RegistrationRecord {
    pub fn new(
        date: NaiveDate,
        category: VehicleCategory,
        manufacturer: Option<String>,
        region: Option<String>,
        count: u64,
    ) -> Self {
        period::index(Self {
            date,
            year: 0,
            month: 0,
            quarter: 0,
            category,
            manufacturer,
            region,
            count,
        })
    }

    /// Category-only total (no manufacturer breakdown)
    pub fn is_category_total(&self) -> bool {
        self.manufacturer.is_none()
    }
}

/// Which kind of rows a query looks at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordLevel {
    /// Rows without a manufacturer
    CategoryTotal,
    /// Rows attributed to a manufacturer
    Manufacturer,
}

/// Grouping axis for aggregation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Category,
    Manufacturer,
    Region,
    None,
}

impl Dimension {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "category" => Some(Dimension::Category),
            "manufacturer" => Some(Dimension::Manufacturer),
            "region" | "state" => Some(Dimension::Region),
            "none" | "total" => Some(Dimension::None),
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Dimension::Category => "category",
            Dimension::Manufacturer => "manufacturer",
            Dimension::Region => "region",
            Dimension::None => "none",
        };
        f.write_str(s)
    }
}

/// Comparison kind for growth metrics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GrowthKind {
    #[serde(rename = "yoy")]
    YoY,
    #[serde(rename = "qoq")]
    QoQ,
}

impl fmt::Display for GrowthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrowthKind::YoY => f.write_str("YoY"),
            GrowthKind::QoQ => f.write_str("QoQ"),
        }
    }
}

/// Period-over-period change for one dimension value
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GrowthMetric {
    pub dimension_value: String,
    pub kind: GrowthKind,
    pub current_period: PeriodKey,
    pub baseline_period: PeriodKey,
    pub current_value: u64,
    /// `None` when the baseline period has no data at all
    pub baseline_value: Option<u64>,
    /// `None` when the baseline is absent or zero
    pub percent_change: Option<f64>,
    pub absolute_change: i64,
}

impl GrowthMetric {
    /// Percent change formatted for display, `N/A` when undefined
    pub fn percent_label(&self) -> String {
        match self.percent_change {
            Some(p) => format!("{:+.2}%", p),
            None => "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    TopGrowth,
    TopDecline,
    MarketShareLeader,
}

/// Ranked market insight
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Insight {
    pub kind: InsightKind,
    pub dimension: Dimension,
    pub subject: String,
    /// Percent change for growth kinds, percent share for market share
    pub metric_value: f64,
    pub period: PeriodKey,
    pub rank: usize,
    pub headline: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_derives_period_fields() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        let r = RegistrationRecord::new(date, VehicleCategory::TwoWheeler, None, None, 10);
        assert_eq!((r.year, r.month, r.quarter), (2024, 11, 4));
        assert!(r.is_category_total());
    }

    #[test]
    fn test_category_serializes_as_short_label() {
        let json = serde_json::to_string(&VehicleCategory::ThreeWheeler).unwrap();
        assert_eq!(json, "\"3W\"");
        let back: VehicleCategory = serde_json::from_str("\"4W\"").unwrap();
        assert_eq!(back, VehicleCategory::FourWheeler);
    }

    #[test]
    fn test_raw_row_accepts_export_column_aliases() {
        let row: RawRow = serde_json::from_str(
            r#"{"date":"2024-01-01","category":"2W","state":"Kerala","registrations":"1,200"}"#,
        )
        .unwrap();
        assert_eq!(row.region.as_deref(), Some("Kerala"));
        assert_eq!(row.count, "1,200");
        assert_eq!(row.manufacturer, None);
    }

    #[test]
    fn test_dimension_parse() {
        assert_eq!(Dimension::parse("Manufacturer"), Some(Dimension::Manufacturer));
        assert_eq!(Dimension::parse("state"), Some(Dimension::Region));
        assert_eq!(Dimension::parse("colour"), None);
    }
}
