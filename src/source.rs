//! Raw row acquisition
//!
//! Sources yield loosely typed [`RawRow`]s; normalization happens downstream.

use anyhow::{Context, Result};
use chrono::{Datelike, Months, NaiveDate};
use csv::{ReaderBuilder, Trim};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::{RawRow, VehicleCategory};

pub trait RowSource: Send + Sync {
    fn rows(&self) -> Result<Vec<RawRow>>;

    /// Short description for logs and API responses
    fn describe(&self) -> String;
}

/// CSV export with a header row.
///
/// Columns: `date`, `category`, `count` (or `registrations`) and optionally
/// `manufacturer` and `region` (or `state`). Structurally broken lines are
/// skipped with a warning.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowSource for CsvSource {
    fn rows(&self) -> Result<Vec<RawRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;

        let mut rows = Vec::new();
        let mut skipped = 0;
        for (i, result) in reader.deserialize::<RawRow>().enumerate() {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => {
                    if skipped < 5 {
                        warn!("Skipping unreadable CSV line {}: {}", i + 2, e);
                    }
                    skipped += 1;
                }
            }
        }
        if skipped > 5 {
            warn!("{} unreadable CSV lines skipped in total", skipped);
        }
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Manufacturers in the sample data with their category and base monthly volume
pub const SAMPLE_MANUFACTURERS: [(&str, VehicleCategory, u64); 13] = [
    ("Hero MotoCorp", VehicleCategory::TwoWheeler, 20_000),
    ("TVS", VehicleCategory::TwoWheeler, 20_000),
    ("Bajaj", VehicleCategory::TwoWheeler, 20_000),
    ("Honda", VehicleCategory::TwoWheeler, 20_000),
    ("Yamaha", VehicleCategory::TwoWheeler, 20_000),
    ("Mahindra", VehicleCategory::ThreeWheeler, 2_000),
    ("Bajaj Auto", VehicleCategory::ThreeWheeler, 2_000),
    ("Piaggio", VehicleCategory::ThreeWheeler, 2_000),
    ("Maruti Suzuki", VehicleCategory::FourWheeler, 8_000),
    ("Hyundai", VehicleCategory::FourWheeler, 8_000),
    ("Tata", VehicleCategory::FourWheeler, 8_000),
    ("Mahindra", VehicleCategory::FourWheeler, 8_000),
    ("Kia", VehicleCategory::FourWheeler, 8_000),
];

/// Deterministic synthetic registrations.
///
/// Produces one category-total row per category and one row per sample
/// manufacturer for each of the `months` months ending at `anchor`, with
/// volumes growing year over year and a seeded jitter.
#[derive(Debug, Clone)]
pub struct SampleSource {
    pub anchor: NaiveDate,
    pub months: u32,
    pub seed: u64,
    /// Maximum relative jitter applied to each count (0.05 = ±5%)
    pub jitter: f64,
}

impl SampleSource {
    pub fn new(anchor: NaiveDate, months: u32, seed: u64) -> Self {
        Self {
            anchor,
            months,
            seed,
            jitter: 0.05,
        }
    }

    fn category_base(category: VehicleCategory) -> (u64, u64, u64) {
        // (base, per-month step, per-year step)
        match category {
            VehicleCategory::TwoWheeler => (150_000, 1_000, 5_000),
            VehicleCategory::ThreeWheeler => (8_000, 50, 300),
            VehicleCategory::FourWheeler => (45_000, 200, 1_500),
        }
    }
}

impl RowSource for SampleSource {
    fn rows(&self) -> Result<Vec<RawRow>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let first_of_anchor = self
            .anchor
            .with_day(1)
            .context("anchor date has no first day of month")?;
        let first_year = first_of_anchor
            .checked_sub_months(Months::new(self.months.saturating_sub(1)))
            .context("sample window starts before the supported date range")?
            .year();

        let mut rows = Vec::new();
        for back in (0..self.months).rev() {
            let date = first_of_anchor
                .checked_sub_months(Months::new(back))
                .context("sample window starts before the supported date range")?;
            let elapsed = u64::from(self.months - 1 - back);
            let years_in = u64::try_from(date.year() - first_year).unwrap_or(0);

            for category in VehicleCategory::ALL {
                let (base, step, yearly) = Self::category_base(category);
                let count = jittered(base + elapsed * step + years_in * yearly, self.jitter, &mut rng);
                rows.push(sample_row(date, category, None, count));
            }

            for (name, category, base) in SAMPLE_MANUFACTURERS {
                let step = base / 200;
                let count = jittered(base + elapsed * step, self.jitter, &mut rng);
                rows.push(sample_row(date, category, Some(name), count));
            }
        }
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("sample:{}m@{}#{}", self.months, self.anchor, self.seed)
    }
}

fn jittered(base: u64, jitter: f64, rng: &mut impl Rng) -> u64 {
    if jitter <= 0.0 {
        return base;
    }
    let factor = 1.0 + rng.gen_range(-jitter..=jitter);
    (base as f64 * factor).round().max(0.0) as u64
}

fn sample_row(date: NaiveDate, category: VehicleCategory, manufacturer: Option<&str>, count: u64) -> RawRow {
    RawRow {
        date: date.format("%Y-%m-%d").to_string(),
        category: category.label().to_string(),
        manufacturer: manufacturer.map(str::to_string),
        region: Some("All India".to_string()),
        count: count.to_string(),
    }
}
