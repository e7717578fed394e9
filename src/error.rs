//! Error taxonomy for the analytics engine

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Dimension;
use crate::period::{Granularity, PeriodKey};

/// Per-row failure raised while normalizing raw input
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
    #[error("unknown vehicle category: {0:?}")]
    UnknownCategory(String),
    #[error("invalid registration count: {0:?}")]
    InvalidCount(String),
}

/// Rejected query, returned synchronously to the caller
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("unknown {dimension} {value:?}")]
    UnknownDimensionValue { dimension: Dimension, value: String },
    #[error("quarter-over-quarter growth needs quarterly periods, got {0}")]
    GranularityMismatch(Granularity),
}

/// Error surfaced by the analytics service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    OutsidePeriod(#[from] OutsidePeriod),
    #[error("no data source configured for refresh")]
    NoDataSource,
    #[error("storage error: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Record handed to `replace_period` that does not belong to the period
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("record dated {date} falls outside period {period}")]
pub struct OutsidePeriod {
    pub date: NaiveDate,
    pub period: PeriodKey,
}
