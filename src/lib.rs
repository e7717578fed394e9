//! Vehicle registration analytics
//!
//! Normalizes raw registration exports, aggregates them by category,
//! manufacturer or region, and derives year-over-year and quarter-over-quarter
//! growth plus ranked market insights. Storage, acquisition and the REST
//! surface live in [`store`], [`db`], [`source`] and [`api`].

pub mod aggregate;
pub mod api;
pub mod category_names;
pub mod config;
pub mod db;
pub mod error;
pub mod growth;
pub mod insights;
pub mod models;
pub mod normalize;
pub mod period;
pub mod source;
pub mod store;

pub use aggregate::{aggregate, AggregateKey, Aggregated, DateRange, RecordFilter};
pub use error::{NormalizationError, QueryError, ServiceError};
pub use growth::compute_growth;
pub use insights::rank_insights;
pub use models::{Dimension, GrowthKind, GrowthMetric, Insight, InsightKind, RawRow, RegistrationRecord, VehicleCategory};
pub use normalize::{normalize, normalize_batch};
pub use period::{Granularity, PeriodKey};
