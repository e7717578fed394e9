//! Runtime settings shared by the binaries

use clap::Args;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::period::Granularity;

/// Common settings, flattened into each binary's argument parser.
/// Every flag falls back to an environment variable.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Path to the SurrealDB (RocksDB) database directory
    #[arg(long, env = "DATABASE_PATH", default_value = "data/registrations.db")]
    pub db_path: String,

    /// Address the API server binds to
    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the API server listens on
    #[arg(long, env = "API_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Insights reported per kind
    #[arg(long, env = "INSIGHTS_TOP_N", default_value_t = 3)]
    pub top_n: usize,

    /// CSV export re-read on refresh
    #[arg(long, env = "DATA_SOURCE")]
    pub data_source: Option<PathBuf>,

    /// Period unit replaced as a whole when data is re-ingested
    #[arg(long, env = "INGEST_GRANULARITY", value_enum, default_value_t = Granularity::Month)]
    pub ingest_granularity: Granularity,
}

impl Settings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.into()),
        ))
        .init();
}
