//! Load a registration CSV export into SurrealDB
//!
//! Usage:
//!   cargo run --release --bin ingest -- --input raw-data/registrations.csv
//!
//! Every period touched by the file is replaced as a whole, so re-running
//! the same export never duplicates rows. Rejected rows are listed at the end.
//!
//! Replacement covers both row kinds in a period: a file holding only
//! manufacturer rows for a month also clears that month's category totals,
//! and the other way round. Keep both kinds in one export per period.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use vehicle_registrations::api::AnalyticsService;
use vehicle_registrations::config::{init_tracing, Settings};
use vehicle_registrations::db::SurrealStore;
use vehicle_registrations::source::{CsvSource, RowSource};

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Normalize a registration CSV and store it")]
#[command(
    long_about = "Normalize a registration CSV and store it.\n\n\
Each period the file touches (INGEST_GRANULARITY, month by default) is replaced \
as a whole, category totals and manufacturer rows alike. A file carrying only \
manufacturer rows for a month removes that month's category totals, and the \
other way round, so export both kinds together."
)]
struct Args {
    /// CSV export to load (defaults to DATA_SOURCE)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Rejected rows to print in the report
    #[arg(long, default_value = "20")]
    show_failures: usize,

    #[command(flatten)]
    settings: Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.settings.log_level);

    let input = args
        .input
        .or_else(|| args.settings.data_source.clone())
        .context("no input given: pass --input or set DATA_SOURCE")?;

    info!("Connecting to SurrealDB at {}", args.settings.db_path);
    let store = SurrealStore::open(&args.settings.db_path).await?;
    let service = AnalyticsService::from_settings(Arc::new(store), &args.settings);

    let source = CsvSource::new(&input);
    info!("Reading CSV from {:?}", source.path());
    let rows = source.rows()?;
    info!("Parsed {} rows from CSV", rows.len());

    let report = service.ingest(rows).await?;

    println!("\n✅ Ingestion complete!");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Rows read:         {:>8}", report.rows_read);
    println!("Records stored:    {:>8}", report.records_ingested);
    println!("Rows rejected:     {:>8}", report.failures.len());
    println!("Periods replaced:  {:>8}", report.periods_replaced.len());
    if let (Some(first), Some(last)) = (report.periods_replaced.first(), report.periods_replaced.last()) {
        println!("Coverage:          {} .. {}", first, last);
    }

    if !report.failures.is_empty() {
        println!("\n⚠️  Rejected rows:");
        for failure in report.failures.iter().take(args.show_failures) {
            println!("   row {:>6}: {}", failure.row + 1, failure.error);
        }
        if report.failures.len() > args.show_failures {
            println!("   ... and {} more", report.failures.len() - args.show_failures);
        }
    }

    Ok(())
}
