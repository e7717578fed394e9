//! Sample registration data generator
//!
//! Writes a CSV in the export layout `ingest` reads: category totals and
//! per-manufacturer rows for each month, with seeded jitter.
//!
//! Usage:
//!   cargo run --release --bin generate_sample -- [OPTIONS]
//!
//! Options:
//!   --months <N>       Months of history (default: 24)
//!   --end <DATE>       Last month to generate, YYYY-MM-DD (default: today)
//!   --seed <N>         Random seed (default: 42)
//!   --jitter <F>       Maximum relative jitter per count (default: 0.05)
//!   --output <PATH>    Output CSV path (default: data/sample_registrations.csv)

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use csv::WriterBuilder;
use std::path::PathBuf;
use vehicle_registrations::normalize::parse_date;
use vehicle_registrations::source::{RowSource, SampleSource};

#[derive(Parser, Debug)]
#[command(name = "generate_sample")]
#[command(about = "Generate sample vehicle registration data")]
struct Args {
    /// Months of history to generate
    #[arg(long, default_value = "24")]
    months: u32,

    /// Last month to generate (defaults to today)
    #[arg(long, value_parser = parse_end)]
    end: Option<NaiveDate>,

    /// Random seed for reproducibility
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Maximum relative jitter per count (0.0 - 1.0)
    #[arg(long, default_value = "0.05")]
    jitter: f64,

    /// Output CSV path
    #[arg(long, default_value = "data/sample_registrations.csv")]
    output: PathBuf,
}

fn parse_end(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("unrecognized date {:?}", s))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let end = args.end.unwrap_or_else(|| Local::now().date_naive());
    let mut source = SampleSource::new(end, args.months, args.seed);
    source.jitter = args.jitter.clamp(0.0, 1.0);

    println!("🔧 Sample Data Generator");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Output:           {}", args.output.display());
    println!("Months:           {} (ending {})", args.months, end.format("%Y-%m"));
    println!("Jitter:           ±{:.1}%", source.jitter * 100.0);
    println!("Random seed:      {}", args.seed);
    println!();

    // Ensure output directory exists
    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let rows = source.rows()?;

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    println!("✅ Generation complete!");
    println!("Rows written:      {:>8}", rows.len());
    println!("Output file:       {}", args.output.display());

    Ok(())
}
