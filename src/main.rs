use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use vehicle_registrations::api::AnalyticsService;
use vehicle_registrations::config::{init_tracing, Settings};
use vehicle_registrations::db::SurrealStore;

/// Print what the registration store currently holds
#[derive(Parser, Debug)]
#[command(name = "vehicle_registrations")]
#[command(about = "Overview of stored vehicle registrations")]
struct Args {
    #[command(flatten)]
    settings: Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.settings.log_level);

    let store = SurrealStore::open(&args.settings.db_path).await?;
    info!("Connected to SurrealDB at {}", args.settings.db_path);
    let service = AnalyticsService::from_settings(Arc::new(store), &args.settings);

    info!("=== Database Statistics ===");
    let stats = service.stats().await?;
    info!("Category total rows: {}", stats.category_rows);
    info!("Manufacturer rows: {}", stats.manufacturer_rows);
    match (stats.first_date, stats.latest_date) {
        (Some(first), Some(latest)) => info!("Data covers {} to {}", first, latest),
        _ => info!("Store is empty; run `ingest` first"),
    }

    let manufacturers = service.get_manufacturers().await?;
    info!("Manufacturers ({}): {}", manufacturers.len(), manufacturers.join(", "));

    let report = service.get_registrations(&Default::default()).await?;
    info!("Total registrations: {}", report.summary.total_registrations);
    for (category, count) in &report.summary.category_breakdown {
        info!("  {}: {}", category, count);
    }

    Ok(())
}
