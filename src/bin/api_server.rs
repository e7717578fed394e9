//! REST API server for vehicle registration analytics
//!
//! Usage:
//!   ./target/release/api_server [options]
//!
//! Options (each also read from the environment):
//!   --port PORT            Port to listen on (API_PORT, default: 8000)
//!   --host HOST            Bind address (API_HOST, default: 0.0.0.0)
//!   --db-path PATH         SurrealDB directory (DATABASE_PATH, default: data/registrations.db)
//!   --data-source CSV      Export re-read by POST /api/refresh-data (DATA_SOURCE)
//!   --sample-if-empty      Load generated sample data when the store is empty
//!
//! REST endpoints:
//!   GET  /                    - Health and data status
//!   GET  /api/registrations   - Series with YoY/QoQ growth and summary
//!   GET  /api/insights        - Ranked market insights
//!   GET  /api/manufacturers   - Known manufacturers
//!   POST /api/refresh-data    - Re-ingest the configured data source

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use vehicle_registrations::api::{create_router, AnalyticsService};
use vehicle_registrations::config::{init_tracing, Settings};
use vehicle_registrations::db::SurrealStore;
use vehicle_registrations::source::{RowSource, SampleSource};

#[derive(Parser, Debug)]
#[command(name = "api_server")]
#[command(about = "Serve registration analytics over REST")]
struct Args {
    /// Load 24 months of generated sample data when the store is empty
    #[arg(long)]
    sample_if_empty: bool,

    #[command(flatten)]
    settings: Settings,
}

fn print_banner(addr: &SocketAddr) {
    println!("============================================================");
    println!("        VEHICLE REGISTRATION ANALYTICS API SERVER");
    println!("============================================================");
    println!();
    println!("  REST:     http://{}/", addr);
    println!();
    println!("REST Endpoints:");
    println!("  GET  /                      Health and data status");
    println!("  GET  /api/registrations     Series, YoY/QoQ, summary");
    println!("  GET  /api/insights          Ranked insights");
    println!("  GET  /api/manufacturers     Manufacturer list");
    println!("  POST /api/refresh-data      Re-ingest data source");
    println!();
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.settings.log_level);

    let store = SurrealStore::open(&args.settings.db_path).await?;
    let service = Arc::new(AnalyticsService::from_settings(Arc::new(store), &args.settings));

    if args.sample_if_empty && service.stats().await?.total_rows() == 0 {
        let sample = SampleSource::new(Local::now().date_naive(), 24, 42);
        tracing::info!("Store is empty, loading {}", sample.describe());
        let report = service.ingest(sample.rows()?).await?;
        tracing::info!("Loaded {} sample records", report.records_ingested);
    }

    let addr: SocketAddr = args.settings.bind_addr().parse()?;
    print_banner(&addr);

    let app = create_router(service);
    tracing::info!("Starting REST server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
