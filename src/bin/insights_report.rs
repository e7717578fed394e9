//! Console report of ranked insights and growth
//!
//! Usage:
//!   cargo run --release --bin insights_report -- [--group-by manufacturer] [--start 2024-01-01]

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use num_format::{Locale, ToFormattedString};
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};
use vehicle_registrations::api::{AnalyticsService, RegistrationQuery};
use vehicle_registrations::config::{init_tracing, Settings};
use vehicle_registrations::db::SurrealStore;
use vehicle_registrations::models::{Dimension, GrowthMetric};
use vehicle_registrations::normalize::parse_date;
use vehicle_registrations::period::Granularity;

#[derive(Parser, Debug)]
#[command(name = "insights_report")]
#[command(about = "Print ranked insights and growth tables")]
struct Args {
    /// Grouping for the growth tables: category, manufacturer, region or none
    #[arg(long, default_value = "category", value_parser = parse_dimension)]
    group_by: Dimension,

    /// Series granularity for the YoY table
    #[arg(long, value_enum, default_value_t = Granularity::Quarter)]
    granularity: Granularity,

    #[arg(long, value_parser = parse_day)]
    start: Option<NaiveDate>,

    #[arg(long, value_parser = parse_day)]
    end: Option<NaiveDate>,

    /// Maximum rows per growth table
    #[arg(long, default_value = "20")]
    max_rows: usize,

    #[command(flatten)]
    settings: Settings,
}

fn parse_dimension(s: &str) -> Result<Dimension, String> {
    Dimension::parse(s).ok_or_else(|| format!("unknown dimension {:?}", s))
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("unrecognized date {:?}", s))
}

#[derive(Tabled, Clone)]
struct InsightRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Dimension")]
    dimension: String,
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Headline")]
    headline: String,
}

#[derive(Tabled, Clone)]
struct GrowthRow {
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Baseline")]
    baseline_period: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Previous")]
    previous: String,
    #[tabled(rename = "Change")]
    change: String,
}

impl From<&GrowthMetric> for GrowthRow {
    fn from(m: &GrowthMetric) -> Self {
        Self {
            subject: m.dimension_value.clone(),
            period: m.current_period.to_string(),
            baseline_period: m.baseline_period.to_string(),
            current: m.current_value.to_formatted_string(&Locale::en),
            previous: m
                .baseline_value
                .map(|v| v.to_formatted_string(&Locale::en))
                .unwrap_or_else(|| "-".to_string()),
            change: m.percent_label(),
        }
    }
}

fn print_table<T: Tabled + Clone>(title: &str, rows: &[T], max_rows: usize) {
    println!("\n{}", title);
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    println!("{}\n", Table::new(slice).with(Style::markdown()));
}

/// Most recent periods first so truncated tables keep the latest rows
fn latest_first(metrics: &[GrowthMetric]) -> Vec<GrowthRow> {
    let mut sorted: Vec<&GrowthMetric> = metrics.iter().collect();
    sorted.sort_by(|a, b| {
        b.current_period
            .cmp(&a.current_period)
            .then_with(|| a.dimension_value.cmp(&b.dimension_value))
    });
    sorted.into_iter().map(GrowthRow::from).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.settings.log_level);

    let store = SurrealStore::open(&args.settings.db_path).await?;
    let service = AnalyticsService::from_settings(Arc::new(store), &args.settings);

    let insights = service.get_insights().await?;
    let rows: Vec<InsightRow> = insights
        .iter()
        .map(|i| InsightRow {
            kind: format!("{:?}", i.kind),
            rank: i.rank,
            dimension: i.dimension.to_string(),
            subject: i.subject.clone(),
            value: format!("{:.2}%", i.metric_value),
            headline: i.headline.clone(),
        })
        .collect();
    print_table("Market insights", &rows, rows.len());

    let query = RegistrationQuery {
        start_date: args.start,
        end_date: args.end,
        group_by: Some(args.group_by),
        granularity: args.granularity,
        ..Default::default()
    };
    let report = service.get_registrations(&query).await?;

    print_table(
        &format!("Year-over-year growth by {} ({})", args.group_by, args.granularity),
        &latest_first(&report.yoy),
        args.max_rows,
    );
    print_table(
        &format!("Quarter-over-quarter growth by {}", args.group_by),
        &latest_first(&report.qoq),
        args.max_rows,
    );

    println!(
        "Total registrations: {}",
        report.summary.total_registrations.to_formatted_string(&Locale::en)
    );

    Ok(())
}
