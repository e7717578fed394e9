//! Ranked market insights
//!
//! Picks growth leaders, decliners and market-share leaders out of growth
//! metrics and aggregated totals. Rankings are deterministic: ties on the
//! primary metric fall back to absolute change (largest first) and then to
//! the dimension value in lexical order.

use num_format::{Locale, ToFormattedString};
use std::cmp::Ordering;

use crate::aggregate::{latest_period, Aggregated};
use crate::growth::percent_of;
use crate::models::{Dimension, GrowthMetric, Insight, InsightKind, VehicleCategory};

/// Rank growth metrics and latest-period totals into at most `top_n` insights per kind
pub fn rank_insights(
    dimension: Dimension,
    growth_metrics: &[GrowthMetric],
    aggregated_totals: &Aggregated,
    top_n: usize,
) -> Vec<Insight> {
    let mut insights = Vec::new();
    insights.extend(rank_growth(dimension, growth_metrics, top_n, InsightKind::TopGrowth));
    insights.extend(rank_growth(dimension, growth_metrics, top_n, InsightKind::TopDecline));
    insights.extend(rank_market_share(dimension, aggregated_totals, top_n));
    insights
}

fn rank_growth(dimension: Dimension, metrics: &[GrowthMetric], top_n: usize, kind: InsightKind) -> Vec<Insight> {
    // Undefined growth cannot be ranked
    let mut ranked: Vec<(&GrowthMetric, f64)> = metrics
        .iter()
        .filter_map(|m| m.percent_change.map(|p| (m, p)))
        .collect();

    ranked.sort_by(|(a, pa), (b, pb)| {
        let primary = match kind {
            InsightKind::TopDecline => pa.total_cmp(pb),
            _ => pb.total_cmp(pa),
        };
        primary
            .then_with(|| b.absolute_change.cmp(&a.absolute_change))
            .then_with(|| a.dimension_value.cmp(&b.dimension_value))
    });

    ranked
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (m, pct))| Insight {
            kind,
            dimension,
            subject: m.dimension_value.clone(),
            metric_value: pct,
            period: m.current_period,
            rank: i + 1,
            headline: growth_headline(dimension, m, pct),
        })
        .collect()
}

fn rank_market_share(dimension: Dimension, totals: &Aggregated, top_n: usize) -> Vec<Insight> {
    let Some(period) = latest_period(totals) else {
        return Vec::new();
    };

    let mut entries: Vec<(&str, u64)> = totals
        .iter()
        .filter(|(k, _)| k.period == period)
        .map(|(k, v)| (k.dimension_value.as_str(), *v))
        .collect();
    let period_total = entries.iter().fold(0u64, |acc, (_, v)| acc.saturating_add(*v));
    if period_total == 0 {
        return Vec::new();
    }

    entries.sort_by(|a, b| match b.1.cmp(&a.1) {
        Ordering::Equal => a.0.cmp(b.0),
        other => other,
    });

    entries
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (subject, count))| {
            let share = percent_of(count, period_total);
            Insight {
                kind: InsightKind::MarketShareLeader,
                dimension,
                subject: subject.to_string(),
                metric_value: share,
                period,
                rank: i + 1,
                headline: format!(
                    "{} holds {:.2}% market share in {} ({} registrations)",
                    subject_name(dimension, subject),
                    share,
                    period,
                    count.to_formatted_string(&Locale::en)
                ),
            }
        })
        .collect()
}

fn growth_headline(dimension: Dimension, m: &GrowthMetric, pct: f64) -> String {
    let direction = match pct.total_cmp(&0.0) {
        Ordering::Greater => "up",
        Ordering::Less => "down",
        Ordering::Equal => "flat at",
    };
    format!(
        "{} {} {:.2}% {} in {} ({} registrations)",
        subject_name(dimension, &m.dimension_value),
        direction,
        pct.abs(),
        m.kind,
        m.current_period,
        m.current_value.to_formatted_string(&Locale::en)
    )
}

fn subject_name(dimension: Dimension, subject: &str) -> String {
    match dimension {
        Dimension::Category => VehicleCategory::from_label(subject)
            .map(|c| c.display_name().to_string())
            .unwrap_or_else(|| subject.to_string()),
        _ => subject.to_string(),
    }
}
