use chrono::NaiveDate;
use proptest::prelude::*;
use vehicle_registrations::growth::percent_change;
use vehicle_registrations::models::Dimension;
use vehicle_registrations::{
    aggregate, compute_growth, normalize, AggregateKey, Aggregated, DateRange, GrowthKind, Granularity, PeriodKey,
    RawRow, RecordFilter, RegistrationRecord, VehicleCategory,
};

const MANUFACTURERS: [&str; 4] = ["Hero MotoCorp", "TVS", "Tata", "Kia"];

fn record_strategy() -> impl Strategy<Value = RegistrationRecord> {
    (
        2020i32..2026,
        1u32..=12,
        1u32..=28,
        0usize..3,
        proptest::option::of(0usize..MANUFACTURERS.len()),
        0u64..1_000_000,
    )
        .prop_map(|(y, m, d, cat, manufacturer, count)| {
            RegistrationRecord::new(
                NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                VehicleCategory::ALL[cat],
                manufacturer.map(|i| MANUFACTURERS[i].to_string()),
                None,
                count,
            )
        })
}

fn dimension_strategy() -> impl Strategy<Value = Dimension> {
    prop_oneof![
        Just(Dimension::Category),
        Just(Dimension::Manufacturer),
        Just(Dimension::None),
    ]
}

proptest! {
    #[test]
    fn aggregate_ignores_input_order(
        records in proptest::collection::vec(record_strategy(), 0..60),
        dimension in dimension_strategy(),
        seed in any::<u64>(),
    ) {
        let mut shuffled = records.clone();
        // Deterministic Fisher-Yates driven by the generated seed
        let mut state = seed;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            shuffled.swap(i, j);
        }

        let a = aggregate(&records, dimension, Granularity::Quarter, &DateRange::all(), &RecordFilter::default()).unwrap();
        let b = aggregate(&shuffled, dimension, Granularity::Quarter, &DateRange::all(), &RecordFilter::default()).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn grand_total_preserves_counts(records in proptest::collection::vec(record_strategy(), 0..60)) {
        let agg = aggregate(&records, Dimension::None, Granularity::Month, &DateRange::all(), &RecordFilter::default()).unwrap();
        let expected: u64 = records.iter().map(|r| r.count).sum();
        prop_assert_eq!(agg.values().sum::<u64>(), expected);
    }

    #[test]
    fn percent_change_matches_formula(current in 0u64..10_000_000, baseline in 1u64..10_000_000) {
        let exact = (current as f64 - baseline as f64) / baseline as f64 * 100.0;
        let got = percent_change(current, baseline);
        prop_assert!((got - exact).abs() <= 0.005 + 1e-9, "got {} expected ~{}", got, exact);
        prop_assert_eq!(got, (got * 100.0).round() / 100.0);
    }

    #[test]
    fn growth_is_defined_only_for_positive_baselines(current in 0u64..1000, baseline in proptest::option::of(0u64..1000)) {
        let key = AggregateKey::new("X", PeriodKey::quarter(2024, 1));
        let cur: Aggregated = [(key, current)].into_iter().collect();
        let base: Aggregated = baseline
            .map(|b| (AggregateKey::new("X", PeriodKey::quarter(2023, 4)), b))
            .into_iter()
            .collect();
        let metrics = compute_growth(&cur, &base, GrowthKind::QoQ).unwrap();
        prop_assert_eq!(metrics.len(), 1);
        prop_assert_eq!(metrics[0].baseline_value, baseline);
        prop_assert_eq!(metrics[0].percent_change.is_some(), baseline.is_some_and(|b| b > 0));
    }

    #[test]
    fn normalize_is_deterministic(date in "\\PC{0,12}", category in "\\PC{0,12}", count in "\\PC{0,8}") {
        let row = RawRow { date, category, count, ..Default::default() };
        prop_assert_eq!(normalize(&row), normalize(&row));
    }

    #[test]
    fn quarter_matches_month(y in 1990i32..2100, m in 1u32..=12) {
        let date = NaiveDate::from_ymd_opt(y, m, 1).unwrap();
        let r = RegistrationRecord::new(date, VehicleCategory::FourWheeler, None, None, 1);
        prop_assert_eq!(r.quarter, (m + 2) / 3);
        prop_assert!(PeriodKey::of(date, Granularity::Quarter).contains(date));
    }
}
