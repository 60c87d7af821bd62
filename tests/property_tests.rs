//! Property-based tests for preparation and model search.
//!
//! These tests verify invariants that should hold for all valid inputs,
//! using randomly generated series.

use chrono::{DateTime, Duration, TimeZone, Utc};
use emissions_forecast::core::{Frame, TimeSeries};
use emissions_forecast::models::{ModelCandidate, SARIMA};
use emissions_forecast::pipeline::{Interpolation, SetFrequency, SortByIndex, Stage};
use emissions_forecast::selection::grid_search::score_candidate;
use emissions_forecast::selection::{ArimaGridSearch, GridSearch};
use emissions_forecast::transform::{inverse_transform, transform};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

fn make_ts(values: &[f64]) -> TimeSeries {
    let timestamps = (0..values.len())
        .map(|i| base() + Duration::hours(i as i64))
        .collect();
    TimeSeries::regular(timestamps, values.to_vec(), Duration::hours(1)).unwrap()
}

/// Strictly positive values, as produced by the emissions aggregation.
fn positive_values_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.01..5000.0_f64, min_len..max_len)
}

/// Sorted, distinct 10-minute ticks with random gaps, always starting at tick 0.
fn sparse_ticks_strategy() -> impl Strategy<Value = Vec<(i64, f64)>> {
    (
        1.0..100.0_f64,
        prop::collection::btree_map(1..120_i64, 1.0..100.0_f64, 1..40),
    )
        .prop_map(|(first, rest)| {
            let mut ticks = vec![(0, first)];
            ticks.extend(rest);
            ticks
        })
}

/// Level plus a mild trend and bounded noise.
fn noisy_series_strategy() -> impl Strategy<Value = Vec<f64>> {
    (10.0..100.0_f64, -0.5..0.5_f64, prop::collection::vec(-1.0..1.0_f64, 36))
        .prop_map(|(level, slope, noise)| {
            noise
                .iter()
                .enumerate()
                .map(|(i, e)| level + slope * i as f64 + e)
                .collect()
        })
}

proptest! {
    #[test]
    fn power_transform_round_trips(values in positive_values_strategy(2, 200)) {
        let result = transform(&values).unwrap();
        let recovered = inverse_transform(&result.data, result.lambda);

        prop_assert_eq!(recovered.len(), values.len());
        for (r, v) in recovered.iter().zip(&values) {
            prop_assert!((r - v).abs() <= 1e-6 * v.abs().max(1.0), "{} != {}", r, v);
        }
    }

    #[test]
    fn sorting_a_sorted_index_changes_nothing(ticks in sparse_ticks_strategy()) {
        let timestamps = ticks.iter().map(|(k, _)| base() + Duration::minutes(10 * k)).collect();
        let values = ticks.iter().map(|(_, v)| *v).collect();
        let frame = Frame::from_parsed("Dates", "Emissions", timestamps, values).unwrap();

        let sorted = SortByIndex::new("Dates").apply(frame).unwrap();
        let regular = SetFrequency::new(Duration::minutes(10)).apply(sorted).unwrap();
        let regular = Interpolation::new().apply(regular).unwrap();

        let again = SortByIndex::new("Dates").apply(regular.clone()).unwrap();
        prop_assert_eq!(again, regular);
    }

    #[test]
    fn regularized_index_is_complete(ticks in sparse_ticks_strategy()) {
        let mut shuffled = ticks.clone();
        shuffled.reverse();
        let timestamps = shuffled.iter().map(|(k, _)| base() + Duration::minutes(10 * k)).collect();
        let values = shuffled.iter().map(|(_, v)| *v).collect();
        let frame = Frame::from_parsed("Dates", "Emissions", timestamps, values).unwrap();

        let frame = SortByIndex::new("Dates").apply(frame).unwrap();
        let frame = SetFrequency::new(Duration::minutes(10)).apply(frame).unwrap();
        let frame = Interpolation::new().apply(frame).unwrap();

        let last_tick = ticks.iter().map(|(k, _)| *k).max().unwrap_or(0);
        prop_assert_eq!(frame.len() as i64, last_tick + 1);
        prop_assert!(frame.values().iter().all(|v| v.is_finite()));

        let index = frame.parsed_timestamps().unwrap();
        prop_assert!(index.windows(2).all(|w| w[1] - w[0] == Duration::minutes(10)));
        prop_assert!(frame.into_time_series().is_ok());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(4))]

    #[test]
    fn grid_search_returns_the_minimum(values in noisy_series_strategy()) {
        let train = make_ts(&values[..30]);
        let test = TimeSeries::regular(
            (30..36).map(|i| base() + Duration::hours(i)).collect(),
            values[30..].to_vec(),
            Duration::hours(1),
        )
        .unwrap();

        let search = ArimaGridSearch::new(2, 2).with_parallel(false);
        let best = search.grid_search(&train, &test).unwrap();

        for spec in search.combinations() {
            let mut candidate: ModelCandidate = SARIMA::from_spec(spec).into();
            if let Ok(mae) = score_candidate(&mut candidate, &train, &test) {
                prop_assert!(best.mae <= mae, "{} beat the winner: {} < {}", spec, mae, best.mae);
            }
        }
    }
}
