//! Integration tests for grid search, model selection and backtesting.

use chrono::{Duration, TimeZone, Utc};
use emissions_forecast::config::{EvaluationConfig, ForecastConfig};
use emissions_forecast::core::TimeSeries;
use emissions_forecast::models::{Forecaster, ModelCandidate, DEFAULT_HORIZON};
use emissions_forecast::selection::{
    ArimaGridSearch, GridSearch, ModelSelector, ModelTrainer, ProphetGridSearch,
};
use emissions_forecast::utils::ModelEvaluation;
use emissions_forecast::ForecastError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Hourly emissions-like series: level, daily cycle and seeded noise.
fn hourly_emissions(n: usize, seed: u64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let base = Utc.with_ymd_and_hms(2020, 9, 1, 0, 0, 0).unwrap();
    let timestamps = (0..n).map(|i| base + Duration::hours(i as i64)).collect();
    let values = (0..n)
        .map(|i| {
            let daily = (2.0 * std::f64::consts::PI * i as f64 / 24.0).sin();
            7.5 + 0.4 * daily + rng.gen_range(-0.05..0.05)
        })
        .collect();
    TimeSeries::regular(timestamps, values, Duration::hours(1)).unwrap()
}

#[test]
fn selector_picks_a_finite_winner_across_families() {
    let series = hourly_emissions(24 * 6, 7);
    let config = ForecastConfig::default();

    let selection = ModelSelector::from_config(series.clone(), &config)
        .select()
        .unwrap();

    let names: Vec<&str> = selection
        .summary
        .families
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(names, vec!["ARIMA", "Prophet"]);

    let min = selection
        .summary
        .families
        .iter()
        .map(|(_, mae)| *mae)
        .fold(f64::INFINITY, f64::min);
    assert!(min.is_finite());
    assert_eq!(selection.summary.winner_mae, min);
    assert!(!selection.model.is_fitted());

    let json = serde_json::to_string(&selection.summary).unwrap();
    assert!(json.contains(&selection.summary.winner));
}

#[test]
fn selected_model_refits_and_forecasts_two_days() {
    let series = hourly_emissions(24 * 6, 11);
    let mut model = ModelSelector::from_config(series.clone(), &ForecastConfig::default())
        .select_best_model()
        .unwrap();

    model.fit(&series).unwrap();
    let forecast = model.predict_default().unwrap();
    assert_eq!(forecast.horizon(), DEFAULT_HORIZON);
    assert!(forecast.point().iter().all(|v| v.is_finite()));

    let timestamps = forecast.timestamps().unwrap();
    assert_eq!(
        timestamps[0],
        series.last_timestamp().unwrap() + Duration::hours(1)
    );

    let info = model.info();
    let (start, end) = info.training_window.unwrap();
    assert_eq!(start, "2020-09-01 00:00");
    assert_eq!(end, "2020-09-06 23:00");
}

#[test]
fn trainer_runs_each_family_on_the_same_split() {
    let series = hourly_emissions(24 * 5, 3);
    let trainer = ModelTrainer::new(&series, 48).unwrap();
    assert_eq!(trainer.train().len(), 72);

    let arima = trainer
        .grid_search(&ArimaGridSearch::new(2, 2).with_parallel(true))
        .unwrap();
    let prophet = trainer.grid_search(&ProphetGridSearch::default()).unwrap();

    assert_eq!(arima.name, "ARIMA");
    assert_eq!(prophet.name, "Prophet");
    assert!(arima.mae.is_finite());
    assert!(prophet.mae.is_finite());
    assert!(matches!(arima.model, ModelCandidate::Sarima(_)));
    assert!(matches!(prophet.model, ModelCandidate::Prophet(_)));
}

#[test]
fn cross_validation_of_the_winner() {
    let series = hourly_emissions(24 * 8, 5);
    let mut model = ModelSelector::from_config(series.clone(), &ForecastConfig::default())
        .select_best_model()
        .unwrap();

    let config = EvaluationConfig {
        folds: 3,
        fold_size: 24,
    };
    let report = ModelEvaluation::new(&series)
        .evaluate(&mut model, &config)
        .unwrap();

    assert_eq!(report.n_folds(), 3);
    assert_eq!(report.rmse.len(), 3);
    assert!(report.mape.iter().all(|m| m.is_some()));
    assert!(report.mean_mae() < 1.0);
    assert!(report.mean_rmse() >= report.mean_mae());
}

#[test]
fn selector_reports_no_viable_model() {
    let mut values = vec![7.0; 80];
    values[10] = f64::NAN;
    let base = Utc.with_ymd_and_hms(2020, 9, 1, 0, 0, 0).unwrap();
    let timestamps = (0..80).map(|i| base + Duration::hours(i)).collect();
    let series = TimeSeries::regular(timestamps, values, Duration::hours(1)).unwrap();

    let result = ModelSelector::from_config(series, &ForecastConfig::default()).select_best_model();
    assert!(matches!(result, Err(ForecastError::NoViableModel)));
}

#[test]
fn single_family_selector() {
    let series = hourly_emissions(24 * 4, 9);
    let search = ProphetGridSearch::default();
    assert_eq!(search.family(), "Prophet");

    let model = ModelSelector::new(series)
        .register(search)
        .select_best_model()
        .unwrap();
    assert_eq!(model.name(), "Prophet");
}
