//! Exhaustive hyperparameter search per model family.
//!
//! Every combination is fitted on the training window, forecasts as many steps
//! as the test window holds and is scored by MAE. Combinations that fail to fit
//! or forecast score `+inf` and are never selected. The winner is the first
//! combination with the strictly smallest MAE, and is returned as a fresh,
//! unfitted model.

use crate::config::{ArimaSearchConfig, ProphetSearchConfig};
use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::{
    Forecaster, ModelCandidate, Prophet, SARIMASpec, SeasonalityMode, SeasonalityToggle, SARIMA,
};
use rayon::prelude::*;
use std::time::Duration;

/// Best configuration found by one family's search.
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    /// MAE of the winning combination on the test window, `+inf` if none fitted.
    pub mae: f64,
    /// Unfitted model configured with the winning hyperparameters.
    pub model: ModelCandidate,
    /// Family name, `"ARIMA"` or `"Prophet"`.
    pub name: String,
}

/// Hyperparameter search over a single model family.
pub trait GridSearch: Send + Sync {
    /// Family name reported in [`GridSearchResult::name`].
    fn family(&self) -> &str;

    fn grid_search(&self, train: &TimeSeries, test: &TimeSeries) -> Result<GridSearchResult>;
}

/// Fit on `train`, forecast `test.len()` steps and score against `test`.
pub fn score_candidate(
    candidate: &mut ModelCandidate,
    train: &TimeSeries,
    test: &TimeSeries,
) -> Result<f64> {
    candidate.fit(train)?;
    let forecast = candidate.predict(test.len())?;
    let mae = candidate.score(test.values(), forecast.point())?;
    if mae.is_finite() {
        Ok(mae)
    } else {
        Err(ForecastError::ModelFit(
            "forecast contains non-finite values".to_string(),
        ))
    }
}

fn penalized(family: &str, label: &str, outcome: Result<f64>) -> f64 {
    match outcome {
        Ok(mae) => {
            tracing::debug!(family, combination = label, mae, "scored combination");
            mae
        }
        Err(error) => {
            tracing::warn!(family, combination = label, %error, "combination failed");
            f64::INFINITY
        }
    }
}

/// Index of the first strictly smallest finite score.
pub fn best_index(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    let mut min = f64::INFINITY;
    for (i, &score) in scores.iter().enumerate() {
        if score < min {
            min = score;
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

fn check_windows(train: &TimeSeries, test: &TimeSeries) -> Result<()> {
    if train.is_empty() || test.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    Ok(())
}

/// Search over SARIMA(p, d, q)(P, D, Q)\[s\] with every order in `0..range_limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArimaGridSearch {
    range_limit: usize,
    seasonal_period: usize,
    parallel: bool,
    fit_time_budget: Option<Duration>,
}

impl Default for ArimaGridSearch {
    fn default() -> Self {
        Self::from_config(&ArimaSearchConfig::default())
    }
}

impl ArimaGridSearch {
    pub fn new(range_limit: usize, seasonal_period: usize) -> Self {
        Self {
            range_limit,
            seasonal_period,
            parallel: true,
            fit_time_budget: None,
        }
    }

    pub fn from_config(config: &ArimaSearchConfig) -> Self {
        Self {
            range_limit: config.range_limit,
            seasonal_period: config.seasonal_period,
            parallel: config.parallel,
            fit_time_budget: config.fit_time_budget(),
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_fit_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.fit_time_budget = budget;
        self
    }

    /// Every `(p, d, q) x (P, D, Q, s)` combination, `p` varying slowest.
    pub fn combinations(&self) -> Vec<SARIMASpec> {
        let range = 0..self.range_limit;
        let triples: Vec<(usize, usize, usize)> = range
            .clone()
            .flat_map(|a| {
                let range = range.clone();
                range.clone().flat_map(move |b| range.clone().map(move |c| (a, b, c)))
            })
            .collect();

        let s = self.seasonal_period;
        triples
            .iter()
            .flat_map(|&order| {
                triples
                    .iter()
                    .map(move |&(sp, sd, sq)| SARIMASpec::new(order, (sp, sd, sq, s)))
            })
            .collect()
    }

    fn build(&self, spec: SARIMASpec) -> ModelCandidate {
        SARIMA::from_spec(spec)
            .with_time_budget(self.fit_time_budget)
            .into()
    }

    fn evaluate(&self, spec: SARIMASpec, train: &TimeSeries, test: &TimeSeries) -> f64 {
        let mut candidate = self.build(spec);
        let outcome = score_candidate(&mut candidate, train, test);
        penalized(self.family(), &spec.to_string(), outcome)
    }
}

impl GridSearch for ArimaGridSearch {
    fn family(&self) -> &str {
        "ARIMA"
    }

    fn grid_search(&self, train: &TimeSeries, test: &TimeSeries) -> Result<GridSearchResult> {
        check_windows(train, test)?;
        let combinations = self.combinations();
        let first = *combinations.first().ok_or_else(|| {
            ForecastError::InvalidParameter("range_limit must be > 0".to_string())
        })?;

        // Scores keep enumeration order, so the reduction matches a sequential run.
        let scores: Vec<f64> = if self.parallel {
            combinations
                .par_iter()
                .map(|spec| self.evaluate(*spec, train, test))
                .collect()
        } else {
            combinations
                .iter()
                .map(|spec| self.evaluate(*spec, train, test))
                .collect()
        };

        let (mae, winner) = match best_index(&scores) {
            Some(i) => (scores[i], combinations[i]),
            None => (f64::INFINITY, first),
        };
        tracing::info!(
            family = self.family(),
            combinations = combinations.len(),
            mae,
            winner = %winner,
            "grid search finished"
        );

        Ok(GridSearchResult {
            mae,
            model: self.build(winner),
            name: self.family().to_string(),
        })
    }
}

/// Search over seasonality modes with fixed seasonality toggles.
#[derive(Debug, Clone, PartialEq)]
pub struct ProphetGridSearch {
    modes: Vec<SeasonalityMode>,
    yearly: SeasonalityToggle,
    weekly: SeasonalityToggle,
    daily: SeasonalityToggle,
}

impl Default for ProphetGridSearch {
    fn default() -> Self {
        Self::from_config(&ProphetSearchConfig::default())
    }
}

impl ProphetGridSearch {
    pub fn new(modes: Vec<SeasonalityMode>) -> Self {
        Self {
            modes,
            yearly: SeasonalityToggle::Auto,
            weekly: SeasonalityToggle::Auto,
            daily: SeasonalityToggle::Auto,
        }
    }

    pub fn from_config(config: &ProphetSearchConfig) -> Self {
        Self {
            modes: config.modes.clone(),
            yearly: config.yearly,
            weekly: config.weekly,
            daily: config.daily,
        }
    }

    pub fn modes(&self) -> &[SeasonalityMode] {
        &self.modes
    }

    fn build(&self, mode: SeasonalityMode) -> ModelCandidate {
        Prophet::new(mode)
            .with_yearly(self.yearly)
            .with_weekly(self.weekly)
            .with_daily(self.daily)
            .into()
    }
}

impl GridSearch for ProphetGridSearch {
    fn family(&self) -> &str {
        "Prophet"
    }

    fn grid_search(&self, train: &TimeSeries, test: &TimeSeries) -> Result<GridSearchResult> {
        check_windows(train, test)?;
        let first = *self.modes.first().ok_or_else(|| {
            ForecastError::InvalidParameter("at least one seasonality mode is required".to_string())
        })?;

        let scores: Vec<f64> = self
            .modes
            .iter()
            .map(|&mode| {
                let mut candidate = self.build(mode);
                let outcome = score_candidate(&mut candidate, train, test);
                penalized(self.family(), &mode.to_string(), outcome)
            })
            .collect();

        let (mae, winner) = match best_index(&scores) {
            Some(i) => (scores[i], self.modes[i]),
            None => (f64::INFINITY, first),
        };
        tracing::info!(
            family = self.family(),
            mae,
            winner = %winner,
            "grid search finished"
        );

        Ok(GridSearchResult {
            mae,
            model: self.build(winner),
            name: self.family().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn make_series(values: Vec<f64>, offset_hours: i64) -> TimeSeries {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..values.len())
            .map(|i| base + chrono::Duration::hours(offset_hours + i as i64))
            .collect();
        TimeSeries::regular(timestamps, values, chrono::Duration::hours(1)).unwrap()
    }

    fn split(values: Vec<f64>, test_size: usize) -> (TimeSeries, TimeSeries) {
        let cut = values.len() - test_size;
        let train = make_series(values[..cut].to_vec(), 0);
        let test = make_series(values[cut..].to_vec(), cut as i64);
        (train, test)
    }

    #[test]
    fn combinations_follow_enumeration_order() {
        let search = ArimaGridSearch::new(2, 2);
        let combos = search.combinations();

        assert_eq!(combos.len(), 64);
        assert_eq!(combos[0], SARIMASpec::new((0, 0, 0), (0, 0, 0, 2)));
        assert_eq!(combos[1], SARIMASpec::new((0, 0, 0), (0, 0, 1, 2)));
        assert_eq!(combos[8], SARIMASpec::new((0, 0, 1), (0, 0, 0, 2)));
        assert_eq!(combos[63], SARIMASpec::new((1, 1, 1), (1, 1, 1, 2)));
    }

    #[test]
    fn best_index_prefers_earliest_strict_minimum() {
        assert_eq!(best_index(&[3.0, 1.0, 1.0, 2.0]), Some(1));
        assert_eq!(best_index(&[f64::INFINITY, 2.0]), Some(1));
        assert_eq!(best_index(&[f64::INFINITY, f64::INFINITY]), None);
        assert_eq!(best_index(&[]), None);
    }

    #[test]
    fn arima_search_finds_linear_trend_model() {
        let values: Vec<f64> = (0..60).map(|i| 5.0 + 0.5 * i as f64).collect();
        let (train, test) = split(values, 12);

        let result = ArimaGridSearch::new(2, 2)
            .with_parallel(false)
            .grid_search(&train, &test)
            .unwrap();

        assert_eq!(result.name, "ARIMA");
        assert!(result.mae < 0.5);
        assert!(!result.model.is_fitted());
    }

    #[test]
    fn parallel_and_sequential_searches_agree() {
        let values: Vec<f64> = (0..72)
            .map(|i| 10.0 + (i as f64 * 0.9).sin() + 0.05 * i as f64)
            .collect();
        let (train, test) = split(values, 12);

        let sequential = ArimaGridSearch::new(2, 2)
            .with_parallel(false)
            .grid_search(&train, &test)
            .unwrap();
        let parallel = ArimaGridSearch::new(2, 2)
            .with_parallel(true)
            .grid_search(&train, &test)
            .unwrap();

        assert_eq!(sequential.mae, parallel.mae);
        assert_eq!(sequential.model.info(), parallel.model.info());
    }

    #[test]
    fn failed_combinations_never_win() {
        // Two training points only support the mean model.
        let (train, test) = split(vec![1.0, 2.0, 4.0, 3.0], 2);

        let result = ArimaGridSearch::new(2, 2)
            .with_parallel(false)
            .grid_search(&train, &test)
            .unwrap();
        assert_relative_eq!(result.mae, 2.0, epsilon = 1e-4);
        let info = result.model.info();
        assert_eq!(info.parameters["non_seasonal_params"], "(0, 0, 0)");
        assert_eq!(info.parameters["seasonal_params"], "(0, 0, 0, 2)");
    }

    #[test]
    fn all_failures_yield_infinite_mae() {
        let (train, test) = split(vec![1.0, f64::NAN, 3.0, 4.0, 5.0, 6.0], 2);

        let result = ArimaGridSearch::new(2, 2)
            .with_parallel(false)
            .grid_search(&train, &test)
            .unwrap();
        assert!(result.mae.is_infinite());
        assert_eq!(
            result.model.info().parameters["seasonal_params"],
            "(0, 0, 0, 2)"
        );

        let prophet = ProphetGridSearch::default().grid_search(&train, &test).unwrap();
        assert!(prophet.mae.is_infinite());
        assert_eq!(prophet.name, "Prophet");
    }

    #[test]
    fn prophet_search_scores_each_mode() {
        let values: Vec<f64> = (0..120)
            .map(|i| 50.0 + 0.1 * i as f64 + 5.0 * (2.0 * std::f64::consts::PI * i as f64 / 24.0).sin())
            .collect();
        let (train, test) = split(values, 24);

        let result = ProphetGridSearch::default().grid_search(&train, &test).unwrap();
        assert_eq!(result.name, "Prophet");
        assert!(result.mae.is_finite());
        assert!(!result.model.is_fitted());
    }

    #[test]
    fn empty_windows_are_rejected() {
        let train = make_series(vec![1.0, 2.0], 0);
        let test = make_series(vec![], 2);
        assert!(matches!(
            ArimaGridSearch::default().grid_search(&train, &test),
            Err(ForecastError::EmptyData)
        ));
        assert!(matches!(
            ProphetGridSearch::new(vec![]).grid_search(&train, &make_series(vec![3.0], 2)),
            Err(ForecastError::InvalidParameter(_))
        ));
    }
}
