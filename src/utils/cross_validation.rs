//! Rolling-origin cross-validation for time series forecasting.
//!
//! The last `folds * fold_size` points are split into `folds` consecutive test
//! windows. Each fold trains on every point before its window, so training
//! sets grow by `fold_size` from one fold to the next and never see the future.

use crate::config::EvaluationConfig;
use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::Forecaster;
use crate::utils::metrics::calculate_metrics;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Per-fold metrics in fold order (oldest test window first).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub mae: Vec<f64>,
    pub rmse: Vec<f64>,
    /// `None` for folds whose test window contains a zero.
    pub mape: Vec<Option<f64>>,
    /// Wall-clock fit duration of each fold, in seconds.
    pub fit_time: Vec<f64>,
}

impl CrossValidationReport {
    /// Number of folds evaluated.
    pub fn n_folds(&self) -> usize {
        self.mae.len()
    }

    pub fn mean_mae(&self) -> f64 {
        mean_of(&self.mae)
    }

    pub fn mean_rmse(&self) -> f64 {
        mean_of(&self.rmse)
    }

    /// Mean MAPE, only defined when every fold has one.
    pub fn mean_mape(&self) -> Option<f64> {
        let values: Option<Vec<f64>> = self.mape.iter().copied().collect();
        values.filter(|v| !v.is_empty()).map(|v| mean_of(&v))
    }

    pub fn total_fit_time(&self) -> f64 {
        self.fit_time.iter().sum()
    }
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Walk-forward evaluation of a model over one series.
#[derive(Debug, Clone, Copy)]
pub struct ModelEvaluation<'a> {
    series: &'a TimeSeries,
}

impl<'a> ModelEvaluation<'a> {
    pub fn new(series: &'a TimeSeries) -> Self {
        Self { series }
    }

    /// Cross-validate with the fold layout of an [`EvaluationConfig`].
    pub fn evaluate(
        &self,
        model: &mut dyn Forecaster,
        config: &EvaluationConfig,
    ) -> Result<CrossValidationReport> {
        self.cross_validation(model, config.folds, config.fold_size)
    }

    /// Refit `model` once per fold and score it on the following `fold_size` points.
    ///
    /// Each fold forecasts exactly as many steps as its test window holds.
    /// Fit and predict failures abort the run.
    ///
    /// # Example
    /// ```
    /// use emissions_forecast::core::TimeSeries;
    /// use emissions_forecast::models::SARIMA;
    /// use emissions_forecast::utils::cross_validation::ModelEvaluation;
    /// use chrono::{Duration, TimeZone, Utc};
    ///
    /// let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    /// let timestamps: Vec<_> = (0..40).map(|i| base + Duration::hours(i)).collect();
    /// let values: Vec<f64> = (0..40).map(|i| i as f64).collect();
    /// let series = TimeSeries::regular(timestamps, values, Duration::hours(1)).unwrap();
    ///
    /// let mut model = SARIMA::new((0, 1, 0), (0, 0, 0, 0));
    /// let report = ModelEvaluation::new(&series)
    ///     .cross_validation(&mut model, 3, 4)
    ///     .unwrap();
    ///
    /// assert_eq!(report.n_folds(), 3);
    /// assert!((report.mean_mae() - 2.5).abs() < 1e-9);
    /// ```
    pub fn cross_validation(
        &self,
        model: &mut dyn Forecaster,
        folds: usize,
        fold_size: usize,
    ) -> Result<CrossValidationReport> {
        if folds == 0 || fold_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "folds and fold_size must be positive".to_string(),
            ));
        }
        let n = self.series.len();
        let mut offset = folds * fold_size;
        if n <= offset {
            return Err(ForecastError::InsufficientData {
                needed: offset + 1,
                got: n,
            });
        }

        let mut report = CrossValidationReport::default();
        while offset >= fold_size {
            let split = n - offset;
            let train = self.series.slice(0, split)?;
            let test = self.series.slice(split, split + fold_size)?;

            let started = Instant::now();
            model.fit(&train)?;
            let fit_time = started.elapsed().as_secs_f64();

            let forecast = model.predict(test.len())?;
            let metrics = calculate_metrics(test.values(), forecast.point())?;

            tracing::debug!(
                model = model.name(),
                fold = report.n_folds() + 1,
                train = train.len(),
                test = test.len(),
                mae = metrics.mae,
                rmse = metrics.rmse,
                fit_time,
                "evaluated fold"
            );

            report.mae.push(metrics.mae);
            report.rmse.push(metrics.rmse);
            report.mape.push(metrics.mape);
            report.fit_time.push(fit_time);

            offset -= fold_size;
        }

        tracing::info!(
            model = model.name(),
            folds = report.n_folds(),
            mean_mae = report.mean_mae(),
            "cross-validation finished"
        );
        Ok(report)
    }
}
