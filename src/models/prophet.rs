//! Additive/multiplicative seasonality model in the style of Prophet.
//!
//! The series is decomposed into a linear trend and Fourier-series seasonalities
//! with yearly, weekly and daily periods:
//!
//! - additive: `y(t) = g(t) + s(t)`
//! - multiplicative: `y(t) = g(t) * (1 + s(t))`
//!
//! Values are scaled by their maximum absolute value before fitting, and
//! coefficients are estimated by ordinary least squares.

use crate::core::{future_timestamps, Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::{Forecaster, ModelInfo};
use crate::utils::ols::{ols_fit, OLSResult, Regressor};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// How seasonal terms combine with the trend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    #[default]
    Additive,
    Multiplicative,
}

impl std::fmt::Display for SeasonalityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeasonalityMode::Additive => write!(f, "additive"),
            SeasonalityMode::Multiplicative => write!(f, "multiplicative"),
        }
    }
}

/// Whether a seasonality is fitted, and with how many Fourier terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityToggle {
    /// Enabled when the history is long and dense enough.
    #[default]
    Auto,
    Enabled,
    Disabled,
    FourierTerms(usize),
}

impl SeasonalityToggle {
    /// Number of Fourier terms to use, zero when disabled.
    fn resolve(self, default_order: usize, auto_enabled: bool) -> usize {
        match self {
            SeasonalityToggle::Auto if auto_enabled => default_order,
            SeasonalityToggle::Auto | SeasonalityToggle::Disabled => 0,
            SeasonalityToggle::Enabled => default_order,
            SeasonalityToggle::FourierTerms(order) => order,
        }
    }
}

impl std::fmt::Display for SeasonalityToggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeasonalityToggle::Auto => write!(f, "auto"),
            SeasonalityToggle::Enabled => write!(f, "enabled"),
            SeasonalityToggle::Disabled => write!(f, "disabled"),
            SeasonalityToggle::FourierTerms(order) => write!(f, "{order}"),
        }
    }
}

/// A resolved seasonal component.
#[derive(Debug, Clone, PartialEq)]
pub struct Seasonality {
    pub name: &'static str,
    pub period_days: f64,
    pub order: usize,
}

impl Seasonality {
    fn regressors(&self, days: &[f64]) -> Vec<Regressor> {
        let mut columns = Vec::with_capacity(2 * self.order);
        for k in 1..=self.order {
            let omega = 2.0 * PI * k as f64 / self.period_days;
            columns.push((
                format!("{}_sin_{k}", self.name),
                days.iter().map(|t| (omega * t).sin()).collect(),
            ));
            columns.push((
                format!("{}_cos_{k}", self.name),
                days.iter().map(|t| (omega * t).cos()).collect(),
            ));
        }
        columns
    }
}

#[derive(Debug, Clone)]
struct FittedState {
    start: DateTime<Utc>,
    span_days: f64,
    scale: f64,
    seasonalities: Vec<Seasonality>,
    trend: OLSResult,
    seasonal: Option<OLSResult>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    last_timestamp: DateTime<Utc>,
    frequency: Duration,
    window: Option<(String, String)>,
}

/// Trend plus Fourier-seasonality forecaster.
#[derive(Debug, Clone)]
pub struct Prophet {
    mode: SeasonalityMode,
    yearly: SeasonalityToggle,
    weekly: SeasonalityToggle,
    daily: SeasonalityToggle,
    state: Option<FittedState>,
}

impl Default for Prophet {
    fn default() -> Self {
        Self::new(SeasonalityMode::Additive)
    }
}

impl Prophet {
    pub fn new(mode: SeasonalityMode) -> Self {
        Self {
            mode,
            yearly: SeasonalityToggle::Auto,
            weekly: SeasonalityToggle::Auto,
            daily: SeasonalityToggle::Auto,
            state: None,
        }
    }

    pub fn with_yearly(mut self, toggle: SeasonalityToggle) -> Self {
        self.yearly = toggle;
        self
    }

    pub fn with_weekly(mut self, toggle: SeasonalityToggle) -> Self {
        self.weekly = toggle;
        self
    }

    pub fn with_daily(mut self, toggle: SeasonalityToggle) -> Self {
        self.daily = toggle;
        self
    }

    pub fn mode(&self) -> SeasonalityMode {
        self.mode
    }

    /// Seasonalities chosen at fit time, empty before fitting.
    pub fn seasonalities(&self) -> &[Seasonality] {
        self.state
            .as_ref()
            .map(|s| s.seasonalities.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve the toggles against the history span and the smallest spacing.
    pub fn resolve_seasonalities(&self, span: Duration, spacing: Duration) -> Vec<Seasonality> {
        let candidates = [
            (
                "yearly",
                365.25,
                10,
                self.yearly,
                span >= Duration::days(730),
            ),
            (
                "weekly",
                7.0,
                3,
                self.weekly,
                span >= Duration::weeks(2) && spacing < Duration::weeks(1),
            ),
            (
                "daily",
                1.0,
                4,
                self.daily,
                span >= Duration::days(2) && spacing < Duration::days(1),
            ),
        ];

        candidates
            .into_iter()
            .filter_map(|(name, period_days, default_order, toggle, auto)| {
                let order = toggle.resolve(default_order, auto);
                (order > 0).then_some(Seasonality {
                    name,
                    period_days,
                    order,
                })
            })
            .collect()
    }

    fn seasonal_design(seasonalities: &[Seasonality], days: &[f64]) -> Vec<Regressor> {
        seasonalities
            .iter()
            .flat_map(|s| s.regressors(days))
            .collect()
    }

    /// Evaluate the fitted model on the scaled value axis.
    fn evaluate(state: &FittedState, timestamps: &[DateTime<Utc>], mode: SeasonalityMode) -> Result<Vec<f64>> {
        let days = epoch_days(timestamps);
        let trend_axis: Vec<f64> = timestamps
            .iter()
            .map(|t| days_between(state.start, *t) / state.span_days)
            .collect();
        let trend = state.trend.predict(&[("trend".to_string(), trend_axis)])?;

        let seasonal = match &state.seasonal {
            Some(model) => model.predict(&Self::seasonal_design(&state.seasonalities, &days))?,
            None => vec![0.0; timestamps.len()],
        };

        Ok(match mode {
            SeasonalityMode::Additive => trend.iter().zip(&seasonal).map(|(g, s)| g + s).collect(),
            SeasonalityMode::Multiplicative => trend
                .iter()
                .zip(&seasonal)
                .map(|(g, s)| g * (1.0 + s))
                .collect(),
        })
    }
}

/// Reshape a series into explicit `(timestamp, value)` rows.
pub fn history_rows(series: &TimeSeries) -> Vec<(DateTime<Utc>, f64)> {
    series
        .timestamps()
        .iter()
        .copied()
        .zip(series.values().iter().copied())
        .collect()
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_DAY
}

fn epoch_days(timestamps: &[DateTime<Utc>]) -> Vec<f64> {
    timestamps
        .iter()
        .map(|t| t.timestamp() as f64 / SECONDS_PER_DAY)
        .collect()
}

impl Forecaster for Prophet {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        self.state = None;

        let rows = history_rows(series);
        if rows.len() < 2 {
            return Err(ForecastError::ModelFit(format!(
                "at least 2 observations are required, got {}",
                rows.len()
            )));
        }
        if rows.iter().any(|(_, y)| !y.is_finite()) {
            return Err(ForecastError::ModelFit(
                "series contains non-finite values".to_string(),
            ));
        }

        let (timestamps, values): (Vec<DateTime<Utc>>, Vec<f64>) = rows.into_iter().unzip();
        let start = timestamps[0];
        let last = timestamps[timestamps.len() - 1];
        let span = last - start;
        let spacing = timestamps
            .windows(2)
            .map(|w| w[1] - w[0])
            .min()
            .unwrap_or(span);
        let span_days = days_between(start, last);

        let scale = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let y: Vec<f64> = values.iter().map(|v| v / scale).collect();

        let seasonalities = self.resolve_seasonalities(span, spacing);
        let days = epoch_days(&timestamps);
        let trend_axis: Vec<f64> = timestamps
            .iter()
            .map(|t| days_between(start, *t) / span_days)
            .collect();
        let trend_column = vec![("trend".to_string(), trend_axis)];
        let seasonal_columns = Self::seasonal_design(&seasonalities, &days);

        let to_fit_error = |e: ForecastError| ForecastError::ModelFit(e.to_string());
        let (trend, seasonal) = match self.mode {
            SeasonalityMode::Additive => {
                let mut columns = trend_column.clone();
                columns.extend(seasonal_columns.iter().cloned());
                let joint = ols_fit(&y, &columns).map_err(to_fit_error)?;
                let trend = OLSResult {
                    coefficients: joint.coefficients[..1].to_vec(),
                    intercept: joint.intercept,
                    regressor_names: joint.regressor_names[..1].to_vec(),
                };
                let seasonal = (!seasonal_columns.is_empty()).then(|| OLSResult {
                    coefficients: joint.coefficients[1..].to_vec(),
                    intercept: 0.0,
                    regressor_names: joint.regressor_names[1..].to_vec(),
                });
                (trend, seasonal)
            }
            SeasonalityMode::Multiplicative => {
                let trend = ols_fit(&y, &trend_column).map_err(to_fit_error)?;
                let trend_values = trend.predict(&trend_column).map_err(to_fit_error)?;
                if trend_values.iter().any(|g| *g <= 0.0) {
                    return Err(ForecastError::ModelFit(
                        "multiplicative seasonality requires a positive trend".to_string(),
                    ));
                }
                let seasonal = if seasonal_columns.is_empty() {
                    None
                } else {
                    let ratio: Vec<f64> = y
                        .iter()
                        .zip(&trend_values)
                        .map(|(v, g)| v / g - 1.0)
                        .collect();
                    Some(ols_fit(&ratio, &seasonal_columns).map_err(to_fit_error)?)
                };
                (trend, seasonal)
            }
        };

        let frequency = series
            .frequency_or_infer()
            .unwrap_or_else(|_| Duration::hours(1));
        let mut state = FittedState {
            start,
            span_days,
            scale,
            seasonalities,
            trend,
            seasonal,
            fitted: Vec::new(),
            residuals: Vec::new(),
            last_timestamp: last,
            frequency,
            window: series.window(),
        };

        let fitted: Vec<f64> = Self::evaluate(&state, &timestamps, self.mode)?
            .into_iter()
            .map(|v| v * scale)
            .collect();
        state.residuals = values.iter().zip(&fitted).map(|(v, f)| v - f).collect();
        state.fitted = fitted;

        tracing::debug!(
            mode = %self.mode,
            seasonalities = ?state.seasonalities.iter().map(|s| s.name).collect::<Vec<_>>(),
            observations = values.len(),
            "fitted Prophet"
        );

        self.state = Some(state);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        if horizon == 0 {
            return Ok(Forecast::new());
        }

        let future = future_timestamps(state.last_timestamp, state.frequency, horizon)?;
        let point = Self::evaluate(state, &future, self.mode)?
            .into_iter()
            .map(|v| v * state.scale)
            .collect();
        Ok(Forecast::from_values(point).with_timestamps(future))
    }

    fn info(&self) -> ModelInfo {
        ModelInfo::new(self.name())
            .with_parameter("seasonality_mode", self.mode)
            .with_parameter("yearly_seasonality", self.yearly)
            .with_parameter("weekly_seasonality", self.weekly)
            .with_parameter("daily_seasonality", self.daily)
            .with_window(self.state.as_ref().and_then(|s| s.window.clone()))
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "Prophet"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn hourly_series(n: usize, f: impl Fn(usize) -> f64) -> TimeSeries {
        let base = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
        let timestamps = (0..n).map(|i| base + Duration::hours(i as i64)).collect();
        let values = (0..n).map(f).collect();
        TimeSeries::regular(timestamps, values, Duration::hours(1)).unwrap()
    }

    fn daily_wave(i: usize) -> f64 {
        (2.0 * PI * i as f64 / 24.0).sin()
    }

    #[test]
    fn additive_recovers_trend_and_daily_cycle() {
        let truth = |i: usize| 100.0 + 0.01 * i as f64 + 10.0 * daily_wave(i);
        let series = hourly_series(240, truth);

        let mut model = Prophet::new(SeasonalityMode::Additive);
        model.fit(&series).unwrap();

        let forecast = model.predict(24).unwrap();
        for (h, p) in forecast.point().iter().enumerate() {
            assert_relative_eq!(*p, truth(240 + h), epsilon = 0.05);
        }
    }

    #[test]
    fn multiplicative_tracks_growing_amplitude() {
        let truth = |i: usize| (50.0 + 0.1 * i as f64) * (1.0 + 0.2 * daily_wave(i));
        let series = hourly_series(240, truth);

        let mut model = Prophet::new(SeasonalityMode::Multiplicative);
        model.fit(&series).unwrap();

        let forecast = model.predict(24).unwrap();
        for (h, p) in forecast.point().iter().enumerate() {
            let expected = truth(240 + h);
            assert!((p - expected).abs() / expected < 0.05);
        }
    }

    #[test]
    fn multiplicative_rejects_non_positive_trend() {
        let series = hourly_series(72, |i| -10.0 - 0.1 * i as f64);
        let mut model = Prophet::new(SeasonalityMode::Multiplicative);
        assert!(matches!(
            model.fit(&series),
            Err(ForecastError::ModelFit(_))
        ));
    }

    #[test]
    fn auto_toggles_follow_history_span_and_spacing() {
        let model = Prophet::default();

        let hourly = model.resolve_seasonalities(Duration::weeks(3), Duration::hours(1));
        let names: Vec<_> = hourly.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["weekly", "daily"]);

        let daily = model.resolve_seasonalities(Duration::weeks(3), Duration::days(1));
        let names: Vec<_> = daily.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["weekly"]);

        let long = model.resolve_seasonalities(Duration::days(800), Duration::days(1));
        assert_eq!(long[0].name, "yearly");
        assert_eq!(long[0].order, 10);
    }

    #[test]
    fn explicit_toggles_override_auto() {
        let model = Prophet::default()
            .with_weekly(SeasonalityToggle::Disabled)
            .with_daily(SeasonalityToggle::FourierTerms(6))
            .with_yearly(SeasonalityToggle::Enabled);

        let resolved = model.resolve_seasonalities(Duration::weeks(3), Duration::hours(1));
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].name, "yearly");
        assert_eq!(resolved[1].name, "daily");
        assert_eq!(resolved[1].order, 6);
    }

    #[test]
    fn fit_rejects_degenerate_input() {
        let mut model = Prophet::default();
        assert!(matches!(
            model.fit(&hourly_series(1, |_| 1.0)),
            Err(ForecastError::ModelFit(_))
        ));
        assert!(matches!(
            model.fit(&hourly_series(10, |i| if i == 3 { f64::NAN } else { 1.0 })),
            Err(ForecastError::ModelFit(_))
        ));
        assert!(!model.is_fitted());
    }

    #[test]
    fn predict_requires_fit() {
        let model = Prophet::default();
        assert!(matches!(model.predict(3), Err(ForecastError::FitRequired)));
    }

    #[test]
    fn forecast_is_stamped_at_series_frequency() {
        let series = hourly_series(72, |i| 5.0 + daily_wave(i));
        let mut model = Prophet::default();
        model.fit(&series).unwrap();

        let forecast = model.predict(2).unwrap();
        let timestamps = forecast.timestamps().unwrap();
        assert_eq!(timestamps[0], Utc.with_ymd_and_hms(2021, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(timestamps[1], Utc.with_ymd_and_hms(2021, 3, 4, 1, 0, 0).unwrap());
        assert_eq!(model.fitted_values().unwrap().len(), 72);
        assert_eq!(model.residuals().unwrap().len(), 72);
    }

    #[test]
    fn info_reports_mode() {
        let info = Prophet::new(SeasonalityMode::Multiplicative).info();
        assert_eq!(info.name, "Prophet");
        assert_eq!(info.parameters["seasonality_mode"], "multiplicative");
        assert_eq!(info.parameters["daily_seasonality"], "auto");
    }

    #[test]
    fn history_rows_pair_timestamps_with_values() {
        let series = hourly_series(3, |i| i as f64);
        let rows = history_rows(&series);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].0, series.timestamps()[2]);
        assert_relative_eq!(rows[2].1, 2.0);
    }
}
