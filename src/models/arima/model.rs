//! Seasonal ARIMA model estimated by exact Gaussian maximum likelihood.

use crate::core::{future_timestamps, Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::arima::diff::{
    difference, differencing_polynomial, integrate, lag_polynomial, poly_mul, seasonal_difference,
};
use crate::models::arima::likelihood::{arma_innovations, Innovations};
use crate::models::{Forecaster, ModelInfo};
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::stats::{mean, quantile_normal};
use chrono::{DateTime, Duration, Utc};
use std::time::Instant;

/// SARIMA(p, d, q)(P, D, Q)\[s\] model specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SARIMASpec {
    /// AR order (p)
    pub p: usize,
    /// Differencing order (d)
    pub d: usize,
    /// MA order (q)
    pub q: usize,
    /// Seasonal AR order (P)
    pub seasonal_p: usize,
    /// Seasonal differencing order (D)
    pub seasonal_d: usize,
    /// Seasonal MA order (Q)
    pub seasonal_q: usize,
    /// Seasonal period (s)
    pub period: usize,
}

impl SARIMASpec {
    /// Create a specification from a `(p, d, q)` order and a `(P, D, Q, s)` seasonal order.
    pub fn new(order: (usize, usize, usize), seasonal_order: (usize, usize, usize, usize)) -> Self {
        let (p, d, q) = order;
        let (seasonal_p, seasonal_d, seasonal_q, period) = seasonal_order;
        Self {
            p,
            d,
            q,
            seasonal_p,
            seasonal_d,
            seasonal_q,
            period,
        }
    }

    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, self.q)
    }

    pub fn seasonal_order(&self) -> (usize, usize, usize, usize) {
        (self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period)
    }

    /// Whether any seasonal term is present.
    pub fn is_seasonal(&self) -> bool {
        self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
    }

    /// A mean is estimated only for undifferenced models.
    pub fn has_intercept(&self) -> bool {
        self.d + self.seasonal_d == 0
    }

    /// Total number of estimated parameters.
    pub fn num_params(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q + usize::from(self.has_intercept())
    }

    fn ar_lags(&self) -> usize {
        self.p + self.seasonal_p * self.period
    }

    fn ma_lags(&self) -> usize {
        self.q + self.seasonal_q * self.period
    }

    fn differencing_lags(&self) -> usize {
        self.d + self.seasonal_d * self.period
    }

    /// First differenced index with a full set of lags.
    fn conditioning_start(&self) -> usize {
        self.ar_lags().max(self.ma_lags())
    }

    /// Shortest series the model can be fitted on.
    pub fn min_observations(&self) -> usize {
        self.differencing_lags() + self.conditioning_start() + 2
    }

    fn validate(&self) -> Result<()> {
        if self.is_seasonal() && self.period < 2 {
            return Err(ForecastError::ModelFit(format!(
                "seasonal terms require a period of at least 2, got {}",
                self.period
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for SARIMASpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SARIMA({}, {}, {})({}, {}, {}, {})",
            self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Coefficients {
    intercept: f64,
    ar: Vec<f64>,
    seasonal_ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ma: Vec<f64>,
}

impl Coefficients {
    /// Unpack `[intercept?, ar, seasonal_ar, ma, seasonal_ma]`.
    fn from_params(spec: &SARIMASpec, params: &[f64]) -> Self {
        let mut offset = 0;
        let mut take = |n: usize| {
            let block = params[offset..offset + n].to_vec();
            offset += n;
            block
        };
        let intercept = if spec.has_intercept() { take(1)[0] } else { 0.0 };
        Self {
            intercept,
            ar: take(spec.p),
            seasonal_ar: take(spec.seasonal_p),
            ma: take(spec.q),
            seasonal_ma: take(spec.seasonal_q),
        }
    }

    /// Expanded `φ(B)Φ(B^s)`.
    fn ar_operator(&self, period: usize) -> Vec<f64> {
        poly_mul(
            &lag_polynomial(&self.ar, 1, -1.0),
            &lag_polynomial(&self.seasonal_ar, period, -1.0),
        )
    }

    /// Expanded `θ(B)Θ(B^s)`.
    fn ma_operator(&self, period: usize) -> Vec<f64> {
        poly_mul(
            &lag_polynomial(&self.ma, 1, 1.0),
            &lag_polynomial(&self.seasonal_ma, period, 1.0),
        )
    }

    /// Prediction-error decomposition of the demeaned differenced series.
    fn innovations(&self, w: &[f64], period: usize) -> Option<Innovations> {
        let x: Vec<f64> = w.iter().map(|v| v - self.intercept).collect();
        let ar: Vec<f64> = self.ar_operator(period)[1..].iter().map(|c| -c).collect();
        let ma = self.ma_operator(period);
        arma_innovations(&x, &ar, &ma[1..])
    }
}

/// Conditional one-step residuals of the differenced series.
///
/// Residuals before `start` are zero. `start` must cover every lag of both operators.
fn conditional_residuals(
    w: &[f64],
    ar_operator: &[f64],
    ma_operator: &[f64],
    intercept: f64,
    start: usize,
) -> Vec<f64> {
    let mut residuals = vec![0.0; w.len()];
    for t in start..w.len() {
        let pred = one_step(w, &residuals, t, ar_operator, ma_operator, intercept);
        residuals[t] = w[t] - pred;
    }
    residuals
}

fn one_step(
    w: &[f64],
    residuals: &[f64],
    t: usize,
    ar_operator: &[f64],
    ma_operator: &[f64],
    intercept: f64,
) -> f64 {
    let mut pred = intercept;
    for (k, coef) in ar_operator.iter().enumerate().skip(1) {
        pred -= coef * (w[t - k] - intercept);
    }
    for (k, coef) in ma_operator.iter().enumerate().skip(1) {
        pred += coef * residuals[t - k];
    }
    pred
}

fn conditional_sum_of_squares(spec: &SARIMASpec, w: &[f64], params: &[f64]) -> f64 {
    let start = spec.conditioning_start();
    if w.len() <= start {
        return f64::MAX;
    }
    let coefficients = Coefficients::from_params(spec, params);
    let residuals = conditional_residuals(
        w,
        &coefficients.ar_operator(spec.period),
        &coefficients.ma_operator(spec.period),
        coefficients.intercept,
        start,
    );
    let css: f64 = residuals[start..].iter().map(|e| e * e).sum();
    if css.is_finite() {
        css
    } else {
        f64::MAX
    }
}

/// Exact `-2 ln L` (constants dropped), `f64::MAX` where it is undefined.
fn exact_deviance(spec: &SARIMASpec, w: &[f64], params: &[f64]) -> f64 {
    Coefficients::from_params(spec, params)
        .innovations(w, spec.period)
        .map(|inn| inn.deviance())
        .filter(|d| d.is_finite())
        .unwrap_or(f64::MAX)
}

#[derive(Debug, Clone)]
struct FittedState {
    history: Vec<f64>,
    differenced: Vec<f64>,
    residuals: Vec<f64>,
    fitted: Vec<f64>,
    coefficients: Coefficients,
    ar_operator: Vec<f64>,
    ma_operator: Vec<f64>,
    differencing_operator: Vec<f64>,
    sigma2: f64,
    aic: f64,
    last_timestamp: Option<DateTime<Utc>>,
    frequency: Option<Duration>,
    window: Option<(String, String)>,
}

/// Seasonal ARIMA forecasting model.
///
/// The series is differenced by `(1 - B)^d (1 - B^s)^D`, after which the ARMA
/// coefficients of `φ(B)Φ(B^s) w_t = θ(B)Θ(B^s) e_t` are estimated by maximum
/// likelihood. The conditional sum of squares supplies starting values; the
/// exact Gaussian likelihood, evaluated with a Kalman filter from the stationary
/// initial state, is then maximised over every differenced observation. When the
/// exact likelihood is undefined at the starting values (a non-stationary AR
/// part) the conditional estimate is kept.
/// Forecasts are the conditional mean, integrated back to the original scale.
#[derive(Debug, Clone)]
pub struct SARIMA {
    spec: SARIMASpec,
    time_budget: Option<std::time::Duration>,
    state: Option<FittedState>,
}

impl SARIMA {
    /// Create a model from a `(p, d, q)` order and a `(P, D, Q, s)` seasonal order.
    pub fn new(order: (usize, usize, usize), seasonal_order: (usize, usize, usize, usize)) -> Self {
        Self::from_spec(SARIMASpec::new(order, seasonal_order))
    }

    pub fn from_spec(spec: SARIMASpec) -> Self {
        Self {
            spec,
            time_budget: None,
            state: None,
        }
    }

    /// Bound the wall-clock time spent estimating coefficients.
    pub fn with_time_budget(mut self, budget: Option<std::time::Duration>) -> Self {
        self.time_budget = budget;
        self
    }

    /// Get the model specification.
    pub fn spec(&self) -> SARIMASpec {
        self.spec
    }

    pub fn ar_coefficients(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.coefficients.ar.as_slice())
    }

    pub fn seasonal_ar_coefficients(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.coefficients.seasonal_ar.as_slice())
    }

    pub fn ma_coefficients(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.coefficients.ma.as_slice())
    }

    pub fn seasonal_ma_coefficients(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.coefficients.seasonal_ma.as_slice())
    }

    pub fn intercept(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.coefficients.intercept)
    }

    /// Innovation variance.
    pub fn sigma2(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.sigma2)
    }

    pub fn aic(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.aic)
    }

    fn estimate(&self, w: &[f64]) -> Result<Coefficients> {
        let started = Instant::now();
        let spec = self.spec;
        let has_intercept = spec.has_intercept();
        let level = mean(w);
        let n_coef = spec.num_params() - usize::from(has_intercept);

        if n_coef == 0 {
            return Ok(Coefficients {
                intercept: if has_intercept { level } else { 0.0 },
                ..Coefficients::default()
            });
        }

        let mut initial = Vec::with_capacity(spec.num_params());
        let mut bounds = Vec::with_capacity(spec.num_params());
        if has_intercept {
            initial.push(level);
            bounds.push((f64::NEG_INFINITY, f64::INFINITY));
        }
        for order in [spec.p, spec.seasonal_p, spec.q, spec.seasonal_q] {
            for i in 0..order {
                initial.push(0.1 / (i + 1) as f64);
                bounds.push((-0.99, 0.99));
            }
        }

        let config = NelderMeadConfig {
            max_iter: 1000,
            tolerance: 1e-8,
            max_duration: self.time_budget,
            ..Default::default()
        };

        let result = nelder_mead(
            |params| conditional_sum_of_squares(&spec, w, params),
            &initial,
            Some(&bounds),
            config.clone(),
        );

        if result.timed_out {
            return Err(ForecastError::ModelFit(format!(
                "{spec} exceeded its time budget after {} iterations",
                result.iterations
            )));
        }
        if !result.optimal_value.is_finite() || result.optimal_value == f64::MAX {
            return Err(ForecastError::ModelFit(format!(
                "{spec} did not reach a finite sum of squares"
            )));
        }

        let conditional = Coefficients::from_params(&spec, &result.optimal_point);
        let start_deviance = exact_deviance(&spec, w, &result.optimal_point);
        if start_deviance == f64::MAX {
            tracing::debug!(model = %spec, "exact likelihood undefined, keeping CSS estimate");
            return Ok(conditional);
        }

        let refined = nelder_mead(
            |params| exact_deviance(&spec, w, params),
            &result.optimal_point,
            Some(&bounds),
            NelderMeadConfig {
                max_duration: self
                    .time_budget
                    .map(|budget| budget.saturating_sub(started.elapsed())),
                ..config
            },
        );
        if refined.timed_out {
            return Err(ForecastError::ModelFit(format!(
                "{spec} exceeded its time budget during likelihood maximisation"
            )));
        }
        if refined.optimal_value < start_deviance {
            Ok(Coefficients::from_params(&spec, &refined.optimal_point))
        } else {
            Ok(conditional)
        }
    }

    /// Weights of the infinite moving-average representation, `ψ_0 = 1`.
    fn psi_weights(state: &FittedState, horizon: usize) -> Vec<f64> {
        let full_ar = poly_mul(&state.ar_operator, &state.differencing_operator);
        let mut psi = Vec::with_capacity(horizon);
        for j in 0..horizon {
            if j == 0 {
                psi.push(1.0);
                continue;
            }
            let mut value = state.ma_operator.get(j).copied().unwrap_or(0.0);
            for (k, coef) in full_ar.iter().enumerate().skip(1).take(j) {
                value -= coef * psi[j - k];
            }
            psi.push(value);
        }
        psi
    }

    fn attach_timestamps(state: &FittedState, forecast: Forecast) -> Result<Forecast> {
        match (state.last_timestamp, state.frequency) {
            (Some(last), Some(freq)) => {
                let horizon = forecast.horizon();
                Ok(forecast.with_timestamps(future_timestamps(last, freq, horizon)?))
            }
            _ => Ok(forecast),
        }
    }
}

impl Forecaster for SARIMA {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        self.state = None;
        self.spec.validate()?;

        let spec = self.spec;
        let values = series.values();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFit(
                "series contains non-finite values".to_string(),
            ));
        }
        let min_len = spec.min_observations();
        if values.len() < min_len {
            return Err(ForecastError::ModelFit(format!(
                "{spec} needs at least {min_len} observations, got {}",
                values.len()
            )));
        }

        let w = seasonal_difference(&difference(values, spec.d), spec.seasonal_d, spec.period);
        let coefficients = self.estimate(&w)?;
        let ar_operator = coefficients.ar_operator(spec.period);
        let ma_operator = coefficients.ma_operator(spec.period);

        let start = spec.conditioning_start();
        let residuals =
            conditional_residuals(&w, &ar_operator, &ma_operator, coefficients.intercept, start);

        let offset = spec.differencing_lags();
        let mut fitted = vec![f64::NAN; values.len()];
        for (t, e) in residuals.iter().enumerate().skip(start) {
            fitted[t + offset] = values[t + offset] - e;
        }

        let (sigma2, log_likelihood) = match coefficients.innovations(&w, spec.period) {
            Some(inn) => (inn.sigma2(), inn.log_likelihood()),
            None => {
                let effective = &residuals[start..];
                let n_eff = effective.len() as f64;
                let sigma2 = effective.iter().map(|e| e * e).sum::<f64>() / n_eff;
                let llf = -0.5 * n_eff * (1.0 + sigma2.ln() + (2.0 * std::f64::consts::PI).ln());
                (sigma2, llf)
            }
        };
        let aic = -2.0 * log_likelihood + 2.0 * spec.num_params() as f64;

        tracing::debug!(
            model = %spec,
            sigma2,
            aic,
            observations = values.len(),
            "fitted SARIMA"
        );

        self.state = Some(FittedState {
            history: values.to_vec(),
            differenced: w,
            residuals,
            fitted,
            coefficients,
            ar_operator,
            ma_operator,
            differencing_operator: differencing_polynomial(spec.d, spec.seasonal_d, spec.period),
            sigma2,
            aic,
            last_timestamp: series.last_timestamp(),
            frequency: series.frequency_or_infer().ok(),
            window: series.window(),
        });
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        if horizon == 0 {
            return Ok(Forecast::new());
        }

        let intercept = state.coefficients.intercept;
        let mut w = state.differenced.clone();
        let mut residuals = state.residuals.clone();
        for _ in 0..horizon {
            let t = w.len();
            let pred = one_step(
                &w,
                &residuals,
                t,
                &state.ar_operator,
                &state.ma_operator,
                intercept,
            );
            w.push(pred);
            // Future innovations have zero mean.
            residuals.push(0.0);
        }

        let forecast_diff = w.split_off(state.differenced.len());
        let point = integrate(&forecast_diff, &state.history, &state.differencing_operator);
        Self::attach_timestamps(state, Forecast::from_values(point))
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let forecast = self.predict(horizon)?;
        if horizon == 0 {
            return Ok(forecast);
        }
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;

        let z = quantile_normal((1.0 + level) / 2.0)?;
        let psi = Self::psi_weights(state, horizon);
        let mut cumulative = 0.0;
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for (pred, weight) in forecast.point().iter().zip(&psi) {
            cumulative += weight * weight;
            let se = (state.sigma2 * cumulative).sqrt();
            lower.push(pred - z * se);
            upper.push(pred + z * se);
        }

        let point = forecast.point().to_vec();
        Self::attach_timestamps(
            state,
            Forecast::from_values_with_intervals(point, lower, upper),
        )
    }

    fn info(&self) -> ModelInfo {
        let (p, d, q) = self.spec.order();
        let (sp, sd, sq, s) = self.spec.seasonal_order();
        ModelInfo::new(self.name())
            .with_parameter("non_seasonal_params", format!("({p}, {d}, {q})"))
            .with_parameter("seasonal_params", format!("({sp}, {sd}, {sq}, {s})"))
            .with_window(self.state.as_ref().and_then(|s| s.window.clone()))
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    /// Residuals on the differenced scale; zero before the first full set of lags.
    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "SARIMA"
    }
}
