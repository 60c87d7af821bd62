//! Box-Cox power transform with a maximum-likelihood lambda.
//!
//! `y = (x^λ - 1) / λ` for `λ != 0` and `y = ln(x)` for `λ = 0`. The transform
//! is only defined for strictly positive inputs.

use crate::error::{ForecastError, Result};

/// Lambdas closer to zero than this use the logarithmic branch.
const LOG_BRANCH: f64 = 1e-10;
/// Admissible lambda range.
const LAMBDA_RANGE: (f64, f64) = (-2.0, 2.0);

/// Transformed values together with the lambda that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxCoxResult {
    pub data: Vec<f64>,
    pub lambda: f64,
}

impl BoxCoxResult {
    /// Map the transformed values back to the input scale.
    pub fn inverse(&self) -> Vec<f64> {
        inverse_transform(&self.data, self.lambda)
    }
}

fn forward(x: f64, lambda: f64) -> f64 {
    if x <= 0.0 {
        f64::NAN
    } else if lambda.abs() < LOG_BRANCH {
        x.ln()
    } else {
        (x.powf(lambda) - 1.0) / lambda
    }
}

fn backward(y: f64, lambda: f64) -> f64 {
    if lambda.abs() < LOG_BRANCH {
        return y.exp();
    }
    let base = lambda * y + 1.0;
    if base <= 0.0 {
        f64::NAN
    } else {
        base.powf(lambda.recip())
    }
}

/// Box-Cox transform with a fixed lambda. Non-positive inputs map to NaN.
pub fn boxcox(series: &[f64], lambda: f64) -> Vec<f64> {
    series.iter().map(|&x| forward(x, lambda)).collect()
}

/// Profile log-likelihood of `lambda`, constants dropped.
fn log_likelihood(series: &[f64], log_sum: f64, lambda: f64) -> f64 {
    let n = series.len() as f64;
    let transformed = boxcox(series, lambda);
    let mean = transformed.iter().sum::<f64>() / n;
    let variance = transformed.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n;
    if !variance.is_finite() || variance <= 0.0 {
        return f64::NEG_INFINITY;
    }
    -0.5 * n * variance.ln() + (lambda - 1.0) * log_sum
}

/// Maximum-likelihood lambda in `[-2, 2]`.
///
/// A grid with step 0.01 locates the optimum, a second pass with step 0.001
/// refines it. Grid points are exact multiples of the step, so `λ = 0` is
/// reachable exactly. Non-positive values are ignored; fewer than two positive
/// values yield `λ = 1`.
pub fn boxcox_lambda(series: &[f64]) -> f64 {
    let positive: Vec<f64> = series.iter().copied().filter(|&x| x > 0.0).collect();
    if positive.len() < 2 {
        return 1.0;
    }
    let log_sum: f64 = positive.iter().map(|x| x.ln()).sum();
    let llf = |lambda: f64| log_likelihood(&positive, log_sum, lambda);

    let best_on = |candidates: &mut dyn Iterator<Item = f64>, start: (f64, f64)| {
        candidates.fold(start, |(best, best_llf), lambda| {
            let value = llf(lambda);
            if value > best_llf {
                (lambda, value)
            } else {
                (best, best_llf)
            }
        })
    };

    let (lo, hi) = LAMBDA_RANGE;
    let coarse = best_on(
        &mut (-200..=200).map(|i| i as f64 / 100.0),
        (1.0, f64::NEG_INFINITY),
    );
    let centre = coarse.0;
    let (lambda, _) = best_on(
        &mut (-10..=10)
            .map(|k| centre + k as f64 / 1000.0)
            .filter(|l| (lo..=hi).contains(l)),
        coarse,
    );
    lambda
}

/// Transform with a maximum-likelihood lambda.
///
/// The returned lambda must be handed back to [`inverse_transform`]; it is not
/// recoverable from the transformed values.
pub fn transform(series: &[f64]) -> Result<BoxCoxResult> {
    if series.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if let Some(bad) = series.iter().find(|&&x| x.is_nan() || x <= 0.0) {
        return Err(ForecastError::Domain(format!(
            "power transform requires strictly positive values, found {bad}"
        )));
    }

    let lambda = boxcox_lambda(series);
    tracing::debug!(lambda, n = series.len(), "estimated Box-Cox lambda");
    Ok(BoxCoxResult {
        data: boxcox(series, lambda),
        lambda,
    })
}

/// Closed-form inverse for an explicitly supplied lambda.
///
/// Values outside the image of the forward transform map to NaN.
pub fn inverse_transform(transformed: &[f64], lambda: f64) -> Vec<f64> {
    transformed.iter().map(|&y| backward(y, lambda)).collect()
}
