//! Least-squares regression on named regressor columns.
//!
//! The design matrix always carries an intercept column first, followed by the
//! regressors in the order given. Coefficients come back in that same order,
//! which lets callers split one joint fit into separate components.

use crate::error::{ForecastError, Result};

/// A named regressor column.
pub type Regressor = (String, Vec<f64>);

/// Ridge added to the diagonal of the normal equations.
const RIDGE: f64 = 1e-8;

/// Fitted intercept and coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct OLSResult {
    /// One coefficient per regressor, in fit order.
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub regressor_names: Vec<String>,
}

impl OLSResult {
    /// Evaluate the fit on new regressor values.
    ///
    /// `regressors` must carry the fitted names, in fit order.
    pub fn predict(&self, regressors: &[Regressor]) -> Result<Vec<f64>> {
        if regressors.len() != self.regressor_names.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.regressor_names.len(),
                got: regressors.len(),
            });
        }
        if let Some(((name, _), expected)) = regressors
            .iter()
            .zip(&self.regressor_names)
            .find(|((name, _), expected)| name != *expected)
        {
            return Err(ForecastError::InvalidParameter(format!(
                "expected regressor '{expected}', got '{name}'"
            )));
        }
        let n = column_length(regressors)?.ok_or_else(|| {
            ForecastError::InvalidParameter("no regressors provided for prediction".into())
        })?;

        Ok((0..n)
            .map(|row| {
                self.coefficients
                    .iter()
                    .zip(regressors)
                    .fold(self.intercept, |acc, (beta, (_, column))| acc + beta * column[row])
            })
            .collect())
    }

    pub fn num_regressors(&self) -> usize {
        self.coefficients.len()
    }
}

/// Common length of all columns, `None` when there are no columns.
fn column_length(regressors: &[Regressor]) -> Result<Option<usize>> {
    let Some((_, first)) = regressors.first() else {
        return Ok(None);
    };
    let n = first.len();
    match regressors.iter().find(|(_, column)| column.len() != n) {
        Some((_, column)) => Err(ForecastError::DimensionMismatch {
            expected: n,
            got: column.len(),
        }),
        None => Ok(Some(n)),
    }
}

/// Fit `y = intercept + Σ β_j x_j` by solving the (ridged) normal equations.
pub fn ols_fit(y: &[f64], regressors: &[Regressor]) -> Result<OLSResult> {
    let n = y.len();
    if n == 0 {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    if let Some(len) = column_length(regressors)? {
        if len != n {
            return Err(ForecastError::DimensionMismatch {
                expected: n,
                got: len,
            });
        }
    }

    let dim = regressors.len() + 1;
    let mut gram = vec![0.0; dim * dim];
    let mut moment = vec![0.0; dim];
    let mut row = vec![1.0; dim];
    for (obs, &target) in y.iter().enumerate() {
        for (slot, (_, column)) in row[1..].iter_mut().zip(regressors) {
            *slot = column[obs];
        }
        for i in 0..dim {
            moment[i] += row[i] * target;
            for j in 0..=i {
                gram[i * dim + j] += row[i] * row[j];
            }
        }
    }
    for i in 0..dim {
        gram[i * dim + i] += RIDGE;
    }

    let beta = cholesky_solve(&gram, &moment, dim).ok_or_else(|| {
        ForecastError::ComputationError("OLS regression failed: matrix not positive definite".into())
    })?;

    Ok(OLSResult {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
        regressor_names: regressors.iter().map(|(name, _)| name.clone()).collect(),
    })
}

/// Solve `A x = b` for symmetric positive definite `A`.
///
/// Only the lower triangle of the row-major `a` is read.
fn cholesky_solve(a: &[f64], b: &[f64], dim: usize) -> Option<Vec<f64>> {
    // Lower factor, row-major.
    let mut l = vec![0.0; dim * dim];
    for i in 0..dim {
        for j in 0..=i {
            let dot: f64 = (0..j).map(|k| l[i * dim + k] * l[j * dim + k]).sum();
            let rest = a[i * dim + j] - dot;
            if i == j {
                if rest <= 0.0 || !rest.is_finite() {
                    return None;
                }
                l[i * dim + i] = rest.sqrt();
            } else {
                l[i * dim + j] = rest / l[j * dim + j];
            }
        }
    }

    let mut z = vec![0.0; dim];
    for i in 0..dim {
        let dot: f64 = (0..i).map(|k| l[i * dim + k] * z[k]).sum();
        z[i] = (b[i] - dot) / l[i * dim + i];
    }
    let mut x = vec![0.0; dim];
    for i in (0..dim).rev() {
        let dot: f64 = (i + 1..dim).map(|k| l[k * dim + i] * x[k]).sum();
        x[i] = (z[i] - dot) / l[i * dim + i];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn column(name: &str, values: Vec<f64>) -> Regressor {
        (name.to_string(), values)
    }

    fn fourier(name: &str, n: usize, period: f64) -> [Regressor; 2] {
        let angle = |t: usize| 2.0 * PI * t as f64 / period;
        [
            column(&format!("{name}_sin_1"), (0..n).map(|t| angle(t).sin()).collect()),
            column(&format!("{name}_cos_1"), (0..n).map(|t| angle(t).cos()).collect()),
        ]
    }

    #[test]
    fn recovers_trend_and_daily_cycle() {
        let n = 96;
        let trend: Vec<f64> = (0..n).map(|t| t as f64 / n as f64).collect();
        let [sin, cos] = fourier("daily", n, 24.0);
        let y: Vec<f64> = (0..n)
            .map(|t| 40.0 + 6.0 * trend[t] + 2.5 * sin.1[t] - 1.0 * cos.1[t])
            .collect();

        let regressors = vec![column("trend", trend), sin, cos];
        let result = ols_fit(&y, &regressors).unwrap();

        assert_eq!(result.num_regressors(), 3);
        assert_relative_eq!(result.intercept, 40.0, epsilon = 1e-5);
        assert_relative_eq!(result.coefficients[0], 6.0, epsilon = 1e-5);
        assert_relative_eq!(result.coefficients[1], 2.5, epsilon = 1e-5);
        assert_relative_eq!(result.coefficients[2], -1.0, epsilon = 1e-5);
        assert_eq!(
            result.regressor_names,
            vec!["trend", "daily_sin_1", "daily_cos_1"]
        );
    }

    #[test]
    fn intercept_only_fit_is_the_mean() {
        let result = ols_fit(&[3.0, 5.0, 10.0], &[]).unwrap();
        assert_relative_eq!(result.intercept, 6.0, epsilon = 1e-6);
        assert!(result.coefficients.is_empty());
    }

    #[test]
    fn predict_extends_the_fit() {
        let x = vec![0.0, 0.25, 0.5, 0.75];
        let y: Vec<f64> = x.iter().map(|v| 7.0 - 4.0 * v).collect();
        let result = ols_fit(&y, &[column("trend", x)]).unwrap();

        let ahead = result.predict(&[column("trend", vec![1.0, 1.25])]).unwrap();
        assert_relative_eq!(ahead[0], 3.0, epsilon = 1e-6);
        assert_relative_eq!(ahead[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn least_squares_residuals_are_centred() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = vec![2.1, 3.9, 6.2, 7.8, 10.1, 12.0];
        let regressors = vec![column("x", x)];
        let result = ols_fit(&y, &regressors).unwrap();

        let fitted = result.predict(&regressors).unwrap();
        let residual_sum: f64 = y.iter().zip(&fitted).map(|(a, f)| a - f).sum();
        assert!(residual_sum.abs() < 1e-6);
    }

    #[test]
    fn collinear_columns_are_ridged() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y = vec![2.0, 4.0, 6.0, 8.0];
        let result = ols_fit(&y, &[column("a", x.clone()), column("b", x.clone())]).unwrap();

        let fitted = result.predict(&[column("a", x.clone()), column("b", x)]).unwrap();
        for (f, target) in fitted.iter().zip(&y) {
            assert_relative_eq!(*f, *target, epsilon = 1e-3);
        }
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert!(matches!(
            ols_fit(&[1.0, 2.0, 3.0], &[column("x", vec![1.0, 2.0])]),
            Err(ForecastError::DimensionMismatch { expected: 3, got: 2 })
        ));
        assert!(matches!(
            ols_fit(&[], &[]),
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn predict_checks_names_and_order() {
        let y = vec![1.0, 3.0, 2.0, 5.0];
        let regressors = vec![
            column("a", vec![0.0, 1.0, 0.0, 1.0]),
            column("b", vec![0.0, 0.0, 1.0, 1.0]),
        ];
        let result = ols_fit(&y, &regressors).unwrap();

        let swapped = vec![regressors[1].clone(), regressors[0].clone()];
        assert!(matches!(
            result.predict(&swapped),
            Err(ForecastError::InvalidParameter(_))
        ));
        assert!(matches!(
            result.predict(&regressors[..1]),
            Err(ForecastError::DimensionMismatch { .. })
        ));
    }
}
