//! Exact Gaussian likelihood of a stationary ARMA process.
//!
//! The zero-mean process `x_t = Σ φ_k x_{t-k} + e_t + Σ θ_k e_{t-k}` is written in
//! state-space form with state dimension `r = max(p, q + 1)`:
//!
//! ```text
//! x_t     = Z α_t
//! α_{t+1} = T α_t + R e_{t+1}
//! ```
//!
//! `T` is the companion matrix of `φ`, `R = (1, θ_1, …, θ_{r-1})'` and
//! `Z = (1, 0, …, 0)`. The filter starts from the stationary distribution and
//! yields one-step innovations `v_t` with variance `σ² F_t`. The innovation
//! variance `σ²` is concentrated out.

use std::f64::consts::PI;

/// Covariance change below which the filter is treated as converged.
const STEADY_STATE_TOL: f64 = 1e-11;
/// Upper bound on doubling steps for the stationary covariance.
const MAX_DOUBLINGS: usize = 64;

/// Prediction-error decomposition of a filtered series, in units of `σ²`.
#[derive(Debug, Clone, PartialEq)]
pub struct Innovations {
    /// `Σ v_t² / F_t`
    pub weighted_sum_of_squares: f64,
    /// `Σ ln F_t`
    pub log_determinant: f64,
    pub observations: usize,
}

impl Innovations {
    /// Maximum-likelihood innovation variance.
    pub fn sigma2(&self) -> f64 {
        self.weighted_sum_of_squares / self.observations as f64
    }

    /// Exact log-likelihood at the concentrated variance.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.observations as f64;
        -0.5 * (n * ((2.0 * PI).ln() + 1.0 + self.sigma2().ln()) + self.log_determinant)
    }

    /// `-2 ln L` without its constant terms.
    pub fn deviance(&self) -> f64 {
        let n = self.observations as f64;
        n * self.sigma2().ln() + self.log_determinant
    }
}

/// Run the Kalman filter over `x` for the given AR (`φ`) and MA (`θ`) coefficients.
///
/// Returns `None` for an empty series, a non-stationary AR part or a numerically
/// degenerate filter.
pub fn arma_innovations(x: &[f64], ar: &[f64], ma: &[f64]) -> Option<Innovations> {
    if x.is_empty() {
        return None;
    }
    let r = ar.len().max(ma.len() + 1);
    let phi: Vec<f64> = (0..r).map(|i| ar.get(i).copied().unwrap_or(0.0)).collect();
    let loading: Vec<f64> = (0..r)
        .map(|i| if i == 0 { 1.0 } else { ma.get(i - 1).copied().unwrap_or(0.0) })
        .collect();
    let noise: Vec<f64> = (0..r * r)
        .map(|idx| loading[idx / r] * loading[idx % r])
        .collect();

    let mut cov = stationary_covariance(&phi, &noise, r)?;
    let mut state = vec![0.0; r];
    let mut weighted_sum_of_squares = 0.0;
    let mut log_determinant = 0.0;
    let mut steady = false;

    for &obs in x {
        let f = cov[0];
        if !f.is_finite() || f <= 0.0 {
            return None;
        }
        let v = obs - state[0];
        weighted_sum_of_squares += v * v / f;
        log_determinant += f.ln();

        let gain: Vec<f64> = (0..r).map(|i| cov[i * r] / f).collect();
        for (s, k) in state.iter_mut().zip(&gain) {
            *s += k * v;
        }
        state = companion_apply(&phi, &state);

        if !steady {
            let mut updated = cov.clone();
            for i in 0..r {
                for j in 0..r {
                    updated[i * r + j] -= gain[i] * cov[j];
                }
            }
            let mut next = companion_sandwich(&phi, &updated, r);
            for (n, q) in next.iter_mut().zip(&noise) {
                *n += q;
            }
            steady = next
                .iter()
                .zip(&cov)
                .all(|(a, b)| (a - b).abs() < STEADY_STATE_TOL);
            cov = next;
        }
    }

    (weighted_sum_of_squares.is_finite() && log_determinant.is_finite()).then_some(Innovations {
        weighted_sum_of_squares,
        log_determinant,
        observations: x.len(),
    })
}

/// `T a` for the companion matrix of `phi`.
fn companion_apply(phi: &[f64], a: &[f64]) -> Vec<f64> {
    let r = phi.len();
    (0..r)
        .map(|i| phi[i] * a[0] + if i + 1 < r { a[i + 1] } else { 0.0 })
        .collect()
}

/// `T M` for a row-major `r × r` matrix `M`.
fn companion_left(phi: &[f64], m: &[f64], r: usize) -> Vec<f64> {
    let mut out = vec![0.0; r * r];
    for i in 0..r {
        for j in 0..r {
            let shifted = if i + 1 < r { m[(i + 1) * r + j] } else { 0.0 };
            out[i * r + j] = phi[i] * m[j] + shifted;
        }
    }
    out
}

/// `T M T'`, using `T M T' = (T (T M)')'`.
fn companion_sandwich(phi: &[f64], m: &[f64], r: usize) -> Vec<f64> {
    let left = companion_left(phi, m, r);
    transpose(&companion_left(phi, &transpose(&left, r), r), r)
}

fn transpose(m: &[f64], r: usize) -> Vec<f64> {
    (0..r * r).map(|idx| m[(idx % r) * r + idx / r]).collect()
}

fn mat_mul(a: &[f64], b: &[f64], r: usize) -> Vec<f64> {
    let mut out = vec![0.0; r * r];
    for i in 0..r {
        for k in 0..r {
            let aik = a[i * r + k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..r {
                out[i * r + j] += aik * b[k * r + j];
            }
        }
    }
    out
}

/// Solve `P = T P T' + Q` by doubling: `P = Σ_k T^k Q T'^k`.
fn stationary_covariance(phi: &[f64], noise: &[f64], r: usize) -> Option<Vec<f64>> {
    let mut power: Vec<f64> = (0..r * r)
        .map(|idx| {
            let (i, j) = (idx / r, idx % r);
            if j == 0 {
                phi[i]
            } else if j == i + 1 {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    let mut cov = noise.to_vec();

    for _ in 0..MAX_DOUBLINGS {
        let spread = mat_mul(&mat_mul(&power, &cov, r), &transpose(&power, r), r);
        for (c, s) in cov.iter_mut().zip(&spread) {
            *c += s;
        }
        power = mat_mul(&power, &power, r);

        if cov.iter().chain(&power).any(|v| !v.is_finite()) {
            return None;
        }
        if power.iter().all(|v| v.abs() < 1e-15) {
            return Some(cov);
        }
    }
    None
}
