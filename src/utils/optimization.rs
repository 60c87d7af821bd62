//! Box-constrained Nelder-Mead search used to estimate model coefficients.
//!
//! Every candidate vertex is clamped into its bounds before evaluation, so the
//! objective is never called outside the admissible region. A wall-clock
//! budget can cut the search short; callers decide whether that is an error.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

/// Result of Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    pub optimal_point: Vec<f64>,
    pub optimal_value: f64,
    pub iterations: usize,
    /// The simplex shrank below the tolerance.
    pub converged: bool,
    /// The search stopped because the time budget ran out.
    pub timed_out: bool,
}

/// Configuration for Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    /// Spread of objective values (and of vertices) below which the search stops.
    pub tolerance: f64,
    /// Reflection coefficient.
    pub alpha: f64,
    /// Expansion coefficient.
    pub gamma: f64,
    /// Contraction coefficient.
    pub rho: f64,
    /// Shrink coefficient.
    pub sigma: f64,
    /// Relative size of the initial simplex.
    pub initial_step: f64,
    /// Wall-clock budget for the whole search, unlimited when `None`.
    pub max_duration: Option<Duration>,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.05,
            max_duration: None,
        }
    }
}

/// A scored point of the simplex.
#[derive(Debug, Clone)]
struct Vertex {
    point: Vec<f64>,
    value: f64,
}

struct Simplex<'a, F> {
    objective: F,
    bounds: Option<&'a [(f64, f64)]>,
    vertices: Vec<Vertex>,
}

impl<'a, F> Simplex<'a, F>
where
    F: Fn(&[f64]) -> f64,
{
    fn new(objective: F, initial: &[f64], bounds: Option<&'a [(f64, f64)]>, step: f64) -> Self {
        let mut simplex = Self {
            objective,
            bounds,
            vertices: Vec::with_capacity(initial.len() + 1),
        };
        let origin = simplex.score(initial.to_vec());
        simplex.vertices.push(origin);
        for i in 0..initial.len() {
            let mut point = initial.to_vec();
            point[i] += if initial[i].abs() > 1e-10 {
                step * initial[i].abs()
            } else {
                step
            };
            let vertex = simplex.score(point);
            simplex.vertices.push(vertex);
        }
        simplex
    }

    fn score(&self, mut point: Vec<f64>) -> Vertex {
        if let Some(bounds) = self.bounds {
            for (x, (lo, hi)) in point.iter_mut().zip(bounds) {
                *x = x.clamp(*lo, *hi);
            }
        }
        let value = (self.objective)(&point);
        Vertex { point, value }
    }

    /// Sort best first; NaN compares as equal and so keeps its place.
    fn order(&mut self) {
        self.vertices
            .sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal));
    }

    fn centroid(&self) -> Vec<f64> {
        let keep = &self.vertices[..self.vertices.len() - 1];
        let mut centroid = vec![0.0; keep[0].point.len()];
        for vertex in keep {
            for (c, x) in centroid.iter_mut().zip(&vertex.point) {
                *c += x;
            }
        }
        centroid.iter_mut().for_each(|c| *c /= keep.len() as f64);
        centroid
    }

    fn is_collapsed(&self, centroid: &[f64], tolerance: f64) -> bool {
        let best = self.vertices[0].value;
        let worst = self.vertices[self.vertices.len() - 1].value;
        if worst - best < tolerance {
            return true;
        }
        self.vertices.iter().all(|v| distance(&v.point, centroid) < tolerance)
    }

    /// One reflect / expand / contract / shrink step on an ordered simplex.
    fn step(&mut self, centroid: &[f64], config: &NelderMeadConfig) {
        let n = self.vertices.len() - 1;
        let best = self.vertices[0].value;
        let second_worst = self.vertices[n - 1].value;
        let worst = self.vertices[n].clone();

        let reflected = self.score(along(centroid, &worst.point, -config.alpha));
        if reflected.value < best {
            let expanded = self.score(along(centroid, &reflected.point, config.gamma));
            self.vertices[n] = if expanded.value < reflected.value {
                expanded
            } else {
                reflected
            };
            return;
        }
        if reflected.value < second_worst {
            self.vertices[n] = reflected;
            return;
        }

        let contracted = if reflected.value < worst.value {
            let outside = self.score(along(centroid, &reflected.point, config.rho));
            (outside.value <= reflected.value).then_some(outside)
        } else {
            let inside = self.score(along(centroid, &worst.point, config.rho));
            (inside.value < worst.value).then_some(inside)
        };
        if let Some(vertex) = contracted {
            self.vertices[n] = vertex;
            return;
        }

        let anchor = self.vertices[0].point.clone();
        for i in 1..=n {
            let point = along(&anchor, &self.vertices[i].point, config.sigma);
            self.vertices[i] = self.score(point);
        }
    }
}

/// `from + t * (to - from)`.
fn along(from: &[f64], to: &[f64], t: f64) -> Vec<f64> {
    from.iter().zip(to).map(|(a, b)| a + t * (b - a)).collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Minimize `objective` starting from `initial`.
///
/// `bounds` holds one `(min, max)` pair per dimension.
///
/// # Example
/// ```
/// use emissions_forecast::utils::optimization::{nelder_mead, NelderMeadConfig};
///
/// // An AR coefficient bounded away from the unit root.
/// let result = nelder_mead(
///     |x| (x[0] - 1.4).powi(2),
///     &[0.1],
///     Some(&[(-0.99, 0.99)]),
///     NelderMeadConfig::default(),
/// );
///
/// assert!((result.optimal_point[0] - 0.99).abs() < 1e-6);
/// ```
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    if initial.is_empty() {
        return NelderMeadResult {
            optimal_point: vec![],
            optimal_value: f64::NAN,
            iterations: 0,
            converged: false,
            timed_out: false,
        };
    }

    let started = Instant::now();
    let mut simplex = Simplex::new(objective, initial, bounds, config.initial_step);
    let mut iterations = 0;
    let mut converged = false;
    let mut timed_out = false;

    while iterations < config.max_iter {
        if config
            .max_duration
            .is_some_and(|budget| started.elapsed() >= budget)
        {
            timed_out = true;
            break;
        }
        iterations += 1;

        simplex.order();
        let centroid = simplex.centroid();
        if simplex.is_collapsed(&centroid, config.tolerance) {
            converged = true;
            break;
        }
        simplex.step(&centroid, &config);
    }

    simplex.order();
    let best = simplex.vertices.swap_remove(0);
    NelderMeadResult {
        optimal_point: best.point,
        optimal_value: best.value,
        iterations,
        converged,
        timed_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ar_decay(phi: f64, start: f64, n: usize) -> Vec<f64> {
        std::iter::successors(Some(start), |y| Some(phi * y)).take(n).collect()
    }

    fn ar1_css(y: &[f64]) -> impl Fn(&[f64]) -> f64 + '_ {
        move |params| {
            y.windows(2)
                .map(|w| (w[1] - params[0] * w[0]).powi(2))
                .sum::<f64>()
        }
    }

    #[test]
    fn recovers_ar1_coefficient() {
        let y = ar_decay(-0.45, 8.0, 30);
        let result = nelder_mead(
            ar1_css(&y),
            &[0.1],
            Some(&[(-0.99, 0.99)]),
            NelderMeadConfig::default(),
        );

        assert!(result.converged);
        assert!(!result.timed_out);
        assert_relative_eq!(result.optimal_point[0], -0.45, epsilon = 1e-3);
    }

    #[test]
    fn minimizes_separable_quadratic() {
        let result = nelder_mead(
            |x| (x[0] - 0.3).powi(2) + 2.0 * (x[1] + 0.4).powi(2) + (x[2] - 0.05).powi(2),
            &[0.1, 0.05, 0.033],
            None,
            NelderMeadConfig::default(),
        );

        assert!(result.converged);
        assert_relative_eq!(result.optimal_point[0], 0.3, epsilon = 1e-3);
        assert_relative_eq!(result.optimal_point[1], -0.4, epsilon = 1e-3);
        assert_relative_eq!(result.optimal_point[2], 0.05, epsilon = 1e-3);
    }

    #[test]
    fn bounds_hold_the_optimum_inside_the_box() {
        // Unconstrained minimum at (2, -3).
        let bounds = [(-0.99, 0.99), (-0.99, 0.99)];
        let result = nelder_mead(
            |x| {
                assert!(x.iter().all(|v| v.abs() <= 0.99));
                (x[0] - 2.0).powi(2) + (x[1] + 3.0).powi(2)
            },
            &[0.1, 0.05],
            Some(&bounds),
            NelderMeadConfig::default(),
        );

        assert_relative_eq!(result.optimal_point[0], 0.99, epsilon = 1e-4);
        assert_relative_eq!(result.optimal_point[1], -0.99, epsilon = 1e-4);
    }

    #[test]
    fn unbounded_intercept_next_to_bounded_coefficient() {
        let bounds = [(f64::NEG_INFINITY, f64::INFINITY), (-0.99, 0.99)];
        let result = nelder_mead(
            |x| (x[0] - 250.0).powi(2) + (x[1] - 0.5).powi(2),
            &[240.0, 0.1],
            Some(&bounds),
            NelderMeadConfig {
                max_iter: 5000,
                ..Default::default()
            },
        );

        assert_relative_eq!(result.optimal_point[0], 250.0, epsilon = 1e-2);
        assert_relative_eq!(result.optimal_point[1], 0.5, epsilon = 1e-2);
    }

    #[test]
    fn stops_when_budget_exhausted() {
        let config = NelderMeadConfig {
            max_duration: Some(Duration::ZERO),
            ..Default::default()
        };
        let result = nelder_mead(|x| x[0].powi(2) + x[1].powi(2), &[0.5, 0.5], None, config);

        assert!(result.timed_out);
        assert!(!result.converged);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.optimal_point.len(), 2);
    }

    #[test]
    fn iteration_cap_is_respected() {
        let config = NelderMeadConfig {
            max_iter: 3,
            ..Default::default()
        };
        let result = nelder_mead(|x| (x[0] - 10.0).powi(2), &[0.0], None, config);

        assert_eq!(result.iterations, 3);
        assert!(!result.converged);
    }

    #[test]
    fn non_finite_objective_never_wins() {
        let result = nelder_mead(
            |x| if x[0] > 0.5 { f64::MAX } else { (x[0] - 0.2).powi(2) },
            &[0.1],
            Some(&[(-0.99, 0.99)]),
            NelderMeadConfig::default(),
        );
        assert_relative_eq!(result.optimal_point[0], 0.2, epsilon = 1e-3);
    }

    #[test]
    fn empty_initial_point() {
        let result = nelder_mead(|_| 0.0, &[], None, NelderMeadConfig::default());

        assert!(!result.converged);
        assert!(result.optimal_value.is_nan());
    }
}
