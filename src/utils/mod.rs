//! Numerical helpers shared by the models, grid search and evaluation.

pub mod cross_validation;
pub mod metrics;
pub mod ols;
pub mod optimization;
pub mod stats;

pub use cross_validation::{CrossValidationReport, ModelEvaluation};
pub use metrics::{calculate_metrics, mae, mape, mse, rmse, AccuracyMetrics};
pub use ols::{ols_fit, OLSResult, Regressor};
pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use stats::{mean, quantile_normal};
