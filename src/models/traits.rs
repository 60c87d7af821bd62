//! Forecaster trait defining the common interface for all models.

use crate::core::{Forecast, TimeSeries};
use crate::error::Result;
use crate::utils::metrics::mae;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Horizon used by [`Forecaster::predict_default`].
pub const DEFAULT_HORIZON: usize = 48;

/// Descriptive record of a model for reporting and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub parameters: BTreeMap<String, String>,
    /// Start and end of the training window, formatted `YYYY-MM-DD HH:MM`.
    pub training_window: Option<(String, String)>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
            training_window: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.parameters.insert(key.into(), value.to_string());
        self
    }

    pub fn with_window(mut self, window: Option<(String, String)>) -> Self {
        self.training_window = window;
        self
    }
}

/// Common interface for all forecasting models.
///
/// This trait is object-safe and can be used with `Box<dyn Forecaster>`.
pub trait Forecaster {
    /// Fit the model to the time series data.
    fn fit(&mut self, series: &TimeSeries) -> Result<()>;

    /// Generate predictions for the specified horizon.
    fn predict(&self, horizon: usize) -> Result<Forecast>;

    /// Predict [`DEFAULT_HORIZON`] steps ahead.
    fn predict_default(&self) -> Result<Forecast> {
        self.predict(DEFAULT_HORIZON)
    }

    /// Generate predictions with confidence intervals.
    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        // Default implementation just returns point predictions
        let _ = level;
        self.predict(horizon)
    }

    /// Mean absolute error of `predicted` against `real`.
    fn score(&self, real: &[f64], predicted: &[f64]) -> Result<f64> {
        mae(real, predicted)
    }

    /// Name, hyperparameters and training window of the model.
    fn info(&self) -> ModelInfo;

    /// Get the fitted values (in-sample predictions).
    fn fitted_values(&self) -> Option<&[f64]>;

    /// Get the residuals (actual - fitted).
    fn residuals(&self) -> Option<&[f64]>;

    /// Get the model name.
    fn name(&self) -> &str;

    /// Check if the model has been fitted.
    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

/// Type alias for boxed forecaster trait objects.
///
/// # Example
///
/// ```
/// use emissions_forecast::models::{BoxedForecaster, Forecaster};
/// use emissions_forecast::models::arima::SARIMA;
///
/// let model: BoxedForecaster = Box::new(SARIMA::new((1, 0, 0), (0, 0, 0, 0)));
/// assert_eq!(model.name(), "SARIMA");
/// ```
pub type BoxedForecaster = Box<dyn Forecaster + Send>;
