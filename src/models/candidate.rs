//! Closed set of model families the selector can hand back.

use crate::core::{Forecast, TimeSeries};
use crate::error::Result;
use crate::models::arima::SARIMA;
use crate::models::prophet::Prophet;
use crate::models::{Forecaster, ModelInfo};

/// A configured model from one of the searchable families.
#[derive(Debug, Clone)]
pub enum ModelCandidate {
    Sarima(SARIMA),
    Prophet(Prophet),
}

impl ModelCandidate {
    fn inner(&self) -> &dyn Forecaster {
        match self {
            ModelCandidate::Sarima(model) => model,
            ModelCandidate::Prophet(model) => model,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Forecaster {
        match self {
            ModelCandidate::Sarima(model) => model,
            ModelCandidate::Prophet(model) => model,
        }
    }
}

impl From<SARIMA> for ModelCandidate {
    fn from(model: SARIMA) -> Self {
        ModelCandidate::Sarima(model)
    }
}

impl From<Prophet> for ModelCandidate {
    fn from(model: Prophet) -> Self {
        ModelCandidate::Prophet(model)
    }
}

impl Forecaster for ModelCandidate {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        self.inner_mut().fit(series)
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        self.inner().predict(horizon)
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        self.inner().predict_with_intervals(horizon, level)
    }

    fn info(&self) -> ModelInfo {
        self.inner().info()
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.inner().fitted_values()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.inner().residuals()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}
