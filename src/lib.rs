//! # emissions-forecast
//!
//! Preparation and forecasting of hourly CO2 emissions derived from the
//! electricity generation mix.
//!
//! Raw observations are cleaned of daylight-saving anomalies, regularized to a
//! fixed hourly grid and power-transformed. SARIMA and Prophet-style models are
//! then grid-searched on a hold-out window, the best configuration is selected
//! and can be backtested with rolling-origin cross-validation.

// Model names such as SARIMA and OLS keep their usual spelling.
#![allow(clippy::upper_case_acronyms)]
// Matrix kernels index several arrays with one loop variable.
#![allow(clippy::needless_range_loop)]

pub mod cleaning;
pub mod config;
pub mod core;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod selection;
pub mod transform;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::config::ForecastConfig;
    pub use crate::core::{Forecast, Frame, TimeSeries};
    pub use crate::error::{ForecastError, Result};
    pub use crate::models::{Forecaster, ModelCandidate};
    pub use crate::pipeline::{prepare, PreparedSeries};
    pub use crate::selection::ModelSelector;
    pub use crate::utils::{calculate_metrics, AccuracyMetrics, ModelEvaluation};
}
