//! Forecasting models.

mod candidate;
mod traits;

pub mod arima;
pub mod prophet;

pub use arima::{SARIMASpec, SARIMA};
pub use candidate::ModelCandidate;
pub use prophet::{Prophet, SeasonalityMode, SeasonalityToggle};
pub use traits::{BoxedForecaster, Forecaster, ModelInfo, DEFAULT_HORIZON};
