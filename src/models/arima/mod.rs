//! Seasonal ARIMA models.
//!
//! This module provides:
//! - SARIMA(p, d, q)(P, D, Q)\[s\] models estimated by exact maximum likelihood
//! - The Kalman-filter likelihood of the underlying ARMA process
//! - Differencing and lag-polynomial helpers shared by fitting and forecasting

mod diff;
mod likelihood;
mod model;

pub use diff::{
    difference, differencing_polynomial, integrate, lag_polynomial, poly_mul, seasonal_difference,
};
pub use model::{SARIMASpec, SARIMA};
