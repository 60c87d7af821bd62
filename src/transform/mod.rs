//! Variance-stabilizing transforms applied before modelling.
//!
//! # Example
//!
//! ```
//! use emissions_forecast::transform::{inverse_transform, transform};
//!
//! let series = vec![1500.0, 1512.0, 1583.0, 1541.0];
//! let result = transform(&series).unwrap();
//! let recovered = inverse_transform(&result.data, result.lambda);
//! assert!((recovered[0] - 1500.0).abs() < 1e-6);
//! ```

pub mod boxcox;

pub use boxcox::{boxcox, boxcox_lambda, inverse_transform, transform, BoxCoxResult};
