//! Core data structures for emissions series preparation and forecasting.

mod forecast;
mod frame;
mod time_series;

pub use forecast::Forecast;
pub use frame::{Field, Frame, RawRecord, TimeColumn};
pub use time_series::{future_timestamps, TimeSeries, WINDOW_FORMAT};
