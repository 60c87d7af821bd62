//! TimeSeries data structure for representing regularized temporal data.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Format used when reporting the training window of a model.
pub const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M";

/// The `horizon` timestamps following `last` at `frequency` spacing.
///
/// Fails with `InvalidParameter` when a timestamp would leave the representable range.
pub fn future_timestamps(
    last: DateTime<Utc>,
    frequency: Duration,
    horizon: usize,
) -> Result<Vec<DateTime<Utc>>> {
    let mut timestamps = Vec::with_capacity(horizon);
    let mut current = last;
    for step in 1..=horizon {
        current = current.checked_add_signed(frequency).ok_or_else(|| {
            ForecastError::InvalidParameter(format!(
                "forecast step {step} at {frequency} spacing overflows the timestamp range"
            ))
        })?;
        timestamps.push(current);
    }
    Ok(timestamps)
}

/// A univariate time series with strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
    name: Option<String>,
    frequency: Option<Duration>,
}

impl TimeSeries {
    /// Create a simple univariate time series.
    pub fn univariate(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        // Validate timestamps are strictly increasing
        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(ForecastError::TimestampError(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }

        if values.len() != timestamps.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }

        Ok(Self {
            timestamps,
            values,
            name: None,
            frequency: None,
        })
    }

    /// Create a series whose timestamps are exactly `frequency` apart.
    pub fn regular(
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
        frequency: Duration,
    ) -> Result<Self> {
        if frequency <= Duration::zero() {
            return Err(ForecastError::InvalidParameter(
                "frequency must be positive".to_string(),
            ));
        }
        if let Some(w) = timestamps.windows(2).find(|w| w[1] - w[0] != frequency) {
            return Err(ForecastError::TimestampError(format!(
                "gap between {} and {} does not match the declared frequency",
                w[0], w[1]
            )));
        }

        let mut series = Self::univariate(timestamps, values)?;
        series.frequency = Some(frequency);
        Ok(series)
    }

    /// Get the number of observations.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Get timestamps.
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Get the observed values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Series name (the value column it was built from).
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the series name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Get frequency.
    pub fn frequency(&self) -> Option<Duration> {
        self.frequency
    }

    /// Set frequency.
    pub fn set_frequency(&mut self, freq: Duration) {
        self.frequency = Some(freq);
    }

    /// First timestamp, if any.
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    /// Last timestamp, if any.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Start and end of the series formatted as `YYYY-MM-DD HH:MM`.
    pub fn window(&self) -> Option<(String, String)> {
        let start = self.first_timestamp()?;
        let end = self.last_timestamp()?;
        Some((
            start.format(WINDOW_FORMAT).to_string(),
            end.format(WINDOW_FORMAT).to_string(),
        ))
    }

    /// Extract a slice of the time series.
    pub fn slice(&self, start: usize, end: usize) -> Result<TimeSeries> {
        if start > end {
            return Err(ForecastError::InvalidParameter(
                "start must be <= end".to_string(),
            ));
        }
        if end > self.len() {
            return Err(ForecastError::IndexOutOfBounds {
                index: end,
                size: self.len(),
            });
        }

        Ok(TimeSeries {
            timestamps: self.timestamps[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
            name: self.name.clone(),
            frequency: self.frequency,
        })
    }

    /// Return a copy with the values replaced, keeping the index.
    pub fn with_values(&self, values: Vec<f64>) -> Result<TimeSeries> {
        if values.len() != self.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        Ok(TimeSeries {
            timestamps: self.timestamps.clone(),
            values,
            name: self.name.clone(),
            frequency: self.frequency,
        })
    }

    /// Check if series has missing values (NaN or Inf).
    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    /// Declared frequency, falling back to the modal spacing of the timestamps.
    pub fn frequency_or_infer(&self) -> Result<Duration> {
        match self.frequency {
            Some(freq) => Ok(freq),
            None => self.infer_frequency(0.5),
        }
    }

    /// Infer frequency from timestamps.
    pub fn infer_frequency(&self, tolerance: f64) -> Result<Duration> {
        if self.len() < 2 {
            return Err(ForecastError::InsufficientData {
                needed: 2,
                got: self.len(),
            });
        }

        let diffs: Vec<i64> = self
            .timestamps
            .windows(2)
            .map(|w| (w[1] - w[0]).num_seconds())
            .collect();

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for &diff in &diffs {
            *counts.entry(diff).or_insert(0) += 1;
        }

        // Ties resolve to the smaller spacing so inference is deterministic.
        let (modal_diff, modal_count) = counts
            .iter()
            .max_by(|(da, ca), (db, cb)| ca.cmp(cb).then(db.cmp(da)))
            .map(|(&diff, &count)| (diff, count))
            .ok_or(ForecastError::MissingFrequency)?;

        let modal_ratio = modal_count as f64 / diffs.len() as f64;
        if modal_ratio < tolerance {
            return Err(ForecastError::MissingFrequency);
        }

        Ok(Duration::seconds(modal_diff))
    }
}
