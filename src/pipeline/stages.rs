//! Preparation stages: datetime conversion, sorting, regularization and resampling.

use super::Stage;
use crate::core::{Frame, TimeColumn};
use crate::error::{ForecastError, Result};
use crate::transform::transform;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

fn check_column(frame: &Frame, column: &str) -> Result<()> {
    if frame.time_name != column {
        return Err(ForecastError::Schema(column.to_string()));
    }
    Ok(())
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ForecastError::Parse(text.to_string()))
}

/// Parses the textual time column into UTC timestamps.
#[derive(Debug, Clone)]
pub struct ConvertToDatetime {
    column: String,
}

impl ConvertToDatetime {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Stage for ConvertToDatetime {
    fn name(&self) -> &str {
        "convert_to_datetime"
    }

    fn apply(&mut self, mut frame: Frame) -> Result<Frame> {
        check_column(&frame, &self.column)?;
        if let TimeColumn::Text(texts) = &frame.time {
            let parsed = texts
                .iter()
                .map(|t| parse_timestamp(t))
                .collect::<Result<Vec<_>>>()?;
            frame.time = TimeColumn::Parsed(parsed);
        }
        Ok(frame)
    }
}

/// Promotes the time column to the index and sorts ascending by it.
///
/// Sorting is stable, so rows sharing a timestamp keep their relative order.
#[derive(Debug, Clone)]
pub struct SortByIndex {
    column: String,
}

impl SortByIndex {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Stage for SortByIndex {
    fn name(&self) -> &str {
        "sort_by_index"
    }

    fn apply(&mut self, mut frame: Frame) -> Result<Frame> {
        check_column(&frame, &self.column)?;
        let timestamps = match &frame.time {
            TimeColumn::Parsed(ts) => ts,
            TimeColumn::Text(_) => return Err(ForecastError::NotTemporalIndex),
        };
        frame.indexed = true;

        if timestamps.windows(2).all(|w| w[0] <= w[1]) {
            return Ok(frame);
        }

        let mut order: Vec<usize> = (0..timestamps.len()).collect();
        order.sort_by_key(|&i| timestamps[i]);
        let sorted_ts = order.iter().map(|&i| timestamps[i]).collect();
        let sorted_values = order.iter().map(|&i| frame.values[i]).collect();

        frame.time = TimeColumn::Parsed(sorted_ts);
        frame.values = sorted_values;
        Ok(frame)
    }
}

/// Imposes a fixed interval on the index.
///
/// The grid runs from the first to the last timestamp; ticks without an
/// observation become NaN and observations off the grid are dropped.
#[derive(Debug, Clone)]
pub struct SetFrequency {
    frequency: Duration,
}

impl SetFrequency {
    pub fn new(frequency: Duration) -> Self {
        Self { frequency }
    }
}

impl Stage for SetFrequency {
    fn name(&self) -> &str {
        "set_frequency"
    }

    fn apply(&mut self, mut frame: Frame) -> Result<Frame> {
        if self.frequency <= Duration::zero() {
            return Err(ForecastError::InvalidParameter(
                "frequency must be positive".to_string(),
            ));
        }
        let timestamps = frame.temporal_index()?;
        if let Some(w) = timestamps.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ForecastError::TimestampError(format!(
                "index must be sorted and unique, found {} before {}",
                w[0], w[1]
            )));
        }
        if frame.is_empty() {
            frame.frequency = Some(self.frequency);
            return Ok(frame);
        }

        let timestamps = frame.temporal_index()?;
        let (first, last) = (timestamps[0], timestamps[timestamps.len() - 1]);

        let mut grid = Vec::new();
        let mut values = Vec::new();
        let mut source = timestamps.iter().zip(frame.values.iter()).peekable();
        let mut tick = first;
        while tick <= last {
            while source.next_if(|(ts, _)| **ts < tick).is_some() {}
            let value = match source.next_if(|(ts, _)| **ts == tick) {
                Some((_, &v)) => v,
                None => f64::NAN,
            };
            grid.push(tick);
            values.push(value);
            tick += self.frequency;
        }

        let missing = values.iter().filter(|v| v.is_nan()).count();
        tracing::debug!(
            rows_in = frame.values.len(),
            rows_out = grid.len(),
            missing,
            "regularized index"
        );

        frame.time = TimeColumn::Parsed(grid);
        frame.values = values;
        frame.frequency = Some(self.frequency);
        Ok(frame)
    }
}

/// Fills missing values by linear interpolation over elapsed time.
///
/// Gaps before the first or after the last valid value take the nearest
/// valid value.
#[derive(Debug, Clone, Default)]
pub struct Interpolation;

impl Interpolation {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Interpolation {
    fn name(&self) -> &str {
        "interpolation"
    }

    fn apply(&mut self, mut frame: Frame) -> Result<Frame> {
        if !frame.values.iter().any(|v| v.is_nan()) {
            return Ok(frame);
        }
        let timestamps = frame.temporal_index()?;
        let values = &frame.values;

        let valid: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
        let (Some(&first_valid), Some(&last_valid)) = (valid.first(), valid.last()) else {
            return Err(ForecastError::MissingValues);
        };

        let mut filled = values.clone();
        for slot in filled.iter_mut().take(first_valid) {
            *slot = values[first_valid];
        }
        for slot in filled.iter_mut().skip(last_valid + 1) {
            *slot = values[last_valid];
        }
        for pair in valid.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            if right - left < 2 {
                continue;
            }
            let span = (timestamps[right] - timestamps[left]).num_milliseconds() as f64;
            for i in left + 1..right {
                let elapsed = (timestamps[i] - timestamps[left]).num_milliseconds() as f64;
                filled[i] = values[left] + (values[right] - values[left]) * elapsed / span;
            }
        }

        tracing::debug!(
            filled = values.len() - valid.len(),
            "interpolated missing values"
        );
        frame.values = filled;
        Ok(frame)
    }
}

/// Aggregation applied to each resampling bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
}

impl Aggregation {
    /// Aggregate the non-missing values of a bin.
    ///
    /// An empty bin has a NaN mean and a zero sum.
    pub fn aggregate(&self, values: &[f64]) -> f64 {
        let present = values.iter().filter(|v| !v.is_nan());
        match self {
            Aggregation::Sum => present.sum(),
            Aggregation::Mean => {
                let (sum, count) = present.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                if count == 0 {
                    f64::NAN
                } else {
                    sum / count as f64
                }
            }
        }
    }
}

/// Aggregates a fixed-frequency series onto a coarser grid.
///
/// Bins are aligned to multiples of the target interval since the Unix epoch
/// and labelled by their left edge.
#[derive(Debug, Clone)]
pub struct Resampler {
    target: Duration,
    aggregation: Aggregation,
}

impl Resampler {
    pub fn new(target: Duration, aggregation: Aggregation) -> Self {
        Self {
            target,
            aggregation,
        }
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }
}

impl Stage for Resampler {
    fn name(&self) -> &str {
        "resampler"
    }

    fn apply(&mut self, mut frame: Frame) -> Result<Frame> {
        if frame.frequency.is_none() {
            return Err(ForecastError::MissingFrequency);
        }
        let width = self.target.num_seconds();
        if width <= 0 {
            return Err(ForecastError::InvalidParameter(
                "resampling frequency must be at least one second".to_string(),
            ));
        }
        let timestamps = frame.temporal_index()?;

        let mut labels = Vec::new();
        let mut values = Vec::new();
        if let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) {
            let first_bin = first.timestamp().div_euclid(width);
            let last_bin = last.timestamp().div_euclid(width);
            let mut start = 0;
            for bin in first_bin..=last_bin {
                let end = start
                    + timestamps[start..]
                        .iter()
                        .take_while(|ts| ts.timestamp().div_euclid(width) == bin)
                        .count();
                let label = DateTime::from_timestamp(bin * width, 0).ok_or_else(|| {
                    ForecastError::ComputationError(format!("bin {bin} is out of range"))
                })?;
                labels.push(label);
                values.push(self.aggregation.aggregate(&frame.values[start..end]));
                start = end;
            }
        }

        frame.time = TimeColumn::Parsed(labels);
        frame.values = values;
        frame.frequency = Some(self.target);
        Ok(frame)
    }
}

/// Applies the variance-stabilizing power transform, remembering its lambda.
#[derive(Debug, Clone, Default)]
pub struct PowerTransform {
    lambda: Option<f64>,
}

impl PowerTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lambda learned by the last application.
    pub fn lambda(&self) -> Option<f64> {
        self.lambda
    }
}

impl Stage for PowerTransform {
    fn name(&self) -> &str {
        "power_transform"
    }

    fn apply(&mut self, mut frame: Frame) -> Result<Frame> {
        let result = transform(&frame.values)?;
        self.lambda = Some(result.lambda);
        frame.values = result.data;
        frame.lambda = Some(result.lambda);
        Ok(frame)
    }
}
