//! Row records and the two-column frame that moves through the cleaning and
//! preparation stages.

use crate::core::time_series::{TimeSeries, WINDOW_FORMAT};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single cell of a raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Number(f64),
    Text(String),
}

/// One raw row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, Field>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a text cell.
    pub fn with_text(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(column.into(), Field::Text(value.into()));
        self
    }

    /// Builder-style insert of a numeric cell.
    pub fn with_number(mut self, column: impl Into<String>, value: f64) -> Self {
        self.fields.insert(column.into(), Field::Number(value));
        self
    }

    pub fn get(&self, column: &str) -> Option<&Field> {
        self.fields.get(column)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.fields.get(column) {
            Some(Field::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        match self.fields.get(column) {
            Some(Field::Number(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }
}

/// The time column of a frame, before or after datetime conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeColumn {
    Text(Vec<String>),
    Parsed(Vec<DateTime<Utc>>),
}

impl TimeColumn {
    pub fn len(&self) -> usize {
        match self {
            TimeColumn::Text(v) => v.len(),
            TimeColumn::Parsed(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A time column plus one numeric value column.
///
/// `indexed` mirrors whether the time column has been promoted to the index;
/// `frequency` is only set once a fixed interval has been imposed, and
/// `lambda` records the power transform applied to the values, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub(crate) time_name: String,
    pub(crate) value_name: String,
    pub(crate) time: TimeColumn,
    pub(crate) values: Vec<f64>,
    pub(crate) indexed: bool,
    pub(crate) frequency: Option<Duration>,
    pub(crate) lambda: Option<f64>,
}

impl Frame {
    /// Build a frame with textual timestamps.
    pub fn from_text(
        time_name: impl Into<String>,
        value_name: impl Into<String>,
        timestamps: Vec<String>,
        values: Vec<f64>,
    ) -> Result<Self> {
        Self::build(time_name, value_name, TimeColumn::Text(timestamps), values)
    }

    /// Build a frame with already-parsed timestamps (not yet indexed).
    pub fn from_parsed(
        time_name: impl Into<String>,
        value_name: impl Into<String>,
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
    ) -> Result<Self> {
        Self::build(time_name, value_name, TimeColumn::Parsed(timestamps), values)
    }

    fn build(
        time_name: impl Into<String>,
        value_name: impl Into<String>,
        time: TimeColumn,
        values: Vec<f64>,
    ) -> Result<Self> {
        if time.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: time.len(),
                got: values.len(),
            });
        }
        Ok(Self {
            time_name: time_name.into(),
            value_name: value_name.into(),
            time,
            values,
            indexed: false,
            frequency: None,
            lambda: None,
        })
    }

    /// Project raw rows onto a (timestamp text, value) frame.
    pub fn from_records(records: &[RawRecord], time_column: &str, value_column: &str) -> Result<Self> {
        let mut timestamps = Vec::with_capacity(records.len());
        let mut values = Vec::with_capacity(records.len());

        for record in records {
            let ts = record
                .text(time_column)
                .ok_or_else(|| ForecastError::Schema(time_column.to_string()))?;
            let value = record
                .number(value_column)
                .ok_or_else(|| ForecastError::Schema(value_column.to_string()))?;
            timestamps.push(ts.to_string());
            values.push(value);
        }

        Self::from_text(time_column, value_column, timestamps, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn time_name(&self) -> &str {
        &self.time_name
    }

    pub fn value_name(&self) -> &str {
        &self.value_name
    }

    pub fn time(&self) -> &TimeColumn {
        &self.time
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn frequency(&self) -> Option<Duration> {
        self.frequency
    }

    /// Lambda of the power transform applied to the values, if any.
    pub fn lambda(&self) -> Option<f64> {
        self.lambda
    }

    /// Parsed timestamps, if datetime conversion has happened.
    pub fn parsed_timestamps(&self) -> Option<&[DateTime<Utc>]> {
        match &self.time {
            TimeColumn::Parsed(ts) => Some(ts),
            TimeColumn::Text(_) => None,
        }
    }

    /// Raw timestamp strings, if datetime conversion has not happened yet.
    pub fn text_timestamps(&self) -> Option<&[String]> {
        match &self.time {
            TimeColumn::Text(ts) => Some(ts),
            TimeColumn::Parsed(_) => None,
        }
    }

    /// Timestamps rendered as strings, whatever their current representation.
    pub fn timestamp_labels(&self) -> Vec<String> {
        match &self.time {
            TimeColumn::Text(ts) => ts.clone(),
            TimeColumn::Parsed(ts) => ts
                .iter()
                .map(|t| t.format(WINDOW_FORMAT).to_string())
                .collect(),
        }
    }

    /// Timestamps of a frame whose time column is the temporal index.
    pub(crate) fn temporal_index(&self) -> Result<&[DateTime<Utc>]> {
        match (&self.time, self.indexed) {
            (TimeColumn::Parsed(ts), true) => Ok(ts),
            _ => Err(ForecastError::NotTemporalIndex),
        }
    }

    /// Convert a regularized frame into a [`TimeSeries`].
    ///
    /// Requires a temporal index, a declared frequency and no missing values.
    pub fn into_time_series(self) -> Result<TimeSeries> {
        let frequency = self.frequency.ok_or(ForecastError::MissingFrequency)?;
        self.temporal_index()?;
        if self.values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::MissingValues);
        }
        let timestamps = match self.time {
            TimeColumn::Parsed(ts) => ts,
            TimeColumn::Text(_) => return Err(ForecastError::NotTemporalIndex),
        };
        let mut series = TimeSeries::regular(timestamps, self.values, frequency)?;
        series.set_name(self.value_name);
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dates_record(ts: &str, value: f64) -> RawRecord {
        RawRecord::new()
            .with_text("Dates", ts)
            .with_number("Emissions", value)
    }

    #[test]
    fn from_records_projects_columns() {
        let records = vec![
            dates_record("2020-01-01 21:00", 1500.0),
            dates_record("2020-01-01 22:00", 1512.0),
        ];
        let frame = Frame::from_records(&records, "Dates", "Emissions").unwrap();

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.time_name(), "Dates");
        assert_eq!(frame.value_name(), "Emissions");
        assert_eq!(
            frame.text_timestamps().unwrap(),
            &["2020-01-01 21:00".to_string(), "2020-01-01 22:00".to_string()]
        );
        assert_eq!(frame.values(), &[1500.0, 1512.0]);
        assert!(!frame.is_indexed());
    }

    #[test]
    fn from_records_reports_missing_column() {
        let records = vec![RawRecord::new().with_number("Emissions", 1.0)];
        assert_eq!(
            Frame::from_records(&records, "Dates", "Emissions"),
            Err(ForecastError::Schema("Dates".to_string()))
        );

        let records = vec![RawRecord::new().with_text("Dates", "2020-01-01 21:00")];
        assert_eq!(
            Frame::from_records(&records, "Dates", "Emissions"),
            Err(ForecastError::Schema("Emissions".to_string()))
        );
    }

    #[test]
    fn raw_record_deserializes_mixed_fields() {
        let record: RawRecord =
            serde_json::from_str(r#"{"ts": "2020-01-01 2A:00", "car": 1200.5}"#).unwrap();
        assert_eq!(record.text("ts"), Some("2020-01-01 2A:00"));
        assert_eq!(record.number("car"), Some(1200.5));
        assert_eq!(record.number("ts"), None);
        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["car", "ts"]);
    }

    #[test]
    fn into_time_series_requires_regularized_frame() {
        let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let timestamps: Vec<_> = (0..3).map(|i| base + Duration::hours(i)).collect();
        let frame = Frame::from_parsed("Dates", "Emissions", timestamps, vec![1.0, 2.0, 3.0]).unwrap();

        assert_eq!(
            frame.clone().into_time_series(),
            Err(ForecastError::MissingFrequency)
        );

        let mut indexed = frame.clone();
        indexed.frequency = Some(Duration::hours(1));
        assert_eq!(
            indexed.clone().into_time_series(),
            Err(ForecastError::NotTemporalIndex)
        );

        indexed.indexed = true;
        let series = indexed.into_time_series().unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.name(), Some("Emissions"));
        assert_eq!(series.frequency(), Some(Duration::hours(1)));
    }

    #[test]
    fn length_mismatch_rejected() {
        let result = Frame::from_text("Dates", "Emissions", vec!["a".to_string()], vec![]);
        assert!(matches!(
            result,
            Err(ForecastError::DimensionMismatch { expected: 1, got: 0 })
        ));
    }
}
