//! Correction of recording anomalies in raw, textually timestamped frames.
//!
//! The feed marks the two occurrences of the repeated autumn hour as `2A` and
//! `2B` in place of `02`. The first occurrence is the real hour; the second is
//! a duplicate. Both markers only exist in the unparsed text, so correction
//! must run before datetime conversion.

use crate::core::{Frame, RawRecord, TimeColumn};
use crate::error::{ForecastError, Result};
use crate::pipeline::Stage;
use std::collections::HashSet;

/// Marker of the first (valid) occurrence of the ambiguous hour.
pub const AMBIGUOUS_EARLY: &str = "2A";
/// Marker of the repeated occurrence of the ambiguous hour.
pub const AMBIGUOUS_LATE: &str = "2B";
const REAL_HOUR: &str = "02";

fn check_column(frame: &Frame, column: &str) -> Result<()> {
    if frame.time_name() != column {
        return Err(ForecastError::Schema(column.to_string()));
    }
    Ok(())
}

fn retain_rows(mut frame: Frame, keep: &[bool]) -> Frame {
    fn filter<T: Clone>(items: &[T], keep: &[bool]) -> Vec<T> {
        items
            .iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .map(|(item, _)| item.clone())
            .collect()
    }

    frame.time = match &frame.time {
        TimeColumn::Text(ts) => TimeColumn::Text(filter(ts, keep)),
        TimeColumn::Parsed(ts) => TimeColumn::Parsed(filter(ts, keep)),
    };
    frame.values = filter(&frame.values, keep);
    frame
}

/// Drops rows whose timestamp was already seen, keeping the first occurrence.
#[derive(Debug, Clone)]
pub struct RemoveDuplicates {
    column: String,
}

impl RemoveDuplicates {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Stage for RemoveDuplicates {
    fn name(&self) -> &str {
        "remove_duplicates"
    }

    fn apply(&mut self, frame: Frame) -> Result<Frame> {
        check_column(&frame, &self.column)?;

        let keep: Vec<bool> = match frame.time() {
            TimeColumn::Text(ts) => {
                let mut seen = HashSet::with_capacity(ts.len());
                ts.iter().map(|t| seen.insert(t.as_str())).collect()
            }
            TimeColumn::Parsed(ts) => {
                let mut seen = HashSet::with_capacity(ts.len());
                ts.iter().map(|t| seen.insert(*t)).collect()
            }
        };

        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            tracing::info!(dropped, column = %self.column, "removed duplicated timestamps");
        }
        Ok(retain_rows(frame, &keep))
    }
}

/// Resolves the daylight-saving markers: `2A` becomes `02`, `2B` rows are dropped.
#[derive(Debug, Clone)]
pub struct RemoveDateErrors {
    column: String,
}

impl RemoveDateErrors {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Stage for RemoveDateErrors {
    fn name(&self) -> &str {
        "remove_date_errors"
    }

    fn apply(&mut self, mut frame: Frame) -> Result<Frame> {
        check_column(&frame, &self.column)?;
        let TimeColumn::Text(texts) = &mut frame.time else {
            return Err(ForecastError::InvalidParameter(
                "daylight-saving markers must be corrected before datetime conversion".to_string(),
            ));
        };

        let mut rewritten = 0usize;
        for text in texts.iter_mut() {
            if text.contains(AMBIGUOUS_EARLY) {
                *text = text.replace(AMBIGUOUS_EARLY, REAL_HOUR);
                rewritten += 1;
            }
        }
        let keep: Vec<bool> = texts.iter().map(|t| !t.contains(AMBIGUOUS_LATE)).collect();
        let dropped = keep.iter().filter(|k| !**k).count();

        if rewritten > 0 || dropped > 0 {
            tracing::info!(rewritten, dropped, "corrected ambiguous daylight-saving hour");
        }
        Ok(retain_rows(frame, &keep))
    }
}

/// Duplicate removal followed by the daylight-saving correction.
#[derive(Debug, Clone)]
pub struct AnomalyCorrector {
    duplicates: RemoveDuplicates,
    date_errors: RemoveDateErrors,
}

impl AnomalyCorrector {
    pub fn new(column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            duplicates: RemoveDuplicates::new(column.clone()),
            date_errors: RemoveDateErrors::new(column),
        }
    }

    /// Correct a textually timestamped frame.
    pub fn correct(&mut self, frame: Frame) -> Result<Frame> {
        let frame = self.duplicates.apply(frame)?;
        self.date_errors.apply(frame)
    }

    /// Project raw records onto `(time, value)` and correct them.
    pub fn correct_records(&mut self, records: &[RawRecord], value_column: &str) -> Result<Frame> {
        let frame = Frame::from_records(records, &self.duplicates.column, value_column)?;
        self.correct(frame)
    }
}

impl Stage for AnomalyCorrector {
    fn name(&self) -> &str {
        "anomaly_corrector"
    }

    fn apply(&mut self, frame: Frame) -> Result<Frame> {
        self.correct(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(dates: &[&str], values: &[f64]) -> Frame {
        Frame::from_text(
            "Dates",
            "Emissions",
            dates.iter().map(|d| d.to_string()).collect(),
            values.to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn remove_duplicates_keeps_first_occurrence() {
        let input = frame(
            &["2020-01-01 21:00", "2020-01-01 22:00", "2020-01-01 23:00", "2020-01-01 21:00"],
            &[1500.0, 1512.0, 1583.0, 1541.0],
        );
        let result = RemoveDuplicates::new("Dates").apply(input).unwrap();

        assert_eq!(
            result,
            frame(
                &["2020-01-01 21:00", "2020-01-01 22:00", "2020-01-01 23:00"],
                &[1500.0, 1512.0, 1583.0]
            )
        );
    }

    #[test]
    fn remove_date_errors_rewrites_early_and_drops_late() {
        let input = frame(
            &[
                "2020-01-01 01:40",
                "2020-01-01 01:50",
                "2020-01-01 2A:00",
                "2020-01-01 2A:10",
                "2020-01-01 2A:20",
                "2020-01-01 2A:30",
                "2020-01-01 2A:40",
                "2020-01-01 2A:50",
                "2020-01-01 2B:00",
                "2020-01-01 2B:10",
            ],
            &[1500.0, 1512.0, 1583.0, 1541.0, 1500.0, 1512.0, 1583.0, 1541.0, 1600.0, 1700.0],
        );
        let result = RemoveDateErrors::new("Dates").apply(input).unwrap();

        assert_eq!(
            result,
            frame(
                &[
                    "2020-01-01 01:40",
                    "2020-01-01 01:50",
                    "2020-01-01 02:00",
                    "2020-01-01 02:10",
                    "2020-01-01 02:20",
                    "2020-01-01 02:30",
                    "2020-01-01 02:40",
                    "2020-01-01 02:50",
                ],
                &[1500.0, 1512.0, 1583.0, 1541.0, 1500.0, 1512.0, 1583.0, 1541.0]
            )
        );
    }

    #[test]
    fn wrong_column_is_a_schema_error() {
        let input = frame(&["2020-01-01 01:40"], &[1.0]);
        assert_eq!(
            RemoveDuplicates::new("ts").apply(input.clone()),
            Err(ForecastError::Schema("ts".to_string()))
        );
        assert_eq!(
            RemoveDateErrors::new("ts").apply(input),
            Err(ForecastError::Schema("ts".to_string()))
        );
    }

    #[test]
    fn date_errors_require_unparsed_timestamps() {
        let parsed = Frame::from_parsed("Dates", "Emissions", vec![], vec![]).unwrap();
        assert!(matches!(
            RemoveDateErrors::new("Dates").apply(parsed),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn corrector_handles_records_end_to_end() {
        let records: Vec<RawRecord> = [
            ("2020-01-01 01:50", 1.0),
            ("2020-01-01 01:50", 2.0),
            ("2020-01-01 2A:00", 3.0),
            ("2020-01-01 2B:00", 4.0),
            ("2020-01-01 03:00", 5.0),
        ]
        .iter()
        .map(|(ts, v)| RawRecord::new().with_text("Dates", *ts).with_number("Emissions", *v))
        .collect();

        let result = AnomalyCorrector::new("Dates")
            .correct_records(&records, "Emissions")
            .unwrap();
        assert_eq!(
            result,
            frame(
                &["2020-01-01 01:50", "2020-01-01 02:00", "2020-01-01 03:00"],
                &[1.0, 3.0, 5.0]
            )
        );
    }

    #[test]
    fn corrector_reports_missing_key() {
        let records = vec![RawRecord::new().with_number("Emissions", 1.0)];
        assert_eq!(
            AnomalyCorrector::new("Dates").correct_records(&records, "Emissions"),
            Err(ForecastError::Schema("Dates".to_string()))
        );
    }
}
