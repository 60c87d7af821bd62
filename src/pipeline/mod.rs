//! Ordered stage pipelines that turn raw emissions frames into prepared series.
//!
//! Every stage takes a [`Frame`] and returns a new one, so stages can be tested
//! in isolation and composed freely.
//!
//! # Example
//!
//! ```
//! use emissions_forecast::config::PreparationConfig;
//! use emissions_forecast::core::Frame;
//! use emissions_forecast::pipeline::prepare;
//!
//! let dates = ["2020-01-01 01:00", "2020-01-01 01:10", "2020-01-01 01:20"];
//! let frame = Frame::from_text(
//!     "Dates",
//!     "Emissions",
//!     dates.iter().map(|d| d.to_string()).collect(),
//!     vec![2.0, 2.0, 2.0],
//! )
//! .unwrap();
//!
//! let prepared = prepare(frame, &PreparationConfig::default()).unwrap();
//! assert_eq!(prepared.series.len(), 1);
//! ```

mod stages;

pub use stages::{
    Aggregation, ConvertToDatetime, Interpolation, PowerTransform, Resampler, SetFrequency,
    SortByIndex,
};

use crate::cleaning::{RemoveDateErrors, RemoveDuplicates};
use crate::config::PreparationConfig;
use crate::core::{Frame, TimeSeries};
use crate::error::Result;
use crate::transform::inverse_transform;

/// A single transformation step of a pipeline.
pub trait Stage: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Apply the stage, returning the transformed frame.
    fn apply(&mut self, frame: Frame) -> Result<Frame>;
}

/// An ordered list of stages run one after another.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append every stage of another pipeline.
    pub fn then(mut self, other: Pipeline) -> Self {
        self.stages.extend(other.stages);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order. The first failing stage aborts the run.
    pub fn run(&mut self, frame: Frame) -> Result<Frame> {
        self.stages.iter_mut().try_fold(frame, |frame, stage| {
            let rows_in = frame.len();
            let frame = stage.apply(frame)?;
            tracing::debug!(
                stage = stage.name(),
                rows_in,
                rows_out = frame.len(),
                "applied pipeline stage"
            );
            Ok(frame)
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// A regularized, optionally power-transformed series ready for modelling.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    pub series: TimeSeries,
    /// Lambda of the power transform, needed to map forecasts back.
    pub lambda: Option<f64>,
}

impl PreparedSeries {
    /// Map values from the transformed scale back to emissions units.
    pub fn to_original_scale(&self, values: &[f64]) -> Vec<f64> {
        match self.lambda {
            Some(lambda) => inverse_transform(values, lambda),
            None => values.to_vec(),
        }
    }
}

/// Duplicate removal followed by the daylight-saving correction.
pub fn cleaning_pipeline(time_column: &str) -> Pipeline {
    Pipeline::new()
        .with_stage(RemoveDuplicates::new(time_column))
        .with_stage(RemoveDateErrors::new(time_column))
}

/// Datetime conversion, sorting, regularization, resampling and power transform.
pub fn preparation_pipeline(config: &PreparationConfig) -> Pipeline {
    let pipeline = Pipeline::new()
        .with_stage(ConvertToDatetime::new(&config.time_column))
        .with_stage(SortByIndex::new(&config.time_column))
        .with_stage(SetFrequency::new(config.source_frequency()))
        .with_stage(Interpolation::new())
        .with_stage(Resampler::new(config.target_frequency(), config.aggregation));

    if config.power_transform {
        pipeline.with_stage(PowerTransform::new())
    } else {
        pipeline
    }
}

/// Clean and prepare a raw emissions frame.
pub fn prepare(frame: Frame, config: &PreparationConfig) -> Result<PreparedSeries> {
    let mut pipeline = cleaning_pipeline(&config.time_column).then(preparation_pipeline(config));
    let frame = pipeline.run(frame)?;
    let lambda = frame.lambda();
    let series = frame.into_time_series()?;

    tracing::info!(
        rows = series.len(),
        lambda = ?lambda,
        "prepared emissions series"
    );
    Ok(PreparedSeries { series, lambda })
}
