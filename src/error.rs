//! Error types for the emissions-forecast library.

use thiserror::Error;

/// Result type alias for cleaning, preparation and forecasting operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while preparing a series or selecting a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// An expected column or key is absent from a record.
    #[error("schema error: missing column '{0}'")]
    Schema(String),

    /// A timestamp string could not be parsed.
    #[error("could not parse timestamp '{0}'")]
    Parse(String),

    /// The operation needs a declared fixed frequency.
    #[error("series has no declared frequency")]
    MissingFrequency,

    /// The operation needs a parsed, index-assigned time column.
    #[error("series is not indexed by a temporal column")]
    NotTemporalIndex,

    /// Timestamp ordering or uniqueness error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// The power transform received values outside its domain.
    #[error("domain error: {0}")]
    Domain(String),

    /// A model could not be fitted with the requested hyperparameters.
    #[error("model fit failed: {0}")]
    ModelFit(String),

    /// Model selection found no usable candidate.
    #[error("no viable model: every candidate family scored an infinite error")]
    NoViableModel,

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// Missing values detected when not allowed.
    #[error("missing values detected in data")]
    MissingValues,

    /// Index out of bounds.
    #[error("index out of bounds: {index} (size: {size})")]
    IndexOutOfBounds { index: usize, size: usize },

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}
