//! Hold-out split shared by every family's grid search.

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::selection::grid_search::{GridSearch, GridSearchResult};

/// Split off the last `test_size` points as the test window.
pub fn train_test_split(series: &TimeSeries, test_size: usize) -> Result<(TimeSeries, TimeSeries)> {
    if test_size == 0 {
        return Err(ForecastError::InvalidParameter(
            "test_size must be > 0".to_string(),
        ));
    }
    let n = series.len();
    if n <= test_size {
        return Err(ForecastError::InsufficientData {
            needed: test_size + 1,
            got: n,
        });
    }
    let cut = n - test_size;
    Ok((series.slice(0, cut)?, series.slice(cut, n)?))
}

/// Runs grid searches against a fixed train/test split.
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    train: TimeSeries,
    test: TimeSeries,
}

impl ModelTrainer {
    pub fn new(series: &TimeSeries, test_size: usize) -> Result<Self> {
        let (train, test) = train_test_split(series, test_size)?;
        Ok(Self { train, test })
    }

    pub fn train(&self) -> &TimeSeries {
        &self.train
    }

    pub fn test(&self) -> &TimeSeries {
        &self.test
    }

    pub fn grid_search(&self, search: &dyn GridSearch) -> Result<GridSearchResult> {
        tracing::debug!(
            family = search.family(),
            train = self.train.len(),
            test = self.test.len(),
            "starting grid search"
        );
        search.grid_search(&self.train, &self.test)
    }
}
