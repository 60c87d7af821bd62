//! Cross-family model selection.

use crate::config::ForecastConfig;
use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::{Forecaster, ModelCandidate, ModelInfo};
use crate::selection::grid_search::{
    best_index, ArimaGridSearch, GridSearch, GridSearchResult, ProphetGridSearch,
};
use crate::selection::trainer::ModelTrainer;
use serde::{Deserialize, Serialize};

/// Outcome of a selection run, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSummary {
    /// Every family's best MAE, in registration order. Failed families report `inf`.
    pub families: Vec<(String, f64)>,
    pub winner: String,
    pub winner_mae: f64,
    pub winner_info: ModelInfo,
}

/// The chosen model together with how it was chosen.
#[derive(Debug, Clone)]
pub struct Selection {
    pub model: ModelCandidate,
    pub summary: SelectionSummary,
}

/// Grid-searches every registered family on one train/test split and keeps the best.
pub struct ModelSelector {
    series: TimeSeries,
    test_size: usize,
    families: Vec<Box<dyn GridSearch>>,
}

impl std::fmt::Debug for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSelector")
            .field("series_len", &self.series.len())
            .field("test_size", &self.test_size)
            .field("families", &self.families())
            .finish()
    }
}

impl ModelSelector {
    /// Selector with no families registered and a 48-point test window.
    pub fn new(series: TimeSeries) -> Self {
        Self {
            series,
            test_size: 48,
            families: Vec::new(),
        }
    }

    /// Selector with the ARIMA and Prophet families configured from `config`.
    pub fn from_config(series: TimeSeries, config: &ForecastConfig) -> Self {
        Self::new(series)
            .with_test_size(config.selection.test_size)
            .register(ArimaGridSearch::from_config(&config.arima))
            .register(ProphetGridSearch::from_config(&config.prophet))
    }

    pub fn with_test_size(mut self, test_size: usize) -> Self {
        self.test_size = test_size;
        self
    }

    /// Add a family. Families are searched, and ties broken, in registration order.
    pub fn register(mut self, search: impl GridSearch + 'static) -> Self {
        self.families.push(Box::new(search));
        self
    }

    pub fn families(&self) -> Vec<&str> {
        self.families.iter().map(|f| f.family()).collect()
    }

    /// Run every family's grid search against the same split.
    pub fn grid_search_all(&self) -> Result<Vec<GridSearchResult>> {
        if self.families.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "no model families registered".to_string(),
            ));
        }
        let trainer = ModelTrainer::new(&self.series, self.test_size)?;
        self.families
            .iter()
            .map(|family| trainer.grid_search(family.as_ref()))
            .collect()
    }

    /// The result with the strictly smallest MAE, first one on ties.
    pub fn compare_models(results: &[GridSearchResult]) -> Result<&GridSearchResult> {
        let scores: Vec<f64> = results.iter().map(|r| r.mae).collect();
        best_index(&scores)
            .map(|i| &results[i])
            .ok_or(ForecastError::NoViableModel)
    }

    /// Search, compare and summarize.
    pub fn select(&self) -> Result<Selection> {
        let results = self.grid_search_all()?;
        let best = Self::compare_models(&results)?;

        let summary = SelectionSummary {
            families: results.iter().map(|r| (r.name.clone(), r.mae)).collect(),
            winner: best.name.clone(),
            winner_mae: best.mae,
            winner_info: best.model.info(),
        };
        tracing::info!(
            winner = %summary.winner,
            mae = summary.winner_mae,
            families = summary.families.len(),
            "selected model"
        );

        Ok(Selection {
            model: best.model.clone(),
            summary,
        })
    }

    /// The winning model, unfitted and configured with its best hyperparameters.
    pub fn select_best_model(&self) -> Result<ModelCandidate> {
        Ok(self.select()?.model)
    }
}
