//! Immutable run configuration loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```
//! use emissions_forecast::config::ForecastConfig;
//!
//! let config = ForecastConfig::from_toml_str("[evaluation]\nfolds = 5").unwrap();
//! assert_eq!(config.evaluation.folds, 5);
//! assert_eq!(config.evaluation.fold_size, 48);
//! ```

use crate::error::{ForecastError, Result};
use crate::ingest::EmissionFactors;
use crate::models::prophet::{SeasonalityMode, SeasonalityToggle};
use crate::pipeline::Aggregation;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub emissions: EmissionFactors,
    pub preparation: PreparationConfig,
    pub arima: ArimaSearchConfig,
    pub prophet: ProphetSearchConfig,
    pub selection: SelectionConfig,
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreparationConfig {
    pub time_column: String,
    pub value_column: String,
    /// Interval imposed on the raw series, in minutes.
    pub source_frequency_minutes: i64,
    /// Interval of the prepared series, in minutes.
    pub target_frequency_minutes: i64,
    pub aggregation: Aggregation,
    pub power_transform: bool,
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            time_column: "Dates".to_string(),
            value_column: "Emissions".to_string(),
            source_frequency_minutes: 10,
            target_frequency_minutes: 60,
            aggregation: Aggregation::Mean,
            power_transform: true,
        }
    }
}

impl PreparationConfig {
    pub fn source_frequency(&self) -> Duration {
        Duration::minutes(self.source_frequency_minutes)
    }

    pub fn target_frequency(&self) -> Duration {
        Duration::minutes(self.target_frequency_minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArimaSearchConfig {
    /// Every order is searched over `0..range_limit`.
    pub range_limit: usize,
    pub seasonal_period: usize,
    pub parallel: bool,
    /// Wall-clock budget for a single fit, in milliseconds.
    pub fit_time_budget_ms: Option<u64>,
}

impl Default for ArimaSearchConfig {
    fn default() -> Self {
        Self {
            range_limit: 2,
            seasonal_period: 2,
            parallel: true,
            fit_time_budget_ms: None,
        }
    }
}

impl ArimaSearchConfig {
    pub fn fit_time_budget(&self) -> Option<std::time::Duration> {
        self.fit_time_budget_ms.map(std::time::Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProphetSearchConfig {
    pub modes: Vec<SeasonalityMode>,
    pub yearly: SeasonalityToggle,
    pub weekly: SeasonalityToggle,
    pub daily: SeasonalityToggle,
}

impl Default for ProphetSearchConfig {
    fn default() -> Self {
        Self {
            modes: vec![SeasonalityMode::Additive, SeasonalityMode::Multiplicative],
            yearly: SeasonalityToggle::Auto,
            weekly: SeasonalityToggle::Auto,
            daily: SeasonalityToggle::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Number of trailing points held out to score each candidate.
    pub test_size: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { test_size: 48 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub folds: usize,
    pub fold_size: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            folds: 10,
            fold_size: 48,
        }
    }
}

impl ForecastConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ForecastConfig =
            toml::from_str(text).map_err(|e| ForecastError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ForecastError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let prep = &self.preparation;
        if prep.source_frequency_minutes <= 0 || prep.target_frequency_minutes <= 0 {
            return Err(ForecastError::Config(
                "preparation frequencies must be positive".to_string(),
            ));
        }
        if prep.target_frequency_minutes < prep.source_frequency_minutes {
            return Err(ForecastError::Config(
                "target frequency must not be finer than the source frequency".to_string(),
            ));
        }
        if self.arima.range_limit == 0 {
            return Err(ForecastError::Config("arima.range_limit must be > 0".to_string()));
        }
        if self.arima.seasonal_period < 2 {
            return Err(ForecastError::Config(
                "arima.seasonal_period must be >= 2".to_string(),
            ));
        }
        if self.prophet.modes.is_empty() {
            return Err(ForecastError::Config(
                "prophet.modes must list at least one mode".to_string(),
            ));
        }
        if self.selection.test_size == 0 {
            return Err(ForecastError::Config("selection.test_size must be > 0".to_string()));
        }
        if self.evaluation.folds == 0 || self.evaluation.fold_size == 0 {
            return Err(ForecastError::Config(
                "evaluation.folds and evaluation.fold_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
