//! Hyperparameter search and cross-family model selection.
//!
//! Each family implements [`GridSearch`]. The [`ModelSelector`] splits the
//! prepared series once, runs every registered family against that split and
//! hands back the configuration with the smallest hold-out MAE.

pub mod grid_search;
pub mod selector;
pub mod trainer;

pub use grid_search::{
    ArimaGridSearch, GridSearch, GridSearchResult, ProphetGridSearch,
};
pub use selector::{ModelSelector, Selection, SelectionSummary};
pub use trainer::{train_test_split, ModelTrainer};
