//! Configuration structures for the training run.
//!
//! This module provides strongly-typed configuration management using TOML files.
//! The configuration covers the data source, the train/test split, model seeding,
//! and the hyperparameter grid searched during training. The grid is policy, not
//! code: deployments change it by editing `config.toml`.

use super::search::ParamGrid;
use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Data loading configuration
    pub data: DataConfig,
    /// Model randomness
    pub model: ModelConfig,
    /// Hyperparameter search configuration
    pub search: SearchConfig,
}

/// Data loading configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    /// Table holding the cleaned messages
    pub table: String,
    /// Fraction of rows held out for evaluation (e.g., 0.2 = 20% test)
    pub test_size: f64,
    /// Seed for the train/test shuffle
    pub split_seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            table: "cleaned_data".to_string(),
            test_size: 0.2,
            split_seed: 42,
        }
    }
}

/// Model configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Root seed for bootstrap and feature sampling in every forest
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig { seed: 42 }
    }
}

/// Grid search configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidate n-gram spans for the vectorizer
    pub ngram_ranges: Vec<(usize, usize)>,
    /// Candidate forest sizes
    pub n_estimators: Vec<usize>,
    /// Candidate minimum sample counts for splitting a node
    pub min_samples_split: Vec<usize>,
    /// Number of cross-validation folds
    pub cv_folds: usize,
    /// Fit candidates and trees on the rayon thread pool
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            ngram_ranges: vec![(1, 1), (1, 2)],
            n_estimators: vec![100, 150],
            min_samples_split: vec![2, 3, 4],
            cv_folds: 5,
            parallel: true,
        }
    }
}

impl SearchConfig {
    pub fn grid(&self) -> ParamGrid {
        ParamGrid {
            ngram_ranges: self.ngram_ranges.clone(),
            n_estimators: self.n_estimators.clone(),
            min_samples_split: self.min_samples_split.clone(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Missing sections and keys take their default values.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TriageError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| TriageError::Config(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to [`Config::default`].
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(TriageError::Config(msg));

        if self.data.table.trim().is_empty() {
            return invalid("data.table must not be empty".to_string());
        }
        if !(self.data.test_size > 0.0 && self.data.test_size < 1.0) {
            return invalid(format!(
                "data.test_size must be in (0, 1), got {}",
                self.data.test_size
            ));
        }
        if self.search.cv_folds < 2 {
            return invalid(format!(
                "search.cv_folds must be at least 2, got {}",
                self.search.cv_folds
            ));
        }
        if self.search.ngram_ranges.is_empty()
            || self.search.n_estimators.is_empty()
            || self.search.min_samples_split.is_empty()
        {
            return invalid("every search grid axis needs at least one value".to_string());
        }
        for &(min_n, max_n) in &self.search.ngram_ranges {
            if min_n == 0 || min_n > max_n {
                return invalid(format!("invalid n-gram range [{}, {}]", min_n, max_n));
            }
        }
        if self.search.n_estimators.contains(&0) {
            return invalid("search.n_estimators values must be at least 1".to_string());
        }
        if self.search.min_samples_split.iter().any(|&m| m < 2) {
            return invalid("search.min_samples_split values must be at least 2".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_grid() {
        let config = Config::default();
        assert_eq!(config.data.table, "cleaned_data");
        assert_eq!(config.search.grid().len(), 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[search]\nn_estimators = [10]\nngram_ranges = [[1, 3]]\ncv_folds = 3"
        )
        .unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.search.n_estimators, vec![10]);
        assert_eq!(config.search.ngram_ranges, vec![(1, 3)]);
        assert_eq!(config.search.cv_folds, 3);
        assert_eq!(config.search.min_samples_split, vec![2, 3, 4]);
        assert_eq!(config.data.test_size, 0.2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\ncv_folds = 1").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(TriageError::Config(_))
        ));

        let mut config = Config::default();
        config.search.ngram_ranges = vec![(2, 1)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
