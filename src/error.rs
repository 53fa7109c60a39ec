//! Error type shared by every training stage.

use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a training run.
///
/// Every variant except [`TriageError::Usage`] is fatal: the CLI prints the
/// message and exits with status 1. Nothing is retried.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("usage: {0}")]
    Usage(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cannot read training data from '{path}': {reason}")]
    DataAccess { path: PathBuf, reason: String },
    #[error("model fitting failed: {0}")]
    Fit(String),
    #[error("cannot write model to '{path}': {reason}")]
    Persist { path: PathBuf, reason: String },
    #[error("cannot load model from '{path}': {reason}")]
    Load { path: PathBuf, reason: String },
}

impl TriageError {
    pub(crate) fn data_access(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TriageError::DataAccess {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn persist(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TriageError::Persist {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TriageError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn fit(reason: impl Into<String>) -> Self {
        TriageError::Fit(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, TriageError>;
