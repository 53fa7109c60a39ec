//! Model saving functionality for trained models.

use super::pipeline::{Pipeline, PipelineParams};
use super::search::{CvResult, SearchResult};
use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Artifact layout version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Everything needed to reuse a trained classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    /// Output column order of [`ModelArtifact::predict`]
    pub category_names: Vec<String>,
    pub best_params: PipelineParams,
    pub best_score: f64,
    pub cv_results: Vec<CvResult>,
    pub pipeline: Pipeline,
}

impl ModelArtifact {
    pub fn new(search: SearchResult, category_names: Vec<String>) -> Self {
        ModelArtifact {
            format_version: FORMAT_VERSION,
            category_names,
            best_params: search.best_params,
            best_score: search.best_score,
            cv_results: search.cv_results,
            pipeline: search.best_pipeline,
        }
    }
}

/// Save an artifact to disk as JSON.
///
/// The file is created or truncated, and flushed before this returns.
///
/// # Arguments
///
/// * `artifact` - The trained model with its search results
/// * `path` - Destination file
pub fn save_model(artifact: &ModelArtifact, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| TriageError::persist(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, artifact).map_err(|e| TriageError::persist(path, e))?;
    writer.flush().map_err(|e| TriageError::persist(path, e))?;

    info!(
        path = %path.display(),
        categories = artifact.category_names.len(),
        "model artifact written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn tiny_artifact() -> ModelArtifact {
        let docs: Vec<Vec<String>> = vec![vec!["water".into()], vec!["fire".into()]];
        let labels = array![[1u8], [0]];
        let params = PipelineParams {
            ngram_range: (1, 1),
            n_estimators: 3,
            min_samples_split: 2,
        };
        let pipeline = Pipeline::fit_tokens(&docs, labels.view(), &params, 1, false).unwrap();
        ModelArtifact {
            format_version: FORMAT_VERSION,
            category_names: vec!["water".into()],
            best_params: params,
            best_score: 1.0,
            cv_results: Vec::new(),
            pipeline,
        }
    }

    #[test]
    fn test_unwritable_path_is_persist_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("missing").join("model.json");
        let artifact = tiny_artifact();
        let err = save_model(&artifact, &path).unwrap_err();
        match err {
            TriageError::Persist { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "stale contents that are longer than nothing").unwrap();
        let artifact = tiny_artifact();
        save_model(&artifact, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.trim_start().starts_with('{'));
        assert!(text.contains("\"format_version\": 1"));
    }
}
