//! Loading a saved model and predicting with it.

use super::save::{ModelArtifact, FORMAT_VERSION};
use crate::error::{Result, TriageError};
use crate::text::TextNormalizer;
use ndarray::Array2;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Load an artifact written by [`save_model`](super::save::save_model).
pub fn load_model(path: &Path) -> Result<ModelArtifact> {
    let file = File::open(path).map_err(|e| TriageError::load(path, e))?;
    let artifact: ModelArtifact =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| TriageError::load(path, e))?;

    if artifact.format_version != FORMAT_VERSION {
        return Err(TriageError::load(
            path,
            format!(
                "unsupported format version {} (expected {})",
                artifact.format_version, FORMAT_VERSION
            ),
        ));
    }
    if artifact.category_names.len() != artifact.pipeline.n_outputs() {
        return Err(TriageError::load(
            path,
            format!(
                "{} category names for {} classifier outputs",
                artifact.category_names.len(),
                artifact.pipeline.n_outputs()
            ),
        ));
    }
    Ok(artifact)
}

impl ModelArtifact {
    /// Label matrix for `texts`, one column per entry of `category_names`.
    ///
    /// `normalizer` must tokenize the way the training normalizer did.
    pub fn predict(&self, normalizer: &TextNormalizer, texts: &[String]) -> Array2<u8> {
        self.pipeline.predict(normalizer, texts)
    }

    /// Names of the categories predicted for a single message.
    pub fn predict_categories(&self, normalizer: &TextNormalizer, text: &str) -> Vec<&str> {
        let predicted = self.predict(normalizer, &[text.to_string()]);
        self.category_names
            .iter()
            .zip(predicted.row(0))
            .filter(|(_, &flag)| flag == 1)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
