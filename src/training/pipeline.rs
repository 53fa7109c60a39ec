//! Vectorize → weight → classify, fitted and applied as one unit.

use super::tfidf::{CountVectorizer, SparseMatrix, TfidfTransformer};
use crate::error::{Result, TriageError};
use crate::forest::{ForestParams, MultiOutputForest};
use crate::text::TextNormalizer;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The hyperparameters a grid search varies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Vectorizer n-gram span
    pub ngram_range: (usize, usize),
    /// Trees per category forest
    pub n_estimators: usize,
    /// Minimum node size eligible for splitting
    pub min_samples_split: usize,
}

impl fmt::Display for PipelineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ngram_range=({}, {}), n_estimators={}, min_samples_split={}",
            self.ngram_range.0, self.ngram_range.1, self.n_estimators, self.min_samples_split
        )
    }
}

/// A fitted text classification pipeline.
///
/// Tokenization is not stored: callers pass the same [`TextNormalizer`] used
/// in training (or tokens it produced) to predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub params: PipelineParams,
    pub seed: u64,
    vectorizer: CountVectorizer,
    tfidf: TfidfTransformer,
    classifier: MultiOutputForest,
}

impl Pipeline {
    /// Fit on raw texts and a label matrix with one row per text.
    pub fn fit(
        normalizer: &TextNormalizer,
        texts: &[String],
        labels: ArrayView2<u8>,
        params: &PipelineParams,
        seed: u64,
        parallel: bool,
    ) -> Result<Self> {
        let documents = normalizer.normalize_all(texts);
        Self::fit_tokens(&documents, labels, params, seed, parallel)
    }

    /// Fit on already-normalized documents.
    pub fn fit_tokens(
        documents: &[Vec<String>],
        labels: ArrayView2<u8>,
        params: &PipelineParams,
        seed: u64,
        parallel: bool,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(TriageError::fit("no training documents"));
        }
        if documents.len() != labels.nrows() {
            return Err(TriageError::fit(format!(
                "{} documents but {} label rows",
                documents.len(),
                labels.nrows()
            )));
        }

        let mut vectorizer = CountVectorizer::new(params.ngram_range);
        vectorizer.fit(documents)?;
        let counts = vectorizer.transform_all(documents);

        let mut tfidf = TfidfTransformer::new();
        tfidf.fit(&counts)?;
        let features = tfidf.transform_all(&counts);

        let forest_params = ForestParams {
            n_estimators: params.n_estimators,
            min_samples_split: params.min_samples_split,
            seed,
            parallel,
        };
        let classifier = MultiOutputForest::fit(&features, labels, &forest_params)?;

        Ok(Pipeline {
            params: params.clone(),
            seed,
            vectorizer,
            tfidf,
            classifier,
        })
    }

    pub fn n_features(&self) -> usize {
        self.vectorizer.n_features()
    }

    pub fn n_outputs(&self) -> usize {
        self.classifier.n_outputs()
    }

    /// TF-IDF rows using the fitted vocabulary and weights.
    pub fn features(&self, documents: &[Vec<String>]) -> SparseMatrix {
        self.tfidf
            .transform_all(&self.vectorizer.transform_all(documents))
    }

    pub fn predict_tokens(&self, documents: &[Vec<String>]) -> Array2<u8> {
        self.classifier.predict(&self.features(documents))
    }

    /// Label matrix for `texts`, columns in training order.
    pub fn predict(&self, normalizer: &TextNormalizer, texts: &[String]) -> Array2<u8> {
        self.predict_tokens(&normalizer.normalize_all(texts))
    }
}
