//! Bag-of-n-grams counting and TF-IDF weighting.
//!
//! The two stages mirror the usual vectorizer split:
//! - [`CountVectorizer`] learns a vocabulary of n-grams from token sequences
//!   and turns each document into sparse term counts.
//! - [`TfidfTransformer`] learns inverse document frequencies from those
//!   counts and produces L2-normalized TF-IDF rows.
//!
//! Both are fitted on the training split only; transforming held-out data
//! reuses the fitted state and never grows the vocabulary.

use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One sparse row: `(column, value)` pairs sorted by column, no duplicates.
pub type SparseRow = Vec<(usize, f64)>;

/// Row-major sparse feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    pub rows: Vec<SparseRow>,
    pub n_features: usize,
}

impl SparseMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }
}

/// All contiguous n-grams of `tokens` for every `n` in `min_n..=max_n`,
/// joined with a single space.
pub fn ngrams(tokens: &[String], (min_n, max_n): (usize, usize)) -> Vec<String> {
    let mut grams = Vec::new();
    for n in min_n.max(1)..=max_n {
        if n > tokens.len() {
            break;
        }
        grams.extend(tokens.windows(n).map(|w| w.join(" ")));
    }
    grams
}

/// Vocabulary-indexed term counter over n-gram windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountVectorizer {
    /// Inclusive n-gram span, e.g. `(1, 2)` for unigrams and bigrams
    pub ngram_range: (usize, usize),
    /// Term to column index; columns follow lexicographic term order
    pub vocabulary: HashMap<String, usize>,
}

impl CountVectorizer {
    pub fn new(ngram_range: (usize, usize)) -> Self {
        CountVectorizer {
            ngram_range,
            vocabulary: HashMap::new(),
        }
    }

    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    /// Build the vocabulary from tokenized documents.
    ///
    /// Fails if no document produces a single term.
    pub fn fit(&mut self, documents: &[Vec<String>]) -> Result<()> {
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(TriageError::fit(format!(
                "invalid n-gram range ({}, {})",
                min_n, max_n
            )));
        }

        let terms: BTreeSet<String> = documents
            .iter()
            .flat_map(|doc| ngrams(doc, self.ngram_range))
            .collect();
        if terms.is_empty() {
            return Err(TriageError::fit(
                "empty vocabulary; the training documents contain only stop words or punctuation",
            ));
        }

        self.vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term, idx))
            .collect();
        Ok(())
    }

    /// Term counts for one document. Out-of-vocabulary n-grams are ignored.
    pub fn transform(&self, document: &[String]) -> SparseRow {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for gram in ngrams(document, self.ngram_range) {
            if let Some(&idx) = self.vocabulary.get(&gram) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        let mut row: SparseRow = counts.into_iter().collect();
        row.sort_unstable_by_key(|&(idx, _)| idx);
        row
    }

    pub fn transform_all(&self, documents: &[Vec<String>]) -> SparseMatrix {
        SparseMatrix {
            rows: documents.iter().map(|doc| self.transform(doc)).collect(),
            n_features: self.n_features(),
        }
    }
}

/// Smoothed inverse-document-frequency weighting with L2 row normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfidfTransformer {
    /// `ln((1 + n) / (1 + df)) + 1` per column
    pub idf: Vec<f64>,
}

impl TfidfTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, counts: &SparseMatrix) -> Result<()> {
        if counts.n_rows() == 0 {
            return Err(TriageError::fit("cannot fit TF-IDF weights on zero documents"));
        }

        let mut doc_freq = vec![0usize; counts.n_features];
        for row in &counts.rows {
            for &(idx, count) in row {
                if count > 0.0 {
                    doc_freq[idx] += 1;
                }
            }
        }

        let n_docs = counts.n_rows() as f64;
        self.idf = doc_freq
            .iter()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();
        Ok(())
    }

    pub fn transform(&self, row: &[(usize, f64)]) -> SparseRow {
        let mut weighted: SparseRow = row
            .iter()
            .filter_map(|&(idx, count)| self.idf.get(idx).map(|&idf| (idx, count * idf)))
            .collect();

        let norm = weighted.iter().map(|&(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, val) in &mut weighted {
                *val /= norm;
            }
        }
        weighted
    }

    pub fn transform_all(&self, counts: &SparseMatrix) -> SparseMatrix {
        SparseMatrix {
            rows: counts.rows.iter().map(|row| self.transform(row)).collect(),
            n_features: counts.n_features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_ngrams() {
        let tokens = doc(&["need", "clean", "water"]);
        assert_eq!(ngrams(&tokens, (1, 1)), vec!["need", "clean", "water"]);
        assert_eq!(
            ngrams(&tokens, (1, 2)),
            vec!["need", "clean", "water", "need clean", "clean water"]
        );
        assert!(ngrams(&[], (1, 2)).is_empty());
        assert_eq!(ngrams(&doc(&["help"]), (1, 2)), vec!["help"]);
    }

    #[test]
    fn test_vocabulary_sorted() {
        let mut vectorizer = CountVectorizer::new((1, 1));
        vectorizer
            .fit(&[doc(&["water", "food"]), doc(&["shelter", "water"])])
            .unwrap();
        assert_eq!(vectorizer.vocabulary["food"], 0);
        assert_eq!(vectorizer.vocabulary["shelter"], 1);
        assert_eq!(vectorizer.vocabulary["water"], 2);
    }

    #[test]
    fn test_counts_ignore_unknown_terms() {
        let mut vectorizer = CountVectorizer::new((1, 2));
        vectorizer.fit(&[doc(&["water", "water", "food"])]).unwrap();
        let row = vectorizer.transform(&doc(&["water", "water", "medicine"]));
        // vocabulary: food, water, water food, water water
        assert_eq!(vectorizer.n_features(), 4);
        assert_eq!(row, vec![(1, 2.0), (3, 1.0)]);
    }

    #[test]
    fn test_empty_vocabulary_is_fit_error() {
        let mut vectorizer = CountVectorizer::new((1, 1));
        let err = vectorizer.fit(&[vec![], vec![]]).unwrap_err();
        assert!(matches!(err, TriageError::Fit(_)));
    }

    #[test]
    fn test_idf_smoothing() {
        let counts = SparseMatrix {
            rows: vec![vec![(0, 1.0), (1, 1.0)], vec![(0, 2.0)]],
            n_features: 2,
        };
        let mut tfidf = TfidfTransformer::new();
        tfidf.fit(&counts).unwrap();
        // term 0 in both docs, term 1 in one
        assert!((tfidf.idf[0] - 1.0).abs() < 1e-12);
        assert!((tfidf.idf[1] - ((3.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_rows_are_l2_normalized() {
        let counts = SparseMatrix {
            rows: vec![vec![(0, 3.0), (1, 1.0)], vec![(1, 2.0)], vec![]],
            n_features: 2,
        };
        let mut tfidf = TfidfTransformer::new();
        tfidf.fit(&counts).unwrap();
        let weighted = tfidf.transform_all(&counts);
        for row in &weighted.rows[..2] {
            let norm: f64 = row.iter().map(|&(_, v)| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-12);
        }
        assert!(weighted.rows[2].is_empty());
    }
}
