//! Exhaustive hyperparameter grid search with K-fold cross-validation.

use super::pipeline::{Pipeline, PipelineParams};
use crate::error::{Result, TriageError};
use crate::text::TextNormalizer;
use ndarray::{ArrayView2, Axis, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Candidate values for each searched hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub ngram_ranges: Vec<(usize, usize)>,
    pub n_estimators: Vec<usize>,
    pub min_samples_split: Vec<usize>,
}

impl ParamGrid {
    /// Every combination, in grid order: `min_samples_split` varies slowest,
    /// `ngram_range` fastest.
    pub fn candidates(&self) -> Vec<PipelineParams> {
        let mut out = Vec::with_capacity(self.len());
        for &min_samples_split in &self.min_samples_split {
            for &n_estimators in &self.n_estimators {
                for &ngram_range in &self.ngram_ranges {
                    out.push(PipelineParams {
                        ngram_range,
                        n_estimators,
                        min_samples_split,
                    });
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.ngram_ranges.len() * self.n_estimators.len() * self.min_samples_split.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cross-validation outcome for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    pub params: PipelineParams,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// 1 is best; tied means share a rank
    pub rank: usize,
}

/// The winning pipeline refit on all training rows, plus the search table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub best_index: usize,
    pub best_params: PipelineParams,
    pub best_score: f64,
    pub cv_results: Vec<CvResult>,
    pub best_pipeline: Pipeline,
}

/// Contiguous, unshuffled K-fold splits as `(train, test)` index lists.
/// The first `n % k` folds hold one extra row.
pub fn kfold(n: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = n / k + usize::from(fold < n % k);
        let stop = start + size;
        let test: Vec<usize> = (start..stop).collect();
        let train: Vec<usize> = (0..start).chain(stop..n).collect();
        folds.push((train, test));
        start = stop;
    }
    folds
}

/// Fraction of rows whose every label matches.
pub fn subset_accuracy(truth: ArrayView2<u8>, predicted: ArrayView2<u8>) -> f64 {
    if truth.nrows() == 0 {
        return 0.0;
    }
    let exact = Zip::from(truth.rows())
        .and(predicted.rows())
        .fold(0usize, |acc, t, p| acc + usize::from(t == p));
    exact as f64 / truth.nrows() as f64
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Grid search over [`Pipeline`] hyperparameters.
#[derive(Debug, Clone)]
pub struct GridSearch {
    pub grid: ParamGrid,
    pub cv_folds: usize,
    /// Forest seed used for every fit, so candidates differ only by params
    pub seed: u64,
    /// Fit candidate/fold pairs (and trees) on the rayon pool
    pub parallel: bool,
}

impl GridSearch {
    pub fn fit(
        &self,
        normalizer: &TextNormalizer,
        texts: &[String],
        labels: ArrayView2<u8>,
    ) -> Result<SearchResult> {
        let documents = normalizer.normalize_all(texts);
        self.fit_tokens(&documents, labels)
    }

    /// Score every candidate by cross-validation, then refit the best one on
    /// all of `documents`.
    pub fn fit_tokens(&self, documents: &[Vec<String>], labels: ArrayView2<u8>) -> Result<SearchResult> {
        let candidates = self.grid.candidates();
        if candidates.is_empty() {
            return Err(TriageError::fit("parameter grid is empty"));
        }
        if self.cv_folds < 2 {
            return Err(TriageError::fit(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.cv_folds
            )));
        }
        if documents.len() < self.cv_folds {
            return Err(TriageError::fit(format!(
                "cannot run {}-fold cross-validation on {} training rows",
                self.cv_folds,
                documents.len()
            )));
        }
        if documents.len() != labels.nrows() {
            return Err(TriageError::fit(format!(
                "{} documents but {} label rows",
                documents.len(),
                labels.nrows()
            )));
        }

        let folds = kfold(documents.len(), self.cv_folds);
        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();
        info!(
            candidates = candidates.len(),
            folds = folds.len(),
            fits = jobs.len(),
            "starting grid search"
        );

        let run = |&(c, f): &(usize, usize)| -> Result<f64> {
            let params = &candidates[c];
            let (train_idx, test_idx) = &folds[f];
            let started = Instant::now();

            let train_docs: Vec<Vec<String>> =
                train_idx.iter().map(|&i| documents[i].clone()).collect();
            let test_docs: Vec<Vec<String>> =
                test_idx.iter().map(|&i| documents[i].clone()).collect();
            let train_labels = labels.select(Axis(0), train_idx);
            let test_labels = labels.select(Axis(0), test_idx);

            let pipeline = Pipeline::fit_tokens(
                &train_docs,
                train_labels.view(),
                params,
                self.seed,
                self.parallel,
            )
            .map_err(|e| {
                TriageError::fit(format!("candidate [{}], fold {}: {}", params, f + 1, e))
            })?;
            let predicted = pipeline.predict_tokens(&test_docs);
            let score = subset_accuracy(test_labels.view(), predicted.view());

            info!(
                "[CV {}/{}] {}; score={:.3} total time={:.1}s",
                f + 1,
                folds.len(),
                params,
                score,
                started.elapsed().as_secs_f64()
            );
            Ok(score)
        };

        let scores: Vec<f64> = if self.parallel {
            jobs.par_iter().map(run).collect::<Result<_>>()?
        } else {
            jobs.iter().map(run).collect::<Result<_>>()?
        };

        let mut cv_results: Vec<CvResult> = candidates
            .iter()
            .zip(scores.chunks(folds.len()))
            .map(|(params, fold_scores)| {
                let (mean_score, std_score) = mean_std(fold_scores);
                CvResult {
                    params: params.clone(),
                    fold_scores: fold_scores.to_vec(),
                    mean_score,
                    std_score,
                    rank: 0,
                }
            })
            .collect();
        let means: Vec<f64> = cv_results.iter().map(|r| r.mean_score).collect();
        for result in &mut cv_results {
            result.rank = 1 + means.iter().filter(|&&m| m > result.mean_score).count();
        }

        let best_index = cv_results
            .iter()
            .position(|r| r.rank == 1)
            .unwrap_or_default();
        let best_params = cv_results[best_index].params.clone();
        let best_score = cv_results[best_index].mean_score;
        info!(params = %best_params, score = best_score, "refitting best candidate");

        let best_pipeline =
            Pipeline::fit_tokens(documents, labels, &best_params, self.seed, self.parallel)?;

        Ok(SearchResult {
            best_index,
            best_params,
            best_score,
            cv_results,
            best_pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_grid_order_and_size() {
        let grid = ParamGrid {
            ngram_ranges: vec![(1, 1), (1, 2)],
            n_estimators: vec![100, 150],
            min_samples_split: vec![2, 3, 4],
        };
        let candidates = grid.candidates();
        assert_eq!(candidates.len(), 12);
        assert_eq!(grid.len(), 12);
        assert_eq!(candidates[0].ngram_range, (1, 1));
        assert_eq!(candidates[1].ngram_range, (1, 2));
        assert_eq!(candidates[2].n_estimators, 150);
        assert_eq!(candidates[4].min_samples_split, 3);
        assert_eq!(candidates[11].min_samples_split, 4);
    }

    #[test]
    fn test_kfold_partitions_rows() {
        let folds = kfold(7, 3);
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].1, vec![0, 1, 2]);
        assert_eq!(folds[1].1, vec![3, 4]);
        assert_eq!(folds[2].1, vec![5, 6]);
        assert_eq!(folds[1].0, vec![0, 1, 2, 5, 6]);
        let mut all: Vec<usize> = folds.iter().flat_map(|(_, t)| t.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_subset_accuracy() {
        let truth = array![[1u8, 0], [0, 1], [1, 1], [0, 0]];
        let pred = array![[1u8, 0], [0, 0], [1, 1], [1, 0]];
        assert_eq!(subset_accuracy(truth.view(), pred.view()), 0.5);
        let empty = Array2::<u8>::zeros((0, 2));
        assert_eq!(subset_accuracy(empty.view(), empty.view()), 0.0);
    }

    #[test]
    fn test_mean_std() {
        let (mean, std) = mean_std(&[1.0, 3.0]);
        assert_eq!(mean, 2.0);
        assert_eq!(std, 1.0);
    }

    fn corpus() -> (Vec<Vec<String>>, Array2<u8>) {
        let mut docs = Vec::new();
        let mut rows = Vec::new();
        for i in 0..12 {
            let words: &[&str] = match i % 3 {
                0 => &["water", "thirst"],
                1 => &["fire", "smoke"],
                _ => &["calm", "day"],
            };
            docs.push(words.iter().map(|w| w.to_string()).collect());
            rows.extend_from_slice(&[u8::from(i % 3 == 0), u8::from(i % 3 == 1)]);
        }
        (docs, Array2::from_shape_vec((12, 2), rows).unwrap())
    }

    fn search(parallel: bool) -> GridSearch {
        GridSearch {
            grid: ParamGrid {
                ngram_ranges: vec![(1, 1), (1, 2)],
                n_estimators: vec![5],
                min_samples_split: vec![2],
            },
            cv_folds: 3,
            seed: 11,
            parallel,
        }
    }

    #[test]
    fn test_search_picks_ranked_winner_and_refits() {
        let (docs, labels) = corpus();
        let result = search(false).fit_tokens(&docs, labels.view()).unwrap();
        assert_eq!(result.cv_results.len(), 2);
        for r in &result.cv_results {
            assert_eq!(r.fold_scores.len(), 3);
        }
        let best = &result.cv_results[result.best_index];
        assert_eq!(best.rank, 1);
        assert_eq!(result.best_params, best.params);
        assert!(result
            .cv_results
            .iter()
            .all(|r| r.mean_score <= result.best_score));
        assert_eq!(result.best_pipeline.params, result.best_params);
        assert_eq!(result.best_pipeline.n_outputs(), 2);
    }

    #[test]
    fn test_parallel_search_matches_sequential() {
        let (docs, labels) = corpus();
        let seq = search(false).fit_tokens(&docs, labels.view()).unwrap();
        let par = search(true).fit_tokens(&docs, labels.view()).unwrap();
        assert_eq!(seq.best_index, par.best_index);
        assert_eq!(seq.cv_results, par.cv_results);
        assert_eq!(seq.best_pipeline, par.best_pipeline);
    }

    #[test]
    fn test_too_few_rows_for_folds() {
        let (docs, labels) = corpus();
        let mut gs = search(false);
        gs.cv_folds = 20;
        assert!(matches!(
            gs.fit_tokens(&docs, labels.view()),
            Err(TriageError::Fit(_))
        ));
    }
}
