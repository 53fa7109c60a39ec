/// Random forest classifier over sparse TF-IDF rows
/// Pure Rust CART trees with bootstrap sampling, one forest per output label

use crate::error::{Result, TriageError};
use crate::training::tfidf::SparseMatrix;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Hyperparameters shared by every tree of a forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees in each forest
    pub n_estimators: usize,
    /// A node with fewer distinct samples than this becomes a leaf
    pub min_samples_split: usize,
    /// Root seed; every tree's randomness is derived from it
    pub seed: u64,
    /// Build trees on the rayon pool
    #[serde(default)]
    pub parallel: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_estimators: 100,
            min_samples_split: 2,
            seed: 42,
            parallel: false,
        }
    }
}

impl ForestParams {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(TriageError::fit("n_estimators must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(TriageError::fit(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        Ok(())
    }
}

/// Expand one seed into `n` independent seeds.
pub fn derive_seeds(seed: u64, n: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen()).collect()
}

/// Value of `feature` in a sorted sparse row (absent entries are zero).
fn feature_value(row: &[(usize, f64)], feature: usize) -> f64 {
    row.binary_search_by_key(&feature, |&(idx, _)| idx)
        .map(|pos| row[pos].1)
        .unwrap_or(0.0)
}

/// Weighted Gini impurity times node weight: `2 p (w - p) / w`.
fn weighted_gini(weight: f64, positive: f64) -> f64 {
    if weight <= 0.0 {
        0.0
    } else {
        2.0 * positive * (weight - positive) / weight
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        /// Weighted fraction of positive samples that reached this leaf
        p_positive: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// A single binary CART tree. Samples with `value <= threshold` go left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grow a tree on a bootstrap sample of `x` drawn from `seed`.
    pub fn fit_bootstrap(
        x: &SparseMatrix,
        y: &[bool],
        min_samples_split: usize,
        max_features: usize,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = x.n_rows();
        let mut weights = vec![0.0; n];
        for _ in 0..n {
            weights[rng.gen_range(0..n)] += 1.0;
        }
        let samples: Vec<usize> = (0..n).filter(|&i| weights[i] > 0.0).collect();

        let builder = TreeBuilder {
            x,
            y,
            weights: &weights,
            min_samples_split,
            max_features: max_features.max(1),
            rng,
            seen: vec![0; x.n_features],
            stamp: 0,
            slot: vec![usize::MAX; x.n_features],
        };
        builder.build(samples)
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Probability of the positive class for one row.
    pub fn predict_proba(&self, row: &[(usize, f64)]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { p_positive } => return *p_positive,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if feature_value(row, *feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a SparseMatrix,
    y: &'a [bool],
    weights: &'a [f64],
    min_samples_split: usize,
    max_features: usize,
    rng: StdRng,
    // per-feature "already collected in this node" marker
    seen: Vec<u32>,
    stamp: u32,
    // per-feature position in the current candidate batch
    slot: Vec<usize>,
}

impl TreeBuilder<'_> {
    fn build(mut self, root: Vec<usize>) -> DecisionTree {
        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<(Vec<usize>, Option<(usize, bool)>)> = vec![(root, None)];

        while let Some((samples, parent)) = stack.pop() {
            let idx = nodes.len();
            if let Some((parent, is_left)) = parent {
                if let Node::Split { left, right, .. } = &mut nodes[parent] {
                    if is_left {
                        *left = idx;
                    } else {
                        *right = idx;
                    }
                }
            }

            let (total, positive) = self.totals(&samples);
            let p_positive = if total > 0.0 { positive / total } else { 0.0 };
            let pure = positive == 0.0 || positive == total;
            if samples.len() < self.min_samples_split || pure {
                nodes.push(Node::Leaf { p_positive });
                continue;
            }

            match self.best_split(&samples, total, positive) {
                None => nodes.push(Node::Leaf { p_positive }),
                Some(split) => {
                    let (left, right): (Vec<usize>, Vec<usize>) =
                        samples.iter().partition(|&&s| {
                            feature_value(&self.x.rows[s], split.feature) <= split.threshold
                        });
                    nodes.push(Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left: 0,
                        right: 0,
                    });
                    stack.push((right, Some((idx, false))));
                    stack.push((left, Some((idx, true))));
                }
            }
        }

        DecisionTree { nodes }
    }

    fn totals(&self, samples: &[usize]) -> (f64, f64) {
        samples.iter().fold((0.0, 0.0), |(w, p), &s| {
            let weight = self.weights[s];
            (w + weight, if self.y[s] { p + weight } else { p })
        })
    }

    /// Search features present in the node, in random order, until at least
    /// `max_features` have been inspected and a valid split exists.
    fn best_split(&mut self, samples: &[usize], total: f64, positive: f64) -> Option<SplitCandidate> {
        let x = self.x;

        self.stamp = self.stamp.wrapping_add(1);
        if self.stamp == 0 {
            self.seen.iter_mut().for_each(|s| *s = 0);
            self.stamp = 1;
        }
        let mut present = Vec::new();
        for &s in samples {
            for &(feature, value) in &x.rows[s] {
                if value != 0.0 && self.seen[feature] != self.stamp {
                    self.seen[feature] = self.stamp;
                    present.push(feature);
                }
            }
        }

        let mut best: Option<SplitCandidate> = None;
        let mut next = 0;
        while next < present.len() && (next < self.max_features || best.is_none()) {
            let want = if next < self.max_features {
                self.max_features - next
            } else {
                1
            };
            let end = (next + want).min(present.len());
            for i in next..end {
                let j = self.rng.gen_range(i..present.len());
                present.swap(i, j);
            }
            let batch = &present[next..end];

            for (k, &feature) in batch.iter().enumerate() {
                self.slot[feature] = k;
            }
            let mut entries: Vec<Vec<(f64, f64, bool)>> = vec![Vec::new(); batch.len()];
            for &s in samples {
                for &(feature, value) in &x.rows[s] {
                    let k = self.slot[feature];
                    if k != usize::MAX && value != 0.0 {
                        entries[k].push((value, self.weights[s], self.y[s]));
                    }
                }
            }
            for &feature in batch {
                self.slot[feature] = usize::MAX;
            }

            for (&feature, values) in batch.iter().zip(entries) {
                let n_zero = samples.len() - values.len();
                if let Some(candidate) = scan_feature(feature, values, n_zero, total, positive) {
                    if best.map_or(true, |b| candidate.impurity < b.impurity) {
                        best = Some(candidate);
                    }
                }
            }
            next = end;
        }

        best
    }
}

/// Best threshold for one feature. `values` holds the node's nonzero entries
/// as `(value, weight, label)`; the remaining `n_zero` samples sit at zero.
fn scan_feature(
    feature: usize,
    mut values: Vec<(f64, f64, bool)>,
    n_zero: usize,
    total: f64,
    positive: f64,
) -> Option<SplitCandidate> {
    if n_zero > 0 {
        let nz_weight: f64 = values.iter().map(|v| v.1).sum();
        let nz_positive: f64 = values.iter().filter(|v| v.2).map(|v| v.1).sum();
        let zero_positive = positive - nz_positive;
        let zero_negative = (total - nz_weight) - zero_positive;
        if zero_negative > 0.0 {
            values.push((0.0, zero_negative, false));
        }
        if zero_positive > 0.0 {
            values.push((0.0, zero_positive, true));
        }
    }
    values.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut best: Option<SplitCandidate> = None;
    let mut left_weight = 0.0;
    let mut left_positive = 0.0;
    for i in 0..values.len().saturating_sub(1) {
        let (value, weight, label) = values[i];
        left_weight += weight;
        if label {
            left_positive += weight;
        }
        let next_value = values[i + 1].0;
        if next_value <= value {
            continue;
        }

        let impurity = weighted_gini(left_weight, left_positive)
            + weighted_gini(total - left_weight, positive - left_positive);
        if best.map_or(true, |b| impurity < b.impurity) {
            let mut threshold = value / 2.0 + next_value / 2.0;
            if threshold >= next_value || !threshold.is_finite() {
                threshold = value;
            }
            best = Some(SplitCandidate {
                feature,
                threshold,
                impurity,
            });
        }
    }
    best
}

/// Bagged ensemble of [`DecisionTree`]s for one binary label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(x: &SparseMatrix, y: &[bool], params: &ForestParams) -> Result<Self> {
        params.validate()?;
        if x.n_rows() == 0 {
            return Err(TriageError::fit("cannot fit a forest on zero samples"));
        }
        if x.n_rows() != y.len() {
            return Err(TriageError::fit(format!(
                "feature rows ({}) and labels ({}) differ in length",
                x.n_rows(),
                y.len()
            )));
        }

        let max_features = ((x.n_features as f64).sqrt() as usize).max(1);
        let seeds = derive_seeds(params.seed, params.n_estimators);
        let grow = |seed: &u64| {
            DecisionTree::fit_bootstrap(x, y, params.min_samples_split, max_features, *seed)
        };
        let trees = if params.parallel {
            seeds.par_iter().map(grow).collect()
        } else {
            seeds.iter().map(grow).collect()
        };

        Ok(RandomForest { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean positive-class probability across trees.
    pub fn predict_proba(&self, row: &[(usize, f64)]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_proba(row)).sum();
        sum / self.trees.len() as f64
    }

    /// 1 when the positive class is strictly more probable, else 0.
    pub fn predict(&self, row: &[(usize, f64)]) -> u8 {
        u8::from(self.predict_proba(row) > 0.5)
    }
}

/// One independent [`RandomForest`] per output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiOutputForest {
    forests: Vec<RandomForest>,
}

impl MultiOutputForest {
    /// Fit one forest per column of `y` (rows = samples, columns = labels).
    pub fn fit(x: &SparseMatrix, y: ArrayView2<u8>, params: &ForestParams) -> Result<Self> {
        if y.ncols() == 0 {
            return Err(TriageError::fit("label matrix has no columns"));
        }
        if y.nrows() != x.n_rows() {
            return Err(TriageError::fit(format!(
                "feature rows ({}) and label rows ({}) differ",
                x.n_rows(),
                y.nrows()
            )));
        }

        let seeds = derive_seeds(params.seed, y.ncols());
        let forests = y
            .columns()
            .into_iter()
            .zip(seeds)
            .map(|(column, seed)| {
                let labels = binary_column(column);
                let params = ForestParams {
                    seed,
                    ..params.clone()
                };
                RandomForest::fit(x, &labels, &params)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MultiOutputForest { forests })
    }

    pub fn n_outputs(&self) -> usize {
        self.forests.len()
    }

    /// Predicted label matrix, columns in training order.
    pub fn predict(&self, x: &SparseMatrix) -> Array2<u8> {
        let mut out = Array2::zeros((x.n_rows(), self.forests.len()));
        for (i, row) in x.rows.iter().enumerate() {
            for (j, forest) in self.forests.iter().enumerate() {
                out[[i, j]] = forest.predict(row);
            }
        }
        out
    }
}

fn binary_column(column: ArrayView1<u8>) -> Vec<bool> {
    column.iter().map(|&v| v > 0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // feature 0 marks positives, feature 1 marks negatives
    fn separable() -> (SparseMatrix, Vec<bool>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let weight = 0.5 + 0.01 * i as f64;
            if i % 2 == 0 {
                rows.push(vec![(0, weight)]);
                y.push(true);
            } else {
                rows.push(vec![(1, weight)]);
                y.push(false);
            }
        }
        (SparseMatrix { rows, n_features: 2 }, y)
    }

    #[test]
    fn test_feature_value_lookup() {
        let row = vec![(1, 0.5), (4, 0.25), (9, 1.0)];
        assert_eq!(feature_value(&row, 4), 0.25);
        assert_eq!(feature_value(&row, 3), 0.0);
        assert_eq!(feature_value(&[], 0), 0.0);
    }

    #[test]
    fn test_weighted_gini() {
        assert_eq!(weighted_gini(4.0, 0.0), 0.0);
        assert_eq!(weighted_gini(4.0, 4.0), 0.0);
        assert_eq!(weighted_gini(4.0, 2.0), 2.0);
        assert_eq!(weighted_gini(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_scan_feature_separates_zero_group() {
        // two positives at 0.5, two negatives at zero
        let values = vec![(0.5, 1.0, true), (0.5, 1.0, true)];
        let split = scan_feature(7, values, 2, 4.0, 2.0).unwrap();
        assert_eq!(split.feature, 7);
        assert_eq!(split.impurity, 0.0);
        assert!((split.threshold - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_scan_feature_constant_has_no_split() {
        let values = vec![(0.3, 1.0, true), (0.3, 2.0, false)];
        assert!(scan_feature(0, values, 0, 3.0, 1.0).is_none());
    }

    #[test]
    fn test_tree_learns_separable_data() {
        let (x, y) = separable();
        let tree = DecisionTree::fit_bootstrap(&x, &y, 2, 1, 7);
        assert!(tree.n_nodes() >= 1);
        assert_eq!(tree.predict_proba(&[(0, 0.8)]), 1.0);
        assert_eq!(tree.predict_proba(&[(1, 0.7)]), 0.0);
    }

    #[test]
    fn test_forest_predicts_and_is_deterministic() {
        let (x, y) = separable();
        let params = ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        };
        let a = RandomForest::fit(&x, &y, &params).unwrap();
        let b = RandomForest::fit(&x, &y, &params).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 10);
        assert_eq!(a.predict(&vec![(0, 0.8)]), 1);
        assert_eq!(a.predict(&vec![(1, 0.7)]), 0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (x, y) = separable();
        let seq = ForestParams {
            n_estimators: 8,
            ..ForestParams::default()
        };
        let par = ForestParams {
            parallel: true,
            ..seq.clone()
        };
        assert_eq!(
            RandomForest::fit(&x, &y, &seq).unwrap(),
            RandomForest::fit(&x, &y, &par).unwrap()
        );
    }

    #[test]
    fn test_single_class_labels() {
        let (x, _) = separable();
        let y = vec![false; x.n_rows()];
        let forest = RandomForest::fit(&x, &y, &ForestParams::default()).unwrap();
        assert_eq!(forest.predict(&vec![(0, 0.8)]), 0);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (x, y) = separable();
        let params = ForestParams {
            min_samples_split: 1,
            ..ForestParams::default()
        };
        assert!(matches!(
            RandomForest::fit(&x, &y, &params),
            Err(TriageError::Fit(_))
        ));
        let empty = SparseMatrix {
            rows: vec![],
            n_features: 3,
        };
        assert!(RandomForest::fit(&empty, &[], &ForestParams::default()).is_err());
    }

    #[test]
    fn test_multi_output_column_order() {
        let x = SparseMatrix {
            rows: vec![
                vec![(0, 1.0)],
                vec![(1, 1.0)],
                vec![(0, 1.0)],
                vec![(1, 1.0)],
            ],
            n_features: 2,
        };
        // column 0 follows feature 0, column 1 follows feature 1
        let y = array![[1u8, 0], [0, 1], [1, 0], [0, 1]];
        let params = ForestParams {
            n_estimators: 25,
            ..ForestParams::default()
        };
        let model = MultiOutputForest::fit(&x, y.view(), &params).unwrap();
        assert_eq!(model.n_outputs(), 2);
        let pred = model.predict(&SparseMatrix {
            rows: vec![vec![(0, 1.0)], vec![(1, 1.0)]],
            n_features: 2,
        });
        assert_eq!(pred, array![[1u8, 0], [0, 1]]);
    }

    #[test]
    fn test_multi_output_shape_mismatch() {
        let x = SparseMatrix {
            rows: vec![vec![(0, 1.0)]],
            n_features: 1,
        };
        let y = array![[1u8], [0u8]];
        assert!(MultiOutputForest::fit(&x, y.view(), &ForestParams::default()).is_err());
    }
}
