//! Seeded random-forest classifier
//!
//! CART trees on bootstrap samples with sqrt-feature subsampling and
//! weighted Gini impurity, so inverse-frequency class weights carry all
//! the way into the splits. Probabilities are the average of per-tree
//! leaf distributions. Everything is seeded for reproducible runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::model::Hyperparameters;
use crate::{FootyError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        /// Weighted class distribution at this leaf, sums to 1
        probs: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn probs_for(&self, row: &[f64]) -> &[f64] {
        match self {
            TreeNode::Leaf { probs } => probs,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.probs_for(row)
                } else {
                    right.probs_for(row)
                }
            }
        }
    }
}

/// Ensemble of decision trees over the match feature vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<TreeNode>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    /// Fit a forest on weighted samples
    ///
    /// `labels` are class indices; `sample_weights` typically come from
    /// inverse-frequency balancing.
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[usize],
        sample_weights: &[f64],
        n_classes: usize,
        hyperparams: &Hyperparameters,
        seed: u64,
    ) -> RandomForest {
        debug_assert_eq!(rows.len(), labels.len());
        debug_assert_eq!(rows.len(), sample_weights.len());

        let n_features = rows.first().map(|r| r.len()).unwrap_or(0);
        // sklearn-style default for classification
        let max_features = ((n_features as f64).sqrt().floor() as usize).max(1);

        let mut trees = Vec::with_capacity(hyperparams.trees);
        for tree_idx in 0..hyperparams.trees {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(tree_idx as u64));

            // Bootstrap sample, same size as the dataset
            let indices: Vec<usize> =
                (0..rows.len()).map(|_| rng.gen_range(0..rows.len())).collect();

            trees.push(build_node(
                rows,
                labels,
                sample_weights,
                &indices,
                n_classes,
                max_features,
                hyperparams.max_depth,
                hyperparams.min_split,
                0,
                &mut rng,
            ));
        }

        RandomForest {
            trees,
            n_classes,
            n_features,
        }
    }

    /// Class probabilities, averaged over trees
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut probs = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (total, p) in probs.iter_mut().zip(tree.probs_for(row)) {
                *total += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        for p in probs.iter_mut() {
            *p /= n;
        }
        probs
    }

    /// Most probable class index
    pub fn predict(&self, row: &[f64]) -> usize {
        let probs = self.predict_proba(row);
        probs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }

    /// Fraction of rows classified correctly
    pub fn accuracy(&self, rows: &[Vec<f64>], labels: &[usize]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let correct = rows
            .iter()
            .zip(labels)
            .filter(|(row, label)| self.predict(row) == **label)
            .count();
        correct as f64 / rows.len() as f64
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Save a model snapshot to disk
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json =
            serde_json::to_string(self).map_err(|e| FootyError::Parse(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a model snapshot from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RandomForest> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| FootyError::Parse(e.to_string()))
    }
}

/// Weighted class counts for a set of sample indices
fn class_weights(
    labels: &[usize],
    sample_weights: &[f64],
    indices: &[usize],
    n_classes: usize,
) -> Vec<f64> {
    let mut counts = vec![0.0; n_classes];
    for &i in indices {
        counts[labels[i]] += sample_weights[i];
    }
    counts
}

fn gini(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>()
}

fn leaf(counts: Vec<f64>) -> TreeNode {
    let total: f64 = counts.iter().sum();
    let probs = if total > 0.0 {
        counts.iter().map(|c| c / total).collect()
    } else {
        vec![1.0 / counts.len() as f64; counts.len()]
    };
    TreeNode::Leaf { probs }
}

#[allow(clippy::too_many_arguments)]
fn build_node(
    rows: &[Vec<f64>],
    labels: &[usize],
    sample_weights: &[f64],
    indices: &[usize],
    n_classes: usize,
    max_features: usize,
    max_depth: Option<usize>,
    min_split: usize,
    depth: usize,
    rng: &mut StdRng,
) -> TreeNode {
    let counts = class_weights(labels, sample_weights, indices, n_classes);

    let at_depth_limit = max_depth.map(|d| depth >= d).unwrap_or(false);
    let pure = counts.iter().filter(|c| **c > 0.0).count() <= 1;
    if at_depth_limit || pure || indices.len() < min_split {
        return leaf(counts);
    }

    let n_features = rows[indices[0]].len();
    let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, impurity)

    // Random feature subset without replacement
    let mut features: Vec<usize> = (0..n_features).collect();
    for i in 0..max_features.min(n_features) {
        let j = rng.gen_range(i..n_features);
        features.swap(i, j);
    }

    for &feature in features.iter().take(max_features.min(n_features)) {
        let mut values: Vec<f64> = indices.iter().map(|&i| rows[i][feature]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();
        if values.len() < 2 {
            continue;
        }

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;

            let mut left_counts = vec![0.0; n_classes];
            let mut right_counts = vec![0.0; n_classes];
            for &i in indices {
                if rows[i][feature] <= threshold {
                    left_counts[labels[i]] += sample_weights[i];
                } else {
                    right_counts[labels[i]] += sample_weights[i];
                }
            }

            let left_total: f64 = left_counts.iter().sum();
            let right_total: f64 = right_counts.iter().sum();
            if left_total <= 0.0 || right_total <= 0.0 {
                continue;
            }

            let total = left_total + right_total;
            let impurity = (left_total / total) * gini(&left_counts)
                + (right_total / total) * gini(&right_counts);

            if best.map(|(_, _, b)| impurity < b).unwrap_or(true) {
                best = Some((feature, threshold, impurity));
            }
        }
    }

    let (feature, threshold, impurity) = match best {
        Some(found) => found,
        None => return leaf(counts),
    };
    // No split improves on the node itself
    if impurity >= gini(&counts) {
        return leaf(counts);
    }

    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| rows[i][feature] <= threshold);

    let left = build_node(
        rows,
        labels,
        sample_weights,
        &left_indices,
        n_classes,
        max_features,
        max_depth,
        min_split,
        depth + 1,
        rng,
    );
    let right = build_node(
        rows,
        labels,
        sample_weights,
        &right_indices,
        n_classes,
        max_features,
        max_depth,
        min_split,
        depth + 1,
        rng,
    );

    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(left),
        right: Box::new(right),
    }
}
