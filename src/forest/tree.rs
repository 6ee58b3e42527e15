//! CART decision tree for classification

use super::Criterion;
use crate::{Error, Result};
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single split decision in a tree
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreeSplit {
    /// Feature index used for split
    pub feature_idx: usize,
    /// Samples with `x[feature_idx] <= threshold` go left
    pub threshold: f32,
    /// Arena index of the left child
    pub left: usize,
    /// Arena index of the right child
    pub right: usize,
    /// Samples in node before split (from training)
    pub n_samples: usize,
}

/// Leaf reached by a sample
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeafInfo {
    /// Fraction of training samples per class
    pub class_distribution: Vec<f32>,
    /// Samples in training that reached this leaf
    pub n_samples: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Node {
    Split(TreeSplit),
    Leaf(LeafInfo),
}

/// Tree growth parameters
#[derive(Clone, Copy, Debug)]
pub struct TreeConfig {
    pub criterion: Criterion,
    /// Features examined per split (`None` = all)
    pub max_features: Option<usize>,
    /// Maximum depth (`None` = grow until pure)
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            max_features: None,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

/// Decision tree stored as a node arena rooted at index 0
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_classes: usize,
    n_features: usize,
}

struct Candidate {
    feature_idx: usize,
    threshold: f32,
    score: f64,
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` selected by `samples`
    ///
    /// `samples` may repeat rows (bootstrap draws).
    pub fn fit(
        x: &Array2<f32>,
        y: &[usize],
        samples: &[usize],
        n_classes: usize,
        config: &TreeConfig,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(Error::length("tree.labels", x.nrows(), y.len()));
        }
        if samples.is_empty() {
            return Err(Error::InvalidInput("cannot fit a tree on zero samples".into()));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(Error::InvalidInput(format!(
                "label {bad} out of range for {n_classes} classes"
            )));
        }

        let n_features = x.ncols();
        let max_features = config
            .max_features
            .unwrap_or(n_features)
            .clamp(1, n_features.max(1));

        let mut nodes: Vec<Node> = Vec::new();
        // (arena slot, rows reaching the node, depth)
        let mut stack: Vec<(usize, Vec<usize>, usize)> = vec![(0, samples.to_vec(), 0)];
        nodes.push(Node::Leaf(LeafInfo {
            class_distribution: Vec::new(),
            n_samples: 0,
        }));

        while let Some((slot, rows, depth)) = stack.pop() {
            let counts = class_counts(y, &rows, n_classes);
            let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
            let depth_reached = config.max_depth.is_some_and(|d| depth >= d);

            let split = if is_pure || depth_reached || rows.len() < config.min_samples_split {
                None
            } else {
                best_split(x, y, &rows, n_classes, max_features, config.criterion, rng)
            };
            let partition = split.and_then(|candidate| {
                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                    .iter()
                    .partition(|&&r| x[[r, candidate.feature_idx]] <= candidate.threshold);
                // a split that sends every row one way would be grown forever
                (!left_rows.is_empty() && !right_rows.is_empty())
                    .then_some((candidate, left_rows, right_rows))
            });

            match partition {
                Some((candidate, left_rows, right_rows)) => {
                    let left = nodes.len();
                    let right = left + 1;
                    for _ in 0..2 {
                        nodes.push(Node::Leaf(LeafInfo {
                            class_distribution: Vec::new(),
                            n_samples: 0,
                        }));
                    }
                    nodes[slot] = Node::Split(TreeSplit {
                        feature_idx: candidate.feature_idx,
                        threshold: candidate.threshold,
                        left,
                        right,
                        n_samples: rows.len(),
                    });
                    stack.push((right, right_rows, depth + 1));
                    stack.push((left, left_rows, depth + 1));
                }
                None => {
                    let total = rows.len() as f32;
                    nodes[slot] = Node::Leaf(LeafInfo {
                        class_distribution: counts.iter().map(|&c| c as f32 / total).collect(),
                        n_samples: rows.len(),
                    });
                }
            }
        }

        Ok(Self {
            nodes,
            n_classes,
            n_features,
        })
    }

    /// Leaf reached by one sample
    pub fn leaf(&self, row: ArrayView1<'_, f32>) -> &LeafInfo {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(info) => return info,
                Node::Split(split) => {
                    idx = if row[split.feature_idx] <= split.threshold {
                        split.left
                    } else {
                        split.right
                    };
                }
            }
        }
    }

    /// Class distribution for one sample
    pub fn predict_proba_row(&self, row: ArrayView1<'_, f32>) -> &[f32] {
        &self.leaf(row).class_distribution
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of nodes in the arena
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            max_depth = max_depth.max(d);
            if let Node::Split(split) = &self.nodes[idx] {
                stack.push((split.left, d + 1));
                stack.push((split.right, d + 1));
            }
        }
        max_depth
    }
}

fn class_counts(y: &[usize], rows: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; n_classes];
    for &r in rows {
        counts[y[r]] += 1;
    }
    counts
}

/// Lowest weighted child impurity over a random subset of features
///
/// Features are visited in random order until `max_features` of them
/// admitted at least one split. Constant features and features holding a
/// NaN do not count, and thresholds only fall between finite values.
fn best_split(
    x: &Array2<f32>,
    y: &[usize],
    rows: &[usize],
    n_classes: usize,
    max_features: usize,
    criterion: Criterion,
    rng: &mut StdRng,
) -> Option<Candidate> {
    let mut features: Vec<usize> = (0..x.ncols()).collect();
    features.shuffle(rng);

    let total = class_counts(y, rows, n_classes);
    let n = rows.len();
    let mut best: Option<Candidate> = None;
    let mut visited = 0;

    for feature_idx in features {
        if visited >= max_features {
            break;
        }

        let mut sorted: Vec<(f32, usize)> =
            rows.iter().map(|&r| (x[[r, feature_idx]], y[r])).collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        // NaN compares as unordered, so constant and NaN-bearing features are skipped
        if sorted[0].0.partial_cmp(&sorted[n - 1].0) != Some(Ordering::Less) {
            continue;
        }
        visited += 1;

        let mut left = vec![0usize; n_classes];
        for i in 1..n {
            left[sorted[i - 1].1] += 1;
            let (prev, next) = (sorted[i - 1].0, sorted[i].0);
            if !prev.is_finite() || !next.is_finite() || prev >= next {
                continue;
            }

            let right: Vec<usize> = total.iter().zip(&left).map(|(t, l)| t - l).collect();
            let score = i as f64 * criterion.impurity(&left, i)
                + (n - i) as f64 * criterion.impurity(&right, n - i);

            if best.as_ref().map_or(true, |b| score < b.score) {
                let mut threshold = prev + (next - prev) / 2.0;
                if threshold >= next {
                    threshold = prev;
                }
                best = Some(Candidate {
                    feature_idx,
                    threshold,
                    score,
                });
            }
        }
    }

    best
}
