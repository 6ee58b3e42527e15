//! Bagged ensemble of decision trees

use super::{Criterion, DecisionTree, TreeConfig};
use crate::{Error, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random forest parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub criterion: Criterion,
    /// Draw a bootstrap sample per tree
    pub bootstrap: bool,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            criterion: Criterion::Gini,
            bootstrap: true,
            max_depth: None,
            min_samples_split: 2,
            seed: 0,
        }
    }
}

/// Random forest classifier
///
/// Each tree sees a bootstrap sample and examines `sqrt(n_features)`
/// features per split. Probabilities are averaged across trees.
///
/// # Example
///
/// ```
/// use desaprender::forest::{ForestConfig, RandomForest};
/// use ndarray::array;
///
/// let x = array![[0.1f32], [0.2], [0.3], [0.9], [1.0], [1.1]];
/// let y = [0, 0, 0, 1, 1, 1];
/// let config = ForestConfig {
///     n_estimators: 10,
///     ..Default::default()
/// };
/// let forest = RandomForest::fit(&x, &y, 2, &config).unwrap();
/// assert_eq!(forest.predict(&array![[0.15f32], [1.05]]), vec![0, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForest {
    /// Fit a forest on rows of `x` with labels `y`
    pub fn fit(
        x: &Array2<f32>,
        y: &[usize],
        n_classes: usize,
        config: &ForestConfig,
    ) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(Error::InvalidInput("cannot fit a forest on zero rows".into()));
        }
        if config.n_estimators == 0 {
            return Err(Error::Config("n_estimators must be > 0".into()));
        }

        let n = x.nrows();
        let max_features = ((x.ncols() as f64).sqrt() as usize).max(1);
        let tree_config = TreeConfig {
            criterion: config.criterion,
            max_features: Some(max_features),
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
        };

        let mut rng = StdRng::seed_from_u64(config.seed);
        let all_rows: Vec<usize> = (0..n).collect();
        let trees = (0..config.n_estimators)
            .map(|_| {
                let mut tree_rng = StdRng::seed_from_u64(rng.random());
                let samples: Vec<usize> = if config.bootstrap {
                    (0..n).map(|_| tree_rng.random_range(0..n)).collect()
                } else {
                    all_rows.clone()
                };
                DecisionTree::fit(x, y, &samples, n_classes, &tree_config, &mut tree_rng)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { trees, n_classes })
    }

    /// Mean class distribution per row, shape `[rows, n_classes]`
    pub fn predict_proba(&self, x: &Array2<f32>) -> Array2<f32> {
        let mut proba = Array2::<f32>::zeros((x.nrows(), self.n_classes));
        for tree in &self.trees {
            for (i, row) in x.rows().into_iter().enumerate() {
                for (c, p) in tree.predict_proba_row(row).iter().enumerate() {
                    proba[[i, c]] += p;
                }
            }
        }
        proba /= self.trees.len() as f32;
        proba
    }

    /// Most probable class per row; ties go to the lowest class index
    pub fn predict(&self, x: &Array2<f32>) -> Vec<usize> {
        self.predict_proba(x)
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |(best, best_p), (c, &p)| {
                        if p > best_p {
                            (c, p)
                        } else {
                            (best, best_p)
                        }
                    })
                    .0
            })
            .collect()
    }

    /// Number of trees
    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy() -> (Array2<f32>, Vec<usize>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            let base = if i < 20 { 0.0 } else { 5.0 };
            base + (i * 7 + j * 3) as f32 % 11.0 / 10.0
        });
        let y = (0..40).map(|i| usize::from(i >= 20)).collect();
        (x, y)
    }

    #[test]
    fn test_fit_predict_separable() {
        let (x, y) = toy();
        let config = ForestConfig {
            n_estimators: 20,
            ..Default::default()
        };
        let forest = RandomForest::fit(&x, &y, 2, &config).unwrap();
        assert_eq!(forest.n_estimators(), 20);
        assert_eq!(forest.predict(&x), y);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = toy();
        let config = ForestConfig {
            n_estimators: 5,
            ..Default::default()
        };
        let forest = RandomForest::fit(&x, &y, 2, &config).unwrap();
        for row in forest.predict_proba(&x).rows() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_seed_determinism() {
        let (x, y) = toy();
        let config = ForestConfig {
            n_estimators: 8,
            criterion: Criterion::Entropy,
            ..Default::default()
        };
        let a = RandomForest::fit(&x, &y, 2, &config).unwrap();
        let b = RandomForest::fit(&x, &y, 2, &config).unwrap();
        let points = array![[2.6f32, 2.6], [0.3, 4.9]];
        assert_eq!(a.predict_proba(&points), b.predict_proba(&points));
    }

    #[test]
    fn test_tie_goes_to_class_zero() {
        // Identical features with opposite labels: every leaf is 50/50
        let x = array![[1.0f32], [1.0]];
        let config = ForestConfig {
            n_estimators: 3,
            bootstrap: false,
            ..Default::default()
        };
        let forest = RandomForest::fit(&x, &[0, 1], 2, &config).unwrap();
        assert_eq!(forest.predict(&x), vec![0, 0]);
    }

    #[test]
    fn test_invalid_inputs() {
        let empty = Array2::<f32>::zeros((0, 1));
        assert!(RandomForest::fit(&empty, &[], 2, &ForestConfig::default()).is_err());
        let x = array![[1.0f32]];
        let config = ForestConfig {
            n_estimators: 0,
            ..Default::default()
        };
        assert!(RandomForest::fit(&x, &[0], 2, &config).is_err());
    }
}
