//! Loss-based membership inference attack
//!
//! A random forest learns to tell members (retain losses) from non-members
//! (val losses) and is then scored on forget (members) versus test
//! (non-members). A forget set that looks like test data means the model
//! no longer remembers it.

use crate::forest::{roc_auc, Criterion, ForestConfig, RandomForest};
use crate::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Attack hyperparameter grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiaConfig {
    pub n_estimators: Vec<usize>,
    pub criteria: Vec<Criterion>,
    /// Seed of every forest in the grid
    pub seed: u64,
}

impl Default for MiaConfig {
    fn default() -> Self {
        Self {
            n_estimators: vec![20, 50, 100],
            criteria: vec![Criterion::Gini, Criterion::Entropy],
            seed: 0,
        }
    }
}

/// Score of one grid point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridScore {
    pub n_estimators: usize,
    pub criterion: Criterion,
    /// ROC AUC on forget ∪ test, ×100
    pub auc: f64,
    /// Forget examples judged non-members, ×100
    pub accuracy: f64,
}

/// Best attack results over the grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MiaScore {
    pub auc: f64,
    pub accuracy: f64,
}

/// Independent maxima of AUC and accuracy
///
/// The two maxima may come from different grid points. An empty grid
/// scores zero.
pub fn best_of(scores: &[GridScore]) -> MiaScore {
    scores.iter().fold(
        MiaScore {
            auc: 0.0,
            accuracy: 0.0,
        },
        |best, s| MiaScore {
            auc: best.auc.max(s.auc),
            accuracy: best.accuracy.max(s.accuracy),
        },
    )
}

/// Grid-searched random-forest membership attack
#[derive(Debug, Clone, Default)]
pub struct MiaAttacker {
    config: MiaConfig,
}

impl MiaAttacker {
    pub fn new(config: MiaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MiaConfig {
        &self.config
    }

    /// Score every grid point
    ///
    /// # Errors
    ///
    /// [`Error::EmptySplit`] if any loss list is empty, [`Error::NonFinite`]
    /// if any loss is NaN or infinite.
    pub fn grid_scores(
        &self,
        retain: &[f32],
        forget: &[f32],
        val: &[f32],
        test: &[f32],
    ) -> Result<Vec<GridScore>> {
        let splits = [
            ("retain", retain),
            ("forget", forget),
            ("val", val),
            ("test", test),
        ];
        for (name, losses) in splits {
            if losses.is_empty() {
                return Err(Error::EmptySplit(name.to_string()));
            }
            if let Some(&value) = losses.iter().find(|v| !v.is_finite()) {
                return Err(Error::NonFinite {
                    what: format!("{name} loss"),
                    value,
                });
            }
        }

        let (train_x, train_y) = stack(retain, val);
        let (eval_x, eval_y) = stack(forget, test);
        let eval_members: Vec<bool> = eval_y.iter().map(|&y| y == 1).collect();
        let forget_x = column(forget);

        let grid_size = self.config.n_estimators.len() * self.config.criteria.len();
        let mut scores = Vec::with_capacity(grid_size);
        for &n_estimators in &self.config.n_estimators {
            for &criterion in &self.config.criteria {
                let forest = RandomForest::fit(
                    &train_x,
                    &train_y,
                    2,
                    &ForestConfig {
                        n_estimators,
                        criterion,
                        seed: self.config.seed,
                        ..Default::default()
                    },
                )?;

                let member_proba: Vec<f32> = forest.predict_proba(&eval_x).column(1).to_vec();
                let auc = roc_auc(&eval_members, &member_proba).unwrap_or(0.5) * 100.0;

                let predicted = forest.predict(&forget_x);
                let members = predicted.iter().filter(|&&p| p == 1).count();
                let member_rate = members as f64 / predicted.len() as f64;
                let accuracy = (1.0 - member_rate) * 100.0;

                debug!(n_estimators, %criterion, auc, accuracy, "mia grid point");
                scores.push(GridScore {
                    n_estimators,
                    criterion,
                    auc,
                    accuracy,
                });
            }
        }
        Ok(scores)
    }

    /// Best AUC and best forget-detection accuracy over the grid
    pub fn attack(
        &self,
        retain: &[f32],
        forget: &[f32],
        val: &[f32],
        test: &[f32],
    ) -> Result<MiaScore> {
        Ok(best_of(&self.grid_scores(retain, forget, val, test)?))
    }
}

/// Members (label 1) followed by non-members (label 0) as a one-column matrix
fn stack(members: &[f32], non_members: &[f32]) -> (Array2<f32>, Vec<usize>) {
    let values: Vec<f32> = members.iter().chain(non_members).copied().collect();
    let labels = std::iter::repeat(1)
        .take(members.len())
        .chain(std::iter::repeat(0).take(non_members.len()))
        .collect();
    (column(&values), labels)
}

fn column(values: &[f32]) -> Array2<f32> {
    Array2::from_shape_fn((values.len(), 1), |(i, _)| values[i])
}
