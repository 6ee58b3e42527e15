//! Forget-set membership and selection

use super::Dataset;
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Identity indices of the training examples to forget
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForgetSet {
    indices: BTreeSet<usize>,
}

impl ForgetSet {
    pub fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            indices: indices.into_iter().collect(),
        }
    }

    /// Whether one identity index belongs to the forget set
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Per-example membership for a batch's identity indices
    pub fn membership(&self, indices: &[usize]) -> Vec<bool> {
        indices.iter().map(|i| self.contains(*i)).collect()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    /// Write as a JSON list of indices
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Read a JSON list of indices
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// How the forget set is chosen from the training pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum ForgetSelector {
    /// Every pool example with this label
    Class { class: usize },
    /// A seeded random fraction of the pool
    Ratio { ratio: f32 },
    /// Explicit identity indices
    Indices { indices: Vec<usize> },
}

impl ForgetSelector {
    /// Choose forget examples among `pool` (identity indices into `dataset`)
    pub fn select(&self, dataset: &Dataset, pool: &[usize], seed: u64) -> Result<ForgetSet> {
        match self {
            Self::Class { class } => {
                if *class >= dataset.num_classes() {
                    return Err(Error::Config(format!(
                        "class_to_forget {class} out of range for {} classes",
                        dataset.num_classes()
                    )));
                }
                Ok(ForgetSet::new(pool.iter().copied().filter(|&i| {
                    dataset.get(i).is_some_and(|e| e.label == *class)
                })))
            }
            Self::Ratio { ratio } => {
                if !(*ratio > 0.0 && *ratio < 1.0) {
                    return Err(Error::Config(format!(
                        "unlearning_rate must be in (0, 1), got {ratio}"
                    )));
                }
                let count = ((pool.len() as f32) * ratio).round() as usize;
                let mut shuffled = pool.to_vec();
                shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
                Ok(ForgetSet::new(shuffled.into_iter().take(count.max(1))))
            }
            Self::Indices { indices } => {
                let allowed: BTreeSet<usize> = pool.iter().copied().collect();
                if let Some(bad) = indices.iter().find(|i| !allowed.contains(i)) {
                    return Err(Error::InvalidInput(format!(
                        "forget index {bad} is not a training example"
                    )));
                }
                Ok(ForgetSet::new(indices.iter().copied()))
            }
        }
    }

    /// Resolve the pair of mutually exclusive settings
    ///
    /// A class takes precedence over a ratio; neither is a configuration error.
    pub fn from_settings(
        class_to_forget: Option<usize>,
        unlearning_rate: Option<f32>,
    ) -> Result<Self> {
        match (class_to_forget, unlearning_rate) {
            (Some(class), _) => Ok(Self::Class { class }),
            (None, Some(ratio)) => Ok(Self::Ratio { ratio }),
            (None, None) => Err(Error::Config(
                "either class_to_forget or unlearning_rate must be set".into(),
            )),
        }
    }

    /// Short tag used in run names and file names
    pub fn tag(&self) -> String {
        match self {
            Self::Class { class } => format!("class{class}"),
            Self::Ratio { ratio } => format!("ratio{ratio}"),
            Self::Indices { indices } => format!("idx{}", indices.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Example;
    use tempfile::TempDir;

    fn dataset() -> Dataset {
        let examples = (0..10).map(|i| Example::new(vec![i as f32], i % 3)).collect();
        Dataset::new("toy", examples, 3).unwrap()
    }

    #[test]
    fn test_membership_by_identity() {
        let forget = ForgetSet::new([3, 7]);
        assert_eq!(
            forget.membership(&[1, 3, 5, 7]),
            vec![false, true, false, true]
        );
    }

    #[test]
    fn test_select_by_class() {
        let ds = dataset();
        let pool: Vec<usize> = (0..10).collect();
        let forget = ForgetSelector::Class { class: 1 }.select(&ds, &pool, 0).unwrap();
        assert_eq!(forget.iter().collect::<Vec<_>>(), vec![1, 4, 7]);
    }

    #[test]
    fn test_select_by_class_respects_pool() {
        let ds = dataset();
        let forget = ForgetSelector::Class { class: 1 }
            .select(&ds, &[0, 1, 2, 3], 0)
            .unwrap();
        assert_eq!(forget.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_select_by_ratio_is_seeded() {
        let ds = dataset();
        let pool: Vec<usize> = (0..10).collect();
        let sel = ForgetSelector::Ratio { ratio: 0.3 };
        let a = sel.select(&ds, &pool, 9).unwrap();
        let b = sel.select(&ds, &pool, 9).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_selectors() {
        let ds = dataset();
        let pool: Vec<usize> = (0..5).collect();
        assert!(ForgetSelector::Class { class: 3 }.select(&ds, &pool, 0).is_err());
        assert!(ForgetSelector::Ratio { ratio: 1.5 }.select(&ds, &pool, 0).is_err());
        assert!(ForgetSelector::Indices { indices: vec![8] }
            .select(&ds, &pool, 0)
            .is_err());
    }

    #[test]
    fn test_from_settings_precedence() {
        assert_eq!(
            ForgetSelector::from_settings(Some(2), Some(0.1)).unwrap(),
            ForgetSelector::Class { class: 2 }
        );
        assert!(ForgetSelector::from_settings(None, None).is_err());
    }

    #[test]
    fn test_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run_forget.json");
        let forget = ForgetSet::new([9, 2, 4]);
        forget.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[2,4,9]");
        assert_eq!(ForgetSet::load(&path).unwrap(), forget);
    }
}
