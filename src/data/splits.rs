//! Train/val/test/forget/retain partition

use super::{DataLoader, Dataset, ForgetSelector, ForgetSet};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::info;

/// Partition parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub batch_size: usize,
    /// Fraction of the training pool held out as the validation split
    pub val_fraction: f32,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            val_fraction: 0.1,
            seed: 0,
        }
    }
}

/// The five loaders of an unlearning experiment
///
/// Val is held out of the training pool before forget/retain are drawn, so
/// val and test are non-members while forget and retain are members. Every
/// non-val training example is in exactly one of forget or retain.
pub struct UnlearningSplits {
    /// Forget ∪ retain, shuffled
    pub train: DataLoader,
    pub val: DataLoader,
    pub test: DataLoader,
    /// Shuffled
    pub forget: DataLoader,
    /// Shuffled
    pub retain: DataLoader,
    pub forget_set: ForgetSet,
}

impl UnlearningSplits {
    /// Partition `train` and wrap `test`
    pub fn build(
        train: Dataset,
        test: Dataset,
        selector: &ForgetSelector,
        config: SplitConfig,
    ) -> Result<Self> {
        if train.num_features() != test.num_features() && !test.is_empty() {
            return Err(Error::ShapeMismatch {
                name: "test.features".to_string(),
                expected: vec![train.num_features()],
                actual: vec![test.num_features()],
            });
        }
        if !(0.0..1.0).contains(&config.val_fraction) {
            return Err(Error::Config(format!(
                "val_fraction must be in [0, 1), got {}",
                config.val_fraction
            )));
        }

        let mut order: Vec<usize> = (0..train.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(config.seed));
        let n_val = ((train.len() as f32) * config.val_fraction).round() as usize;
        let (val_idx, pool) = order.split_at(n_val);
        let mut val_idx = val_idx.to_vec();
        let mut pool = pool.to_vec();
        val_idx.sort_unstable();
        pool.sort_unstable();

        let forget_set = selector.select(&train, &pool, config.seed)?;
        let (forget_idx, retain_idx): (Vec<usize>, Vec<usize>) =
            pool.iter().partition(|&&i| forget_set.contains(i));

        info!(
            train = pool.len(),
            val = val_idx.len(),
            test = test.len(),
            forget = forget_idx.len(),
            retain = retain_idx.len(),
            "built splits"
        );

        let train = Rc::new(train);
        let test = Rc::new(test);
        let bs = config.batch_size;
        let seed = config.seed;

        Ok(Self {
            train: DataLoader::new(Rc::clone(&train), pool, bs).shuffled(seed),
            val: DataLoader::new(Rc::clone(&train), val_idx, bs),
            test: DataLoader::new(Rc::clone(&test), (0..test.len()).collect(), bs),
            forget: DataLoader::new(Rc::clone(&train), forget_idx, bs)
                .shuffled(seed.wrapping_add(1)),
            retain: DataLoader::new(train, retain_idx, bs).shuffled(seed.wrapping_add(2)),
            forget_set,
        })
    }

    /// Number of classes of the underlying data
    pub fn num_classes(&self) -> usize {
        self.train.dataset().num_classes()
    }

    /// Feature width of the underlying data
    pub fn num_features(&self) -> usize {
        self.train.dataset().num_features()
    }

    /// Held-out loaders in reporting order
    pub fn eval_splits(&self) -> [(&'static str, &DataLoader); 4] {
        [
            ("test", &self.test),
            ("forget", &self.forget),
            ("retain", &self.retain),
            ("val", &self.val),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Example;
    use std::collections::BTreeSet;

    fn datasets() -> (Dataset, Dataset) {
        let train = (0..100).map(|i| Example::new(vec![i as f32], i % 4)).collect();
        let test = (0..20).map(|i| Example::new(vec![i as f32], i % 4)).collect();
        (
            Dataset::new("train", train, 4).unwrap(),
            Dataset::new("test", test, 4).unwrap(),
        )
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let (train, test) = datasets();
        let splits = UnlearningSplits::build(
            train,
            test,
            &ForgetSelector::Class { class: 2 },
            SplitConfig {
                batch_size: 16,
                val_fraction: 0.2,
                seed: 3,
            },
        )
        .unwrap();

        let val: BTreeSet<usize> = splits.val.indices().iter().copied().collect();
        let forget: BTreeSet<usize> = splits.forget.indices().iter().copied().collect();
        let retain: BTreeSet<usize> = splits.retain.indices().iter().copied().collect();
        let pool: BTreeSet<usize> = splits.train.indices().iter().copied().collect();

        assert_eq!(val.len(), 20);
        assert!(val.is_disjoint(&pool));
        assert!(forget.is_disjoint(&retain));
        assert_eq!(forget.union(&retain).copied().collect::<BTreeSet<_>>(), pool);
        assert_eq!(val.len() + pool.len(), 100);
        assert_eq!(splits.test.len(), 20);
        assert!(forget.iter().all(|&i| i % 4 == 2));
        assert_eq!(splits.forget_set.len(), forget.len());
    }

    #[test]
    fn test_build_is_deterministic() {
        let build = || {
            let (train, test) = datasets();
            UnlearningSplits::build(
                train,
                test,
                &ForgetSelector::Ratio { ratio: 0.1 },
                SplitConfig::default(),
            )
            .unwrap()
        };
        assert_eq!(build().forget.indices(), build().forget.indices());
        assert_eq!(build().val.indices(), build().val.indices());
    }

    #[test]
    fn test_rejects_bad_val_fraction() {
        let (train, test) = datasets();
        let config = SplitConfig {
            val_fraction: 1.0,
            ..Default::default()
        };
        let forget = ForgetSelector::Class { class: 0 };
        assert!(UnlearningSplits::build(train, test, &forget, config).is_err());
    }

    #[test]
    fn test_eval_split_names() {
        let (train, test) = datasets();
        let forget = ForgetSelector::Class { class: 0 };
        let splits =
            UnlearningSplits::build(train, test, &forget, SplitConfig::default()).unwrap();
        let names: Vec<&str> = splits.eval_splits().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["test", "forget", "retain", "val"]);
    }
}
