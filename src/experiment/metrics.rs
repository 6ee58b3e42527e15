//! Reported metrics of an unlearning run

use crate::tracking::MetricRow;
use crate::unlearn::{Evaluation, MiaScore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics reported after one evaluation
///
/// Accuracies are rates in [0, 1]; `forget` is reported inverted
/// (1 − top-1), so higher means more forgotten. MIA values are ×100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub test: f64,
    pub forget: f64,
    pub retain: f64,
    pub val: f64,
    pub mia_auc: f64,
    pub mia_acc: f64,
}

impl EpochMetrics {
    /// Metric keys, in logging order
    pub const KEYS: [&'static str; 6] = ["test", "forget", "retain", "val", "mia_auc", "mia_acc"];

    pub fn new(evaluation: &Evaluation, mia: MiaScore) -> Self {
        let acc = |split: &str| f64::from(evaluation.accuracy(split));
        Self {
            test: acc("test"),
            forget: 1.0 - acc("forget"),
            retain: acc("retain"),
            val: acc("val"),
            mia_auc: mia.auc,
            mia_acc: mia.accuracy,
        }
    }

    /// Values paired with [`EpochMetrics::KEYS`]
    pub fn values(&self) -> [f64; 6] {
        [self.test, self.forget, self.retain, self.val, self.mia_auc, self.mia_acc]
    }

    /// Top-1 accuracy on the forget split
    pub fn forget_top1(&self) -> f64 {
        1.0 - self.forget
    }

    /// Tracker row with every key prefixed by `prefix`
    pub fn to_row(&self, prefix: &str) -> MetricRow {
        Self::KEYS
            .iter()
            .zip(self.values())
            .map(|(k, v)| (format!("{prefix}{k}"), v))
            .collect()
    }
}

/// Best epochs seen so far
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BestEpochs {
    /// Highest test accuracy
    pub test: Option<(usize, EpochMetrics)>,
    /// Forget accuracy closest to test accuracy
    pub forget: Option<(usize, EpochMetrics)>,
}

impl BestEpochs {
    pub fn update(&mut self, epoch: usize, metrics: EpochMetrics) {
        if self.test.map_or(true, |(_, best)| metrics.test > best.test) {
            self.test = Some((epoch, metrics));
        }
        let gap = |m: &EpochMetrics| (m.forget_top1() - m.test).abs();
        if self.forget.map_or(true, |(_, best)| gap(&metrics) < gap(&best)) {
            self.forget = Some((epoch, metrics));
        }
    }

    /// Summary entries `best_test_<key>` and `best_forget_<key>`, plus the epochs
    pub fn summary(&self) -> BTreeMap<String, f64> {
        let mut summary = BTreeMap::new();
        for (label, best) in [("best_test", self.test), ("best_forget", self.forget)] {
            if let Some((epoch, metrics)) = best {
                summary.insert(format!("{label}_epoch"), epoch as f64);
                summary.extend(metrics.to_row(&format!("{label}_")));
            }
        }
        summary
    }
}

/// `<key>_avg` and `<key>_std` over repeated runs
///
/// The standard deviation is the sample (n − 1) estimate, 0 for one run.
pub fn aggregate(results: &[EpochMetrics]) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    if results.is_empty() {
        return out;
    }
    let n = results.len() as f64;
    for (i, key) in EpochMetrics::KEYS.iter().enumerate() {
        let values: Vec<f64> = results.iter().map(|m| m.values()[i]).collect();
        let avg = values.iter().sum::<f64>() / n;
        let std = if results.len() < 2 {
            0.0
        } else {
            (values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };
        out.insert(format!("{key}_avg"), avg);
        out.insert(format!("{key}_std"), std);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn metrics(test: f64, forget: f64) -> EpochMetrics {
        EpochMetrics {
            test,
            forget,
            retain: 0.9,
            val: 0.8,
            mia_auc: 60.0,
            mia_acc: 40.0,
        }
    }

    #[test]
    fn test_forget_is_inverted() {
        let mut evaluation = Evaluation::default();
        for (split, acc) in [("test", 0.8), ("forget", 0.25), ("retain", 0.9), ("val", 0.85)] {
            evaluation.accuracies.insert(split.to_string(), acc);
        }
        let m = EpochMetrics::new(
            &evaluation,
            MiaScore {
                auc: 55.0,
                accuracy: 70.0,
            },
        );
        assert_abs_diff_eq!(m.forget, 0.75, epsilon = 1e-6);
        assert_abs_diff_eq!(m.forget_top1(), 0.25, epsilon = 1e-6);
        assert_eq!(m.mia_auc, 55.0);
    }

    #[test]
    fn test_row_prefix() {
        let row = metrics(0.5, 0.5).to_row("base_");
        let keys: Vec<_> = row.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["base_forget", "base_mia_acc", "base_mia_auc", "base_retain", "base_test", "base_val"]
        );
        assert_eq!(row["base_mia_acc"], 40.0);
    }

    #[test]
    fn test_best_epochs() {
        let mut best = BestEpochs::default();
        best.update(0, metrics(0.70, 0.10)); // forget top1 0.90, gap 0.20
        best.update(1, metrics(0.75, 0.30)); // forget top1 0.70, gap 0.05
        best.update(2, metrics(0.72, 0.60)); // forget top1 0.40, gap 0.32

        assert_eq!(best.test.map(|(e, _)| e), Some(1));
        assert_eq!(best.forget.map(|(e, _)| e), Some(1));

        best.update(3, metrics(0.60, 0.40)); // forget top1 0.60, gap 0.00
        assert_eq!(best.test.map(|(e, _)| e), Some(1));
        assert_eq!(best.forget.map(|(e, _)| e), Some(3));

        let summary = best.summary();
        assert_eq!(summary["best_test_epoch"], 1.0);
        assert_eq!(summary["best_forget_epoch"], 3.0);
        assert_eq!(summary["best_forget_test"], 0.60);
    }

    #[test]
    fn test_empty_best_has_no_summary() {
        assert!(BestEpochs::default().summary().is_empty());
    }

    #[test]
    fn test_aggregate() {
        let out = aggregate(&[metrics(0.6, 0.1), metrics(0.8, 0.3)]);
        assert_abs_diff_eq!(out["test_avg"], 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(out["test_std"], 0.02f64.sqrt(), epsilon = 1e-12);
        assert_eq!(out["retain_std"], 0.0);
        assert_eq!(out.len(), 12);

        let single = aggregate(&[metrics(0.6, 0.1)]);
        assert_eq!(single["forget_std"], 0.0);
        assert!(aggregate(&[]).is_empty());
    }
}
