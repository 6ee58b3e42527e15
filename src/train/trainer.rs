//! Supervised training driver used to produce checkpoints
//!
//! SGD with momentum and weight decay, learning rate reduced when
//! validation top-1 plateaus, early stopping on the same metric. The best
//! validation weights are restored when training ends.

use super::{CrossEntropyLoss, EarlyStopping, LossFn};
use crate::autograd::{backward, mean, NoGradGuard};
use crate::data::DataLoader;
use crate::nn::Classifier;
use crate::optim::{Optimizer, PlateauMode, ReduceLROnPlateau, SGD};
use crate::unlearn::topk_correct;
use crate::{Device, Error, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub lr: f32,
    pub momentum: f32,
    pub weight_decay: f32,
    /// Learning rate decay when validation accuracy plateaus
    pub plateau_factor: f32,
    pub plateau_patience: usize,
    pub early_stopping_patience: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 30,
            lr: 0.1,
            momentum: 0.9,
            weight_decay: 5e-4,
            plateau_factor: 0.2,
            plateau_patience: 5,
            early_stopping_patience: 10,
        }
    }
}

/// Metrics of one training epoch (accuracies in percent)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub train_loss: f32,
    pub lr: f32,
    pub val_top1: f32,
    pub val_top5: f32,
    pub test_top1: f32,
    pub test_top5: f32,
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainResult {
    /// Final epoch reached
    pub final_epoch: usize,
    /// Epoch whose weights were kept
    pub best_epoch: usize,
    pub best_val_top1: f32,
    /// Whether training was stopped early
    pub stopped_early: bool,
    /// Total training time in seconds
    pub elapsed_secs: f64,
    pub history: Vec<EpochReport>,
}

/// High-level trainer that orchestrates the training loop
pub struct Trainer {
    config: TrainConfig,
    optimizer: SGD,
    scheduler: ReduceLROnPlateau,
    early_stopping: EarlyStopping,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Self {
            optimizer: SGD::with_weight_decay(config.lr, config.momentum, config.weight_decay),
            scheduler: ReduceLROnPlateau::new(
                config.lr,
                PlateauMode::Max,
                config.plateau_factor,
                config.plateau_patience,
            ),
            early_stopping: EarlyStopping::new(
                config.early_stopping_patience,
                0.0,
                PlateauMode::Max,
            ),
            config,
        }
    }

    /// Optimizer, e.g. to persist its state
    pub fn optimizer(&self) -> &SGD {
        &self.optimizer
    }

    /// Current learning rate
    pub fn lr(&self) -> f32 {
        self.optimizer.lr()
    }

    /// Train for one epoch, returning the mean batch loss
    pub fn train_epoch(
        &mut self,
        model: &mut dyn Classifier,
        loader: &DataLoader,
        device: Device,
    ) -> Result<f32> {
        let loss_fn = CrossEntropyLoss;
        let mut total = 0.0f64;
        let mut batches = 0usize;

        for batch in loader.iter() {
            let batch = batch.to_device(device);
            let logits = model.forward(&batch.inputs, batch.size())?;
            let mut loss = mean(&loss_fn.per_example(&logits, &batch.labels)?);
            let value = loss.data()[0];
            if !value.is_finite() {
                model.zero_grad();
                return Err(Error::NonFinite {
                    what: "training loss".into(),
                    value,
                });
            }
            backward(&mut loss, None);

            let mut params = model.parameters_mut();
            self.optimizer.step(&mut params);
            self.optimizer.zero_grad(&mut params);

            total += f64::from(value);
            batches += 1;
        }

        Ok(if batches == 0 {
            0.0
        } else {
            (total / batches as f64) as f32
        })
    }

    /// Train until the epoch budget or early stopping
    pub fn fit(
        &mut self,
        model: &mut dyn Classifier,
        train: &DataLoader,
        val: &DataLoader,
        test: &DataLoader,
        device: Device,
    ) -> Result<TrainResult> {
        let start = Instant::now();
        let mut history = Vec::with_capacity(self.config.epochs);
        let mut best: Option<(usize, f32, Vec<Array1<f32>>)> = None;
        let mut stopped_early = false;

        for epoch in 0..self.config.epochs {
            let train_loss = self.train_epoch(model, train, device)?;
            let (val_top1, val_top5) = topk_accuracy(&*model, val, device)?;
            let (test_top1, test_top5) = topk_accuracy(&*model, test, device)?;

            let report = EpochReport {
                epoch,
                train_loss,
                lr: self.lr(),
                val_top1,
                val_top5,
                test_top1,
                test_top5,
            };
            info!(
                epoch,
                loss = train_loss,
                lr = report.lr,
                val_top1,
                val_top5,
                test_top1,
                test_top5,
                "epoch finished"
            );
            history.push(report);

            if best.as_ref().map_or(true, |(_, acc, _)| val_top1 > *acc) {
                best = Some((epoch, val_top1, snapshot(&*model)));
            }

            if self.scheduler.step(val_top1) {
                self.scheduler.apply(&mut self.optimizer);
                info!(lr = self.scheduler.get_lr(), "reduced learning rate");
            }
            if self.early_stopping.update(val_top1) {
                info!(epoch, patience = self.config.early_stopping_patience, "early stopping");
                stopped_early = true;
                break;
            }
        }

        let (best_epoch, best_val_top1) = match best {
            Some((epoch, acc, weights)) => {
                restore(model, weights);
                debug!(epoch, "restored best weights");
                (epoch, acc)
            }
            None => (0, 0.0),
        };

        Ok(TrainResult {
            final_epoch: history.last().map_or(0, |r| r.epoch),
            best_epoch,
            best_val_top1,
            stopped_early,
            elapsed_secs: start.elapsed().as_secs_f64(),
            history,
        })
    }
}

/// Top-1 and top-5 accuracy in percent
pub fn topk_accuracy(
    model: &dyn Classifier,
    loader: &DataLoader,
    device: Device,
) -> Result<(f32, f32)> {
    if loader.is_empty() {
        return Ok((0.0, 0.0));
    }
    let _guard = NoGradGuard::new();
    let classes = model.num_classes();
    let (mut top1, mut top5) = (0usize, 0usize);
    for batch in loader.iter() {
        let batch = batch.to_device(device);
        let logits = model.forward(&batch.inputs, batch.size())?.data().to_vec();
        top1 += topk_correct(&logits, classes, &batch.labels, 1);
        top5 += topk_correct(&logits, classes, &batch.labels, 5);
    }
    let n = loader.len() as f32;
    Ok((top1 as f32 / n * 100.0, top5 as f32 / n * 100.0))
}

fn snapshot(model: &dyn Classifier) -> Vec<Array1<f32>> {
    model
        .named_parameters()
        .into_iter()
        .map(|(_, p)| p.data().clone())
        .collect()
}

fn restore(model: &mut dyn Classifier, weights: Vec<Array1<f32>>) {
    for (param, w) in model.parameters_mut().into_iter().zip(weights) {
        *param.data_mut() = w;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BlobsConfig, ForgetSelector, SplitConfig, UnlearningSplits};
    use crate::nn::{Mlp, ModelSpec};

    fn splits() -> UnlearningSplits {
        let (train, test) = BlobsConfig {
            num_classes: 3,
            num_features: 2,
            train_per_class: 40,
            test_per_class: 15,
            spread: 0.5,
            seed: 1,
            ..Default::default()
        }
        .generate()
        .unwrap();
        UnlearningSplits::build(
            train,
            test,
            &ForgetSelector::Class { class: 0 },
            SplitConfig {
                batch_size: 16,
                val_fraction: 0.2,
                seed: 0,
            },
        )
        .unwrap()
    }

    fn model() -> Mlp {
        let spec = ModelSpec {
            name: "mlp".into(),
            input_dim: 2,
            hidden: vec![16],
            num_classes: 3,
        };
        Mlp::new(&spec, 0).unwrap()
    }

    #[test]
    fn test_fit_learns_separable_blobs() {
        let splits = splits();
        let mut m = model();
        let mut trainer = Trainer::new(TrainConfig {
            epochs: 15,
            lr: 0.05,
            ..Default::default()
        });
        let result = trainer
            .fit(&mut m, &splits.train, &splits.val, &splits.test, Device::Cpu)
            .unwrap();

        assert!(result.best_val_top1 > 80.0, "val top1 = {}", result.best_val_top1);
        let (val_top1, _) = topk_accuracy(&m, &splits.val, Device::Cpu).unwrap();
        assert_eq!(val_top1, result.best_val_top1);
        assert!(result.history.len() <= 15);
    }

    #[test]
    fn test_top5_covers_every_class_with_three_classes() {
        let splits = splits();
        let m = model();
        let (_, top5) = topk_accuracy(&m, &splits.test, Device::Cpu).unwrap();
        assert_eq!(top5, 100.0);
    }

    #[test]
    fn test_early_stopping_with_zero_lr() {
        let splits = splits();
        let mut m = model();
        let mut trainer = Trainer::new(TrainConfig {
            epochs: 20,
            lr: 0.0,
            early_stopping_patience: 2,
            ..Default::default()
        });
        let result = trainer
            .fit(&mut m, &splits.retain, &splits.val, &splits.test, Device::Cpu)
            .unwrap();
        assert!(result.stopped_early);
        assert_eq!(result.history.len(), 3);
        assert_eq!(result.best_epoch, 0);
    }
}
