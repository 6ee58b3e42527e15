//! Runs unlearning experiments end to end
//!
//! One run: load the checkpoint, rebuild the splits it was trained on,
//! compute or load the saliency mask, evaluate the baseline, then alternate
//! unlearning epochs with evaluation and membership inference. Everything
//! reported is logged to the tracker.

use super::metrics::{aggregate, BestEpochs, EpochMetrics};
use crate::config::Settings;
use crate::data::{DataLoader, SplitConfig, UnlearningSplits};
use crate::io::{load_checkpoint, Checkpoint};
use crate::nn::Classifier;
use crate::optim::SGD;
use crate::tracking::storage::TrackingBackend;
use crate::tracking::{ExperimentTracker, RunStatus, TrackingError};
use crate::train::CrossEntropyLoss;
use crate::unlearn::{
    build_mask, evaluate, unlearn_epoch, EpochStats, LoaderKind, MiaAttacker, SaliencyMask,
    StepContext,
};
use crate::{Device, Result};
use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything one run reported
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_name: String,
    /// Metrics before any unlearning step
    pub baseline: EpochMetrics,
    /// Metrics after each epoch
    pub epochs: Vec<EpochMetrics>,
    pub epoch_stats: Vec<EpochStats>,
    pub best: BestEpochs,
    /// Fraction of trainable elements under the mask
    pub mask_coverage: Option<f32>,
}

impl RunOutcome {
    /// Metrics after the last epoch, or the baseline when no epoch ran
    pub fn final_metrics(&self) -> EpochMetrics {
        self.epochs.last().copied().unwrap_or(self.baseline)
    }
}

/// Repeated runs of one settings entry
#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub settings: Settings,
    pub runs: Vec<RunOutcome>,
    /// `<key>_avg` / `<key>_std` of the final metrics
    pub aggregate: BTreeMap<String, f64>,
}

/// Run name: `<method>_run_[M_]<timestamp>`, suffixed with the repetition
/// when an experiment is repeated
pub fn run_name(settings: &Settings, now: DateTime<Local>, repetition: Option<usize>) -> String {
    let masked = if settings.use_mask { "M_" } else { "" };
    let mut name = format!(
        "{}_run_{masked}{}",
        settings.method,
        now.format("%Y%m%d_%H%M%S")
    );
    if let Some(rep) = repetition {
        name.push_str(&format!("_{rep}"));
    }
    name
}

/// Drives runs and logs them to a tracker
pub struct ExperimentRunner<'t, B: TrackingBackend> {
    tracker: &'t mut ExperimentTracker<B>,
    device: Device,
    attacker: MiaAttacker,
    artifacts_dir: Option<PathBuf>,
}

impl<'t, B: TrackingBackend> ExperimentRunner<'t, B> {
    pub fn new(tracker: &'t mut ExperimentTracker<B>, device: Device) -> Self {
        Self {
            tracker,
            device: device.resolve(),
            attacker: MiaAttacker::default(),
            artifacts_dir: None,
        }
    }

    /// Write computed masks and forget sets into `dir`
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(dir.into());
        self
    }

    pub fn with_attacker(mut self, attacker: MiaAttacker) -> Self {
        self.attacker = attacker;
        self
    }

    /// Run every settings entry `repeats` times
    pub fn run_all(
        &mut self,
        experiments: &[Settings],
        repeats: usize,
    ) -> Result<Vec<ExperimentReport>> {
        let mut reports = Vec::with_capacity(experiments.len());
        for (i, settings) in experiments.iter().enumerate() {
            info!(
                experiment = i + 1,
                of = experiments.len(),
                method = %settings.method,
                "running experiment"
            );
            reports.push(self.run_repeated(settings, repeats)?);
        }
        Ok(reports)
    }

    /// Repeat one experiment with consecutive seeds and aggregate the results
    pub fn run_repeated(
        &mut self,
        settings: &Settings,
        repeats: usize,
    ) -> Result<ExperimentReport> {
        let repeats = repeats.max(1);
        let mut runs = Vec::with_capacity(repeats);
        for rep in 0..repeats {
            let mut run_settings = settings.clone();
            run_settings.seed = settings.seed.wrapping_add(rep as u64);
            let repetition = (repeats > 1).then_some(rep);
            runs.push(self.run(&run_settings, repetition)?);
        }

        let finals: Vec<EpochMetrics> = runs.iter().map(RunOutcome::final_metrics).collect();
        let aggregate = aggregate(&finals);
        if repeats > 1 {
            self.log_aggregate(settings, &aggregate)?;
        }
        Ok(ExperimentReport {
            settings: settings.clone(),
            runs,
            aggregate,
        })
    }

    fn log_aggregate(
        &mut self,
        settings: &Settings,
        aggregate: &BTreeMap<String, f64>,
    ) -> Result<()> {
        let name = format!(
            "{}_summary_{}",
            settings.method,
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let run_id = self.start_unique(&name, serde_json::to_value(settings)?)?;
        for (key, value) in aggregate {
            self.tracker.set_summary(&run_id, key, *value)?;
            info!(key = %key, value, "aggregate");
        }
        self.tracker.end_run(&run_id, RunStatus::Completed)?;
        Ok(())
    }

    /// One unlearning run
    pub fn run(&mut self, settings: &Settings, repetition: Option<usize>) -> Result<RunOutcome> {
        settings.validate()?;
        let checkpoint = load_checkpoint(&settings.checkpoint)?;
        let splits = build_splits(&checkpoint, settings)?;

        let model = if settings.method.reinitializes_model() {
            info!(seed = settings.seed, "retraining from a freshly initialized model");
            checkpoint.build_untrained(settings.seed)?
        } else {
            checkpoint.build_model()?
        };

        let name = run_name(settings, Local::now(), repetition);
        let mut config = serde_json::to_value(&checkpoint.config)?;
        if let (Some(config), serde_json::Value::Object(overrides)) =
            (config.as_object_mut(), serde_json::to_value(settings)?)
        {
            config.extend(overrides);
        }
        let run_id = self.start_unique(&name, config)?;
        info!(run = %run_id, "started run");

        match self.unlearn(&run_id, run_id.clone(), settings, &splits, model) {
            Ok(outcome) => {
                self.tracker.end_run(&run_id, RunStatus::Completed)?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(tracking) = self.tracker.end_run(&run_id, RunStatus::Failed) {
                    warn!(run = %run_id, error = %tracking, "could not close failed run");
                }
                Err(e)
            }
        }
    }

    /// Start a run named `name`, suffixing `-1`, `-2`, ... if it is taken
    fn start_unique(&mut self, name: &str, config: serde_json::Value) -> Result<String> {
        let mut candidate = name.to_string();
        let mut n = 0usize;
        loop {
            match self.tracker.start_run(Some(&candidate), config.clone()) {
                Err(TrackingError::DuplicateRun(_)) => {
                    n += 1;
                    candidate = format!("{name}-{n}");
                }
                other => return Ok(other?),
            }
        }
    }

    fn unlearn(
        &mut self,
        run_id: &str,
        run_name: String,
        settings: &Settings,
        splits: &UnlearningSplits,
        mut model: Box<dyn Classifier>,
    ) -> Result<RunOutcome> {
        let device = self.device;
        let mask = self.mask(settings, &run_name, model.as_ref(), &splits.forget)?;
        let mask_coverage = mask.as_ref().map(SaliencyMask::coverage);
        if let Some(dir) = &self.artifacts_dir {
            std::fs::create_dir_all(dir)?;
            splits.forget_set.save(dir.join(format!("{run_name}_forget.json")))?;
        }

        let baseline = self.measure(model.as_ref(), splits)?;
        log_metrics("baseline", &baseline);
        self.tracker.log(run_id, &baseline.to_row("base_"))?;

        let loss_fn = CrossEntropyLoss;
        let mut rng = StdRng::seed_from_u64(settings.seed);
        let mut optimizer = SGD::new(settings.lr, 0.0);
        let strategy = settings.method.resolve();
        let loader = match settings.method.loader_kind() {
            LoaderKind::Train => &splits.train,
            LoaderKind::Forget => &splits.forget,
            LoaderKind::Retain => &splits.retain,
        };

        let mut best = BestEpochs::default();
        let mut epochs = Vec::with_capacity(settings.epochs);
        let mut epoch_stats = Vec::with_capacity(settings.epochs);
        for epoch in 0..settings.epochs {
            let mut ctx = StepContext {
                forget_set: &splits.forget_set,
                loss_fn: &loss_fn,
                rng: &mut rng,
            };
            let stats = unlearn_epoch(
                model.as_mut(),
                loader,
                strategy,
                &mut ctx,
                &mut optimizer,
                mask.as_ref(),
                device,
            )?;
            info!(
                epoch,
                loss = stats.mean_loss,
                batches = stats.batches,
                "unlearning epoch"
            );

            let metrics = self.measure(model.as_ref(), splits)?;
            log_metrics("epoch", &metrics);
            self.tracker.log(run_id, &metrics.to_row(""))?;
            best.update(epoch, metrics);
            epochs.push(metrics);
            epoch_stats.push(stats);
        }

        for (key, value) in best.summary() {
            self.tracker.set_summary(run_id, &key, value)?;
        }
        if let Some(coverage) = mask_coverage {
            self.tracker.set_summary(run_id, "mask_coverage", f64::from(coverage))?;
        }
        if let Some((epoch, m)) = best.test {
            info!(epoch, test = m.test, forget = m.forget, "best test");
        }
        if let Some((epoch, m)) = best.forget {
            info!(epoch, test = m.test, forget = m.forget, "best forget");
        }

        Ok(RunOutcome {
            run_name,
            baseline,
            epochs,
            epoch_stats,
            best,
            mask_coverage,
        })
    }

    fn mask(
        &self,
        settings: &Settings,
        run_name: &str,
        model: &dyn Classifier,
        forget: &DataLoader,
    ) -> Result<Option<SaliencyMask>> {
        if !settings.use_mask {
            return Ok(None);
        }
        let mask = match &settings.load_mask {
            Some(path) => {
                info!(path = %path.display(), "loading mask");
                SaliencyMask::load(path)?
            }
            None => {
                let mask =
                    build_mask(model, forget, settings.lr, settings.mask_thr, self.device)?;
                if let Some(dir) = &self.artifacts_dir {
                    std::fs::create_dir_all(dir)?;
                    mask.save(dir.join(format!("{run_name}_mask.json")))?;
                }
                mask
            }
        };
        info!(
            coverage = mask.coverage(),
            entries = mask.len(),
            "saliency mask ready"
        );
        Ok(Some(mask))
    }

    fn measure(&self, model: &dyn Classifier, splits: &UnlearningSplits) -> Result<EpochMetrics> {
        let evaluation = evaluate(model, &splits.eval_splits(), &CrossEntropyLoss, self.device)?;
        let mia = self.attacker.attack(
            evaluation.losses("retain"),
            evaluation.losses("forget"),
            evaluation.losses("val"),
            evaluation.losses("test"),
        )?;
        Ok(EpochMetrics::new(&evaluation, mia))
    }
}

/// Splits the checkpoint was trained on, batched per `settings`
pub fn build_splits(checkpoint: &Checkpoint, settings: &Settings) -> Result<UnlearningSplits> {
    let (train, test) = checkpoint.config.data.load()?;
    UnlearningSplits::build(
        train,
        test,
        &settings.forget_selector()?,
        SplitConfig {
            batch_size: settings.batch_size,
            ..checkpoint.config.split
        },
    )
}

fn log_metrics(stage: &str, m: &EpochMetrics) {
    info!(
        stage,
        test = m.test,
        forget = m.forget,
        retain = m.retain,
        val = m.val,
        mia_auc = m.mia_auc,
        mia_acc = m.mia_acc,
        "metrics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_name_format() {
        let now = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let mut settings = Settings::default();
        assert_eq!(run_name(&settings, now, None), "rl_run_M_20260304_050607");

        settings.use_mask = false;
        settings.method = crate::unlearn::Method::GradientAscentForgetOnly;
        assert_eq!(run_name(&settings, now, Some(2)), "ga_small_run_20260304_050607_2");
    }
}
