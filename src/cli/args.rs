//! Command-line arguments

use crate::config::Settings;
use crate::data::{BlobsConfig, DataSource, ForgetSelector, SplitConfig};
use crate::train::TrainConfig;
use crate::unlearn::Method;
use crate::{Device, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use super::LogLevel;

/// Desaprender: saliency-masked machine unlearning
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "desaprender")]
#[command(version)]
#[command(
    about = "Train classifiers, unlearn part of their training data, and measure what is left"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> LogLevel {
        if self.quiet {
            LogLevel::Quiet
        } else if self.verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Normal
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train a classifier and write a checkpoint
    Train(TrainArgs),

    /// Unlearn the forget set from a trained checkpoint
    Unlearn(UnlearnArgs),
}

/// Arguments for the train command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Checkpoint to write (.json or .yaml)
    #[arg(short, long, default_value = "checkpoints/mlp_blobs_best.json")]
    pub output: PathBuf,

    /// Architecture (mlp or linear)
    #[arg(long, default_value = "mlp")]
    pub model: String,

    /// Hidden layer widths, comma separated
    #[arg(long, value_delimiter = ',', default_value = "32")]
    pub hidden: Vec<usize>,

    /// Training set as a JSON dataset file (requires --test-file)
    #[arg(long, requires = "test_file")]
    pub train_file: Option<PathBuf>,

    /// Test set as a JSON dataset file (requires --train-file)
    #[arg(long, requires = "train_file")]
    pub test_file: Option<PathBuf>,

    /// Number of synthetic classes
    #[arg(long, default_value_t = 4)]
    pub classes: usize,

    /// Number of synthetic features
    #[arg(long, default_value_t = 8)]
    pub features: usize,

    /// Synthetic training examples per class
    #[arg(long, default_value_t = 200)]
    pub per_class: usize,

    /// Synthetic test examples per class
    #[arg(long, default_value_t = 50)]
    pub test_per_class: usize,

    /// Standard deviation of each synthetic cluster
    #[arg(long, default_value_t = 1.5)]
    pub spread: f32,

    #[arg(short, long, default_value_t = 30)]
    pub epochs: usize,

    #[arg(long, default_value_t = 0.1)]
    pub lr: f32,

    #[arg(long, default_value_t = 0.9)]
    pub momentum: f32,

    #[arg(long, default_value_t = 5e-4)]
    pub weight_decay: f32,

    /// Epochs without validation improvement before stopping
    #[arg(long, default_value_t = 10)]
    pub patience: usize,

    #[arg(short, long, default_value_t = 64)]
    pub batch_size: usize,

    /// Fraction of the training data held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub val_fraction: f32,

    /// Train on the retain set only (the retrain-from-scratch baseline)
    #[arg(long)]
    pub exclude_forget: bool,

    /// Class forming the forget set (with --exclude-forget)
    #[arg(long)]
    pub class_to_forget: Option<usize>,

    /// Fraction of the training data forming the forget set (with --exclude-forget)
    #[arg(long)]
    pub unlearning_rate: Option<f32>,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long, default_value = "cpu")]
    pub device: Device,
}

impl TrainArgs {
    pub fn data_source(&self) -> DataSource {
        match (&self.train_file, &self.test_file) {
            (Some(train), Some(test)) => DataSource::Files {
                train: train.clone(),
                test: test.clone(),
            },
            _ => DataSource::Blobs(BlobsConfig {
                num_classes: self.classes,
                num_features: self.features,
                train_per_class: self.per_class,
                test_per_class: self.test_per_class,
                spread: self.spread,
                seed: self.seed,
                ..Default::default()
            }),
        }
    }

    pub fn split_config(&self) -> SplitConfig {
        SplitConfig {
            batch_size: self.batch_size,
            val_fraction: self.val_fraction,
            seed: self.seed,
        }
    }

    /// Forget selection; empty unless the forget set is excluded
    pub fn forget_selector(&self) -> Result<ForgetSelector> {
        if self.exclude_forget {
            ForgetSelector::from_settings(self.class_to_forget, self.unlearning_rate)
        } else {
            Ok(ForgetSelector::Indices {
                indices: Vec::new(),
            })
        }
    }

    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            epochs: self.epochs,
            lr: self.lr,
            momentum: self.momentum,
            weight_decay: self.weight_decay,
            early_stopping_patience: self.patience,
            ..Default::default()
        }
    }
}

/// Arguments for the unlearn command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct UnlearnArgs {
    /// Trained checkpoint
    #[arg(short, long, default_value = "checkpoints/mlp_blobs_best.json")]
    pub checkpoint: PathBuf,

    /// Class to forget
    #[arg(long)]
    pub class_to_forget: Option<usize>,

    /// Fraction of the training data to forget
    #[arg(long)]
    pub unlearning_rate: Option<f32>,

    /// Unlearning method: rl, ga, ga_small or retrain
    #[arg(short, long, default_value = "rl")]
    pub method: Method,

    #[arg(long, default_value_t = 0.1)]
    pub lr: f32,

    #[arg(short, long, default_value_t = 10)]
    pub epochs: usize,

    /// Restrict updates with a saliency mask
    #[arg(long)]
    pub use_mask: bool,

    /// Saliency threshold relative to each parameter's maximum
    #[arg(long, default_value_t = 0.5)]
    pub mask_thr: f32,

    /// Saved mask to use instead of computing one
    #[arg(long)]
    pub load_mask: Option<PathBuf>,

    /// Experiments: empty for these flags, `exp` for one run per method,
    /// otherwise a JSON list of overrides or a file holding one
    #[arg(short, long, default_value = "")]
    pub load: String,

    /// Keep runs in memory instead of writing them to the runs directory
    #[arg(long)]
    pub no_log: bool,

    /// Repetitions of each experiment
    #[arg(long, default_value_t = 1)]
    pub nexp: usize,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(short, long, default_value_t = 64)]
    pub batch_size: usize,

    /// Label attached to every run
    #[arg(long)]
    pub tag: Option<String>,

    /// Directory for run records, masks and forget sets
    #[arg(long, default_value = "runs")]
    pub runs_dir: PathBuf,

    /// Credential for the tracking service
    #[arg(long, env = "DESAPRENDER_TRACKING_KEY", hide_env_values = true)]
    pub tracking_key: Option<String>,

    #[arg(long, default_value = "cpu")]
    pub device: Device,
}

impl UnlearnArgs {
    /// Settings described by the flags alone
    pub fn settings(&self) -> Settings {
        Settings {
            checkpoint: self.checkpoint.clone(),
            class_to_forget: self.class_to_forget,
            unlearning_rate: self.unlearning_rate,
            load_mask: self.load_mask.clone(),
            use_mask: self.use_mask,
            mask_thr: self.mask_thr,
            lr: self.lr,
            epochs: self.epochs,
            method: self.method,
            tag: self.tag.clone(),
            batch_size: self.batch_size,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("desaprender").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_unlearn_flags() {
        let cli = parse(&[
            "unlearn",
            "-c",
            "ckpt.json",
            "--class-to-forget",
            "3",
            "-m",
            "ga_small",
            "--use-mask",
            "--mask-thr",
            "0.25",
            "-e",
            "4",
            "-v",
        ]);
        assert_eq!(cli.log_level(), LogLevel::Verbose);
        let Command::Unlearn(args) = cli.command else {
            panic!("expected unlearn");
        };
        let s = args.settings();
        assert_eq!(s.checkpoint, PathBuf::from("ckpt.json"));
        assert_eq!(s.class_to_forget, Some(3));
        assert_eq!(s.method, Method::GradientAscentForgetOnly);
        assert!(s.use_mask);
        assert_eq!(s.mask_thr, 0.25);
        assert_eq!(s.epochs, 4);
        assert_eq!(args.load, "");
        assert_eq!(args.nexp, 1);
    }

    #[test]
    fn test_unknown_method_rejected() {
        let parsed = Cli::try_parse_from(["desaprender", "unlearn", "-m", "finetune"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["desaprender", "-q", "-v", "unlearn"]).is_err());
        assert_eq!(parse(&["-q", "unlearn"]).log_level(), LogLevel::Quiet);
    }

    #[test]
    fn test_train_defaults() {
        let Command::Train(args) = parse(&["train"]).command else {
            panic!("expected train");
        };
        assert_eq!(args.hidden, vec![32]);
        assert_eq!(args.device, Device::Cpu);
        assert!(matches!(args.data_source(), DataSource::Blobs(_)));
        assert_eq!(
            args.forget_selector().unwrap(),
            ForgetSelector::Indices { indices: vec![] }
        );
        let config = args.train_config();
        assert_eq!(config.momentum, 0.9);
        assert_eq!(config.plateau_factor, 0.2);
        assert_eq!(config.early_stopping_patience, 10);
    }

    #[test]
    fn test_train_exclude_forget() {
        let Command::Train(args) = parse(&[
            "train",
            "--exclude-forget",
            "--class-to-forget",
            "1",
            "--hidden",
            "16,8",
        ])
        .command
        else {
            panic!("expected train");
        };
        assert_eq!(args.hidden, vec![16, 8]);
        assert_eq!(args.forget_selector().unwrap(), ForgetSelector::Class { class: 1 });
    }

    #[test]
    fn test_train_files_require_each_other() {
        assert!(Cli::try_parse_from(["desaprender", "train", "--train-file", "a.json"]).is_err());
    }
}
