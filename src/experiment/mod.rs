//! Experiment driver: runs, best-epoch tracking and aggregation

mod metrics;
mod runner;

pub use metrics::{aggregate, BestEpochs, EpochMetrics};
pub use runner::{build_splits, run_name, ExperimentReport, ExperimentRunner, RunOutcome};
