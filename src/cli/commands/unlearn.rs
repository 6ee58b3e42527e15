//! Unlearn command implementation

use crate::cli::logging::log;
use crate::cli::{LogLevel, UnlearnArgs};
use crate::config::ExperimentSource;
use crate::experiment::{ExperimentReport, ExperimentRunner};
use crate::tracking::storage::{InMemoryBackend, JsonFileBackend, TrackingBackend};
use crate::tracking::ExperimentTracker;
use crate::Result;

const EXPERIMENT_NAME: &str = "unlearning";

pub fn run_unlearn(args: &UnlearnArgs, level: LogLevel) -> Result<Vec<ExperimentReport>> {
    let source: ExperimentSource = args.load.parse()?;
    let experiments = source.experiments(&args.settings())?;
    log(
        level,
        LogLevel::Normal,
        &format!(
            "Desaprender: {} experiment(s) from {}, {} repetition(s) each",
            experiments.len(),
            source.describe(),
            args.nexp.max(1)
        ),
    );

    let reports = if args.no_log {
        let mut tracker = ExperimentTracker::new(EXPERIMENT_NAME, InMemoryBackend::new());
        execute(&mut tracker, args, &experiments)?
    } else {
        let backend = JsonFileBackend::new(&args.runs_dir);
        let mut tracker = ExperimentTracker::new(EXPERIMENT_NAME, backend)
            .with_api_key(args.tracking_key.clone());
        if let Some(tag) = &args.tag {
            tracker.add_tag("tag", tag.clone());
        }
        let reports = execute(&mut tracker, args, &experiments)?;
        log(
            level,
            LogLevel::Normal,
            &format!("Runs written to {}", args.runs_dir.display()),
        );
        reports
    };

    for report in &reports {
        for run in &report.runs {
            let m = run.final_metrics();
            log(
                level,
                LogLevel::Normal,
                &format!(
                    "{}: test {:.4} forget {:.4} retain {:.4} val {:.4} \
                     mia_auc {:.2} mia_acc {:.2}",
                    run.run_name, m.test, m.forget, m.retain, m.val, m.mia_auc, m.mia_acc
                ),
            );
            if let Some((epoch, best)) = run.best.test {
                log(
                    level,
                    LogLevel::Verbose,
                    &format!("  best test at epoch {epoch}: {:.4}", best.test),
                );
            }
        }
        for (key, value) in &report.aggregate {
            log(level, LogLevel::Verbose, &format!("  {key}: {value:.4}"));
        }
    }
    Ok(reports)
}

fn execute<B: TrackingBackend>(
    tracker: &mut ExperimentTracker<B>,
    args: &UnlearnArgs,
    experiments: &[crate::config::Settings],
) -> Result<Vec<ExperimentReport>> {
    let mut runner = ExperimentRunner::new(tracker, args.device);
    if !args.no_log {
        runner = runner.with_artifacts_dir(args.runs_dir.join("artifacts"));
    }
    runner.run_all(experiments, args.nexp)
}
