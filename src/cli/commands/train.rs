//! Train command implementation

use crate::cli::logging::log;
use crate::cli::{LogLevel, TrainArgs};
use crate::data::UnlearningSplits;
use crate::io::{save_checkpoint, Checkpoint, CheckpointConfig};
use crate::nn::{build_model, ModelSpec};
use crate::train::{topk_accuracy, TrainResult, Trainer};
use crate::Result;
use tracing::info;

pub fn run_train(args: &TrainArgs, level: LogLevel) -> Result<TrainResult> {
    let device = args.device.resolve();
    let source = args.data_source();
    log(
        level,
        LogLevel::Normal,
        &format!("Desaprender: training {} on {}", args.model, source.name()),
    );

    let (train, test) = source.load()?;
    let dataset = train.name().to_string();
    let splits =
        UnlearningSplits::build(train, test, &args.forget_selector()?, args.split_config())?;

    let spec = ModelSpec {
        name: args.model.clone(),
        input_dim: splits.num_features(),
        hidden: if args.model == "linear" {
            Vec::new()
        } else {
            args.hidden.clone()
        },
        num_classes: splits.num_classes(),
    };
    let mut model = build_model(&spec, args.seed)?;
    info!(parameters = model.num_parameters(), "built model");

    let loader = if args.exclude_forget {
        info!(forget = splits.forget.len(), "excluding forget set from training");
        &splits.retain
    } else {
        &splits.train
    };

    let mut trainer = Trainer::new(args.train_config());
    let result = trainer.fit(model.as_mut(), loader, &splits.val, &splits.test, device)?;
    let (test_top1, test_top5) = topk_accuracy(model.as_ref(), &splits.test, device)?;

    let checkpoint = Checkpoint::new(
        model.as_ref(),
        CheckpointConfig {
            model: spec.name,
            dataset,
            nclasses: spec.num_classes,
            input_dim: spec.input_dim,
            hidden: spec.hidden,
            data: source,
            split: args.split_config(),
        },
    )
    .with_optimizer(trainer.optimizer().state());
    save_checkpoint(&checkpoint, &args.output)?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Best epoch {} (val top-1 {:.2}%), test top-1 {test_top1:.2}% top-5 {test_top5:.2}%",
            result.best_epoch, result.best_val_top1
        ),
    );
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "  {} epochs in {:.1}s{}",
            result.history.len(),
            result.elapsed_secs,
            if result.stopped_early { ", stopped early" } else { "" }
        ),
    );
    log(
        level,
        LogLevel::Normal,
        &format!("Checkpoint written to {}", args.output.display()),
    );
    Ok(result)
}
