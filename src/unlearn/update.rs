//! Masked update loop
//!
//! Per batch: strategy loss, backward, gradient masking, optimizer step,
//! gradient reset.

use super::{SaliencyMask, StepContext, StrategyFn};
use crate::autograd::backward;
use crate::data::DataLoader;
use crate::nn::Classifier;
use crate::optim::Optimizer;
use crate::{Device, Error, Result};
use tracing::debug;

/// Statistics of one unlearning epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    /// Mean strategy loss over batches
    pub mean_loss: f32,
    pub batches: usize,
}

/// Run one epoch of `strategy` over `loader`
///
/// # Errors
///
/// [`Error::NonFinite`] if a loss or gradient is NaN or infinite,
/// [`Error::ShapeMismatch`] if a mask entry does not fit its parameter.
pub fn unlearn_epoch(
    model: &mut dyn Classifier,
    loader: &DataLoader,
    strategy: StrategyFn,
    ctx: &mut StepContext<'_>,
    optimizer: &mut dyn Optimizer,
    mask: Option<&SaliencyMask>,
    device: Device,
) -> Result<EpochStats> {
    let mut total_loss = 0.0f64;
    let mut batches = 0usize;

    for batch in loader.iter() {
        let batch = batch.to_device(device);
        let mut loss = strategy(&*model, &batch, ctx)?;

        let value = loss.data()[0];
        if !value.is_finite() {
            model.zero_grad();
            return Err(Error::NonFinite {
                what: "unlearning loss".into(),
                value,
            });
        }
        backward(&mut loss, None);

        if let Some(mask) = mask {
            mask.apply(&*model)?;
        }
        check_gradients(&*model)?;

        let mut params = model.parameters_mut();
        optimizer.step(&mut params);
        optimizer.zero_grad(&mut params);

        total_loss += f64::from(value);
        batches += 1;
        debug!(batch = batches, loss = value, "unlearning step");
    }

    Ok(EpochStats {
        mean_loss: if batches == 0 {
            0.0
        } else {
            (total_loss / batches as f64) as f32
        },
        batches,
    })
}

fn check_gradients(model: &dyn Classifier) -> Result<()> {
    for (name, param) in model.named_parameters() {
        if let Some(grad) = param.grad() {
            if let Some(bad) = grad.iter().find(|g| !g.is_finite()) {
                let value = *bad;
                model.zero_grad();
                return Err(Error::NonFinite {
                    what: format!("gradient of {name}"),
                    value,
                });
            }
        }
    }
    Ok(())
}
