//! Tests for the unlearning engine

use super::*;
use crate::autograd::NoGradGuard;
use crate::data::{
    BlobsConfig, DataLoader, ForgetSelector, ForgetSet, SplitConfig, UnlearningSplits,
};
use crate::nn::{Classifier, Mlp, ModelSpec};
use crate::optim::SGD;
use crate::train::{CrossEntropyLoss, LossFn};
use crate::{Device, Error};
use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::rc::Rc;

fn splits() -> UnlearningSplits {
    let (train, test) = BlobsConfig {
        num_classes: 3,
        num_features: 4,
        train_per_class: 30,
        test_per_class: 10,
        seed: 5,
        ..Default::default()
    }
    .generate()
    .unwrap();
    UnlearningSplits::build(
        train,
        test,
        &ForgetSelector::Class { class: 1 },
        SplitConfig {
            batch_size: 16,
            val_fraction: 0.2,
            seed: 2,
        },
    )
    .unwrap()
}

fn model(seed: u64) -> Mlp {
    Mlp::new(
        &ModelSpec {
            name: "mlp".into(),
            input_dim: 4,
            hidden: vec![8],
            num_classes: 3,
        },
        seed,
    )
    .unwrap()
}

fn snapshot(model: &dyn Classifier) -> Vec<Vec<f32>> {
    model
        .named_parameters()
        .into_iter()
        .map(|(_, p)| p.data().to_vec())
        .collect()
}

fn run_epoch(model: &mut Mlp, method: Method, mask: Option<&SaliencyMask>) -> EpochStats {
    let splits = splits();
    let loader = match method.loader_kind() {
        LoaderKind::Train => &splits.train,
        LoaderKind::Forget => &splits.forget,
        LoaderKind::Retain => &splits.retain,
    };
    let mut rng = StdRng::seed_from_u64(0);
    let mut ctx = StepContext {
        forget_set: &splits.forget_set,
        loss_fn: &CrossEntropyLoss,
        rng: &mut rng,
    };
    let mut opt = SGD::new(0.1, 0.0);
    unlearn_epoch(model, loader, method.resolve(), &mut ctx, &mut opt, mask, Device::Cpu).unwrap()
}

// =============================================================================
// Saliency mask
// =============================================================================

#[test]
fn test_mask_threshold_zero_is_all_ones() {
    let splits = splits();
    let model = model(0);
    let mask = build_mask(&model, &splits.forget, 0.1, 0.0, Device::Cpu).unwrap();
    assert_abs_diff_eq!(mask.coverage(), 1.0);
}

#[test]
fn test_mask_threshold_one_is_all_zeros() {
    let splits = splits();
    let model = model(0);
    let mask = build_mask(&model, &splits.forget, 0.1, 1.0, Device::Cpu).unwrap();
    assert_abs_diff_eq!(mask.coverage(), 0.0);
}

#[test]
fn test_mask_shapes_match_parameters() {
    let splits = splits();
    let model = model(1);
    let mask = build_mask(&model, &splits.forget, 0.1, 0.5, Device::Cpu).unwrap();

    assert_eq!(mask.len(), model.named_parameters().len());
    for (name, param) in model.named_parameters() {
        let entry = mask.get(&name).unwrap();
        assert_eq!(entry.shape, param.shape());
        assert_eq!(entry.values.len(), param.len());
        assert!(entry.values.iter().all(|&v| v == 0.0 || v == 1.0));
    }
    let coverage = mask.coverage();
    assert!(coverage > 0.0 && coverage < 1.0);
}

#[test]
fn test_mask_coverage_monotone_in_threshold() {
    let splits = splits();
    // Fixed order so every pass sees the same batches
    let forget = DataLoader::new(
        Rc::new(splits.forget.dataset().clone()),
        splits.forget.indices().to_vec(),
        16,
    );
    let model = model(2);
    let coverages: Vec<f32> = [0.9, 0.6, 0.3, 0.1]
        .iter()
        .map(|&t| build_mask(&model, &forget, 0.1, t, Device::Cpu).unwrap().coverage())
        .collect();
    for pair in coverages.windows(2) {
        assert!(pair[1] >= pair[0], "coverage decreased: {coverages:?}");
    }
}

#[test]
fn test_build_mask_leaves_model_untouched() {
    let splits = splits();
    let model = model(3);
    let before = snapshot(&model);
    build_mask(&model, &splits.forget, 0.1, 0.5, Device::Cpu).unwrap();
    assert_eq!(snapshot(&model), before);
    assert!(model.named_parameters().iter().all(|(_, p)| p.grad().is_none()));
}

#[test]
fn test_mask_apply_shape_mismatch() {
    let model = model(0);
    let mut mask = SaliencyMask::default();
    mask.insert(
        "layers.0.bias",
        MaskTensor {
            shape: vec![3],
            values: vec![1.0; 3],
        },
    );
    assert!(matches!(mask.apply(&model), Err(Error::ShapeMismatch { .. })));
}

#[test]
fn test_mask_apply_ignores_unknown_names() {
    let model = model(0);
    let mut mask = SaliencyMask::default();
    mask.insert(
        "encoder.weight",
        MaskTensor {
            shape: vec![1],
            values: vec![0.0],
        },
    );
    assert!(mask.apply(&model).is_ok());
}

#[test]
fn test_mask_save_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("mask.json");
    let mask = SaliencyMask::all_ones(&model(0));
    mask.save(&path).unwrap();
    assert_eq!(SaliencyMask::load(&path).unwrap(), mask);
}

// =============================================================================
// Strategies and the update loop
// =============================================================================

#[test]
fn test_all_ones_mask_matches_unmasked_update() {
    let mut masked = model(7);
    let mut unmasked = model(7);
    let ones = SaliencyMask::all_ones(&masked);

    run_epoch(&mut masked, Method::GradientAscent, Some(&ones));
    run_epoch(&mut unmasked, Method::GradientAscent, None);

    assert_eq!(snapshot(&masked), snapshot(&unmasked));
}

#[test]
fn test_all_zeros_mask_freezes_model() {
    let mut m = model(8);
    let before = snapshot(&m);
    let mut zeros = SaliencyMask::all_ones(&m);
    let names: Vec<String> = zeros.iter().map(|(n, _)| n.clone()).collect();
    for name in names {
        let shape = zeros.get(&name).unwrap().shape.clone();
        let len = shape.iter().product();
        let values = vec![0.0; len];
        zeros.insert(name, MaskTensor { shape, values });
    }

    let stats = run_epoch(&mut m, Method::RandomLabel, Some(&zeros));
    assert!(stats.batches > 0);
    assert_eq!(snapshot(&m), before);
}

#[test]
fn test_every_method_updates_parameters() {
    for method in Method::ALL {
        let mut m = model(9);
        let before = snapshot(&m);
        let stats = run_epoch(&mut m, method, None);
        assert!(stats.batches > 0, "{method} ran no batches");
        assert!(stats.mean_loss.is_finite());
        assert_ne!(snapshot(&m), before, "{method} left the model unchanged");
        assert!(m.named_parameters().iter().all(|(_, p)| p.grad().is_none()));
    }
}

#[test]
fn test_gradient_ascent_negates_forget_rows() {
    let splits = splits();
    let m = model(4);
    let batch = splits
        .train
        .iter()
        .find(|b| {
            let m = splits.forget_set.membership(&b.indices);
            m.contains(&true) && m.contains(&false)
        })
        .unwrap();
    let membership = splits.forget_set.membership(&batch.indices);

    let per_example = {
        let _guard = NoGradGuard::new();
        let logits = m.forward(&batch.inputs, batch.size()).unwrap();
        CrossEntropyLoss.per_example(&logits, &batch.labels).unwrap().data().to_vec()
    };
    let expected: f32 = per_example
        .iter()
        .zip(&membership)
        .map(|(l, &f)| if f { -l } else { *l })
        .sum::<f32>()
        / per_example.len() as f32;

    let mut rng = StdRng::seed_from_u64(0);
    let mut ctx = StepContext {
        forget_set: &splits.forget_set,
        loss_fn: &CrossEntropyLoss,
        rng: &mut rng,
    };
    let loss = Method::GradientAscent.resolve()(&m, &batch, &mut ctx).unwrap();
    assert_abs_diff_eq!(loss.data()[0], expected, epsilon = 1e-5);
}

#[test]
fn test_forget_only_ascent_is_negated_retrain_loss() {
    let splits = splits();
    let m = model(4);
    let batch = splits.forget.iter().next().unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let mut ctx = StepContext {
        forget_set: &splits.forget_set,
        loss_fn: &CrossEntropyLoss,
        rng: &mut rng,
    };
    let ascent = Method::GradientAscentForgetOnly.resolve()(&m, &batch, &mut ctx).unwrap();
    let descent = Method::Retrain.resolve()(&m, &batch, &mut ctx).unwrap();
    assert_abs_diff_eq!(ascent.data()[0], -descent.data()[0], epsilon = 1e-6);
    assert!(ascent.data()[0] < 0.0);
}

#[test]
fn test_random_label_on_forget_free_batch_is_plain_loss() {
    let splits = splits();
    let m = model(4);
    let batch = splits.retain.iter().next().unwrap();
    let empty = ForgetSet::default();
    let mut rng = StdRng::seed_from_u64(0);
    let mut ctx = StepContext {
        forget_set: &empty,
        loss_fn: &CrossEntropyLoss,
        rng: &mut rng,
    };
    let rl = Method::RandomLabel.resolve()(&m, &batch, &mut ctx).unwrap();
    let plain = Method::Retrain.resolve()(&m, &batch, &mut ctx).unwrap();
    assert_eq!(rl.data()[0], plain.data()[0]);
}

#[test]
fn test_non_finite_loss_is_reported() {
    let mut m = model(5);
    for (_, p) in m.named_parameters_mut() {
        p.data_mut().fill(f32::NAN);
    }
    let splits = splits();
    let mut rng = StdRng::seed_from_u64(0);
    let mut ctx = StepContext {
        forget_set: &splits.forget_set,
        loss_fn: &CrossEntropyLoss,
        rng: &mut rng,
    };
    let mut opt = SGD::new(0.1, 0.0);
    let err = unlearn_epoch(
        &mut m,
        &splits.retain,
        Method::Retrain.resolve(),
        &mut ctx,
        &mut opt,
        None,
        Device::Cpu,
    )
    .unwrap_err();
    assert!(matches!(err, Error::NonFinite { .. }));
}

#[test]
fn test_forget_only_ascent_raises_forget_loss() {
    let splits = splits();
    let mut m = model(6);
    let loss_of_forget = |m: &Mlp| -> f32 {
        let eval =
            evaluate(m, &[("forget", &splits.forget)], &CrossEntropyLoss, Device::Cpu).unwrap();
        let losses = eval.losses("forget");
        losses.iter().sum::<f32>() / losses.len() as f32
    };

    let before = loss_of_forget(&m);
    let mut rng = StdRng::seed_from_u64(0);
    let mut ctx = StepContext {
        forget_set: &splits.forget_set,
        loss_fn: &CrossEntropyLoss,
        rng: &mut rng,
    };
    let mut opt = SGD::new(0.05, 0.0);
    for _ in 0..3 {
        unlearn_epoch(
            &mut m,
            &splits.forget,
            Method::GradientAscentForgetOnly.resolve(),
            &mut ctx,
            &mut opt,
            None,
            Device::Cpu,
        )
        .unwrap();
    }
    assert!(loss_of_forget(&m) > before);
}

// =============================================================================
// Evaluator
// =============================================================================

#[test]
fn test_evaluate_reports_every_split() {
    let splits = splits();
    let m = model(0);
    let before = snapshot(&m);
    let eval = evaluate(&m, &splits.eval_splits(), &CrossEntropyLoss, Device::Cpu).unwrap();

    for (name, loader) in splits.eval_splits() {
        let acc = eval.accuracy(name);
        assert!((0.0..=1.0).contains(&acc), "{name}: {acc}");
        assert_eq!(eval.losses(name).len(), loader.len());
        assert!(eval.losses(name).iter().all(|l| l.is_finite() && *l >= 0.0));
    }
    assert_eq!(snapshot(&m), before);
    assert!(m.named_parameters().iter().all(|(_, p)| p.grad().is_none()));
    assert!(crate::autograd::is_grad_enabled());
}

#[test]
fn test_evaluate_rejects_non_finite_losses() {
    let splits = splits();
    let mut m = model(0);
    for (_, p) in m.named_parameters_mut() {
        p.data_mut().fill(f32::INFINITY);
    }
    let err = evaluate(&m, &splits.eval_splits(), &CrossEntropyLoss, Device::Cpu).unwrap_err();
    assert!(matches!(err, Error::NonFinite { ref what, .. } if what == "test loss"));

    let err = evaluate(&m, &[("forget", &splits.forget)], &CrossEntropyLoss, Device::Cpu)
        .unwrap_err();
    assert!(matches!(err, Error::NonFinite { ref what, .. } if what == "forget loss"));
}

#[test]
fn test_evaluate_error_leaves_gradients_enabled() {
    let splits = splits();
    let mut m = model(0);
    for (_, p) in m.named_parameters_mut() {
        p.data_mut().fill(f32::NAN);
    }
    assert!(evaluate(&m, &splits.eval_splits(), &CrossEntropyLoss, Device::Cpu).is_err());
    assert!(crate::autograd::is_grad_enabled());
}

#[test]
fn test_topk_correct() {
    let logits = [3.0, 1.0, 2.0, 0.5, 2.0, 1.0, 0.1, 0.0, 0.2];
    assert_eq!(topk_correct(&logits, 3, &[0, 0, 1], 1), 1);
    assert_eq!(topk_correct(&logits, 3, &[0, 2, 2], 1), 2);
    assert_eq!(topk_correct(&logits, 3, &[2, 0, 0], 2), 2);
    assert_eq!(topk_correct(&logits, 3, &[2, 0, 0], 3), 3);
}

// =============================================================================
// Membership inference
// =============================================================================

fn uniform(rng: &mut StdRng, n: usize, lo: f32, hi: f32) -> Vec<f32> {
    (0..n).map(|_| rng.random_range(lo..hi)).collect()
}

#[test]
fn test_mia_detects_informative_losses() {
    let mut rng = StdRng::seed_from_u64(42);
    let retain = uniform(&mut rng, 400, 0.0, 0.5);
    let val = uniform(&mut rng, 400, 1.0, 2.0);
    let forget = uniform(&mut rng, 200, 0.2, 0.7);
    let test = uniform(&mut rng, 200, 1.0, 2.0);

    let score = MiaAttacker::default().attack(&retain, &forget, &val, &test).unwrap();
    assert!(score.auc > 90.0, "auc = {}", score.auc);
    assert!((0.0..=100.0).contains(&score.accuracy));
}

#[test]
fn test_mia_is_chance_on_identical_distributions() {
    let mut rng = StdRng::seed_from_u64(7);
    let retain = uniform(&mut rng, 400, 0.0, 1.0);
    let val = uniform(&mut rng, 400, 0.0, 1.0);
    let forget = uniform(&mut rng, 400, 0.0, 1.0);
    let test = uniform(&mut rng, 400, 0.0, 1.0);

    let grid = MiaAttacker::default().grid_scores(&retain, &forget, &val, &test).unwrap();
    assert_eq!(grid.len(), 6);
    for point in &grid {
        assert!((point.auc - 50.0).abs() < 10.0, "auc = {}", point.auc);
        assert!((0.0..=100.0).contains(&point.accuracy));
    }
}

#[test]
fn test_mia_grid_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(1);
    let retain = uniform(&mut rng, 50, 0.0, 1.0);
    let val = uniform(&mut rng, 50, 0.5, 1.5);
    let forget = uniform(&mut rng, 20, 0.0, 1.0);
    let test = uniform(&mut rng, 20, 0.5, 1.5);

    let attacker = MiaAttacker::default();
    let a = attacker.attack(&retain, &forget, &val, &test).unwrap();
    let b = attacker.attack(&retain, &forget, &val, &test).unwrap();
    assert_eq!(a, b);
}
